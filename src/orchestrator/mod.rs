mod builder;
mod core;

pub use builder::OrchestratorBuilder;
pub use core::{BuildOutcome, Orchestrator, DEFAULT_CLUSTER_NAME};
