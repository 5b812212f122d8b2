//! # proxy-lab
//!
//! Provisions, configures, and operates short-lived proxy instances on a
//! per-user remote Docker cluster.
//!
//! ## Features
//!
//! - **Cluster Resolution**: fetch-or-create of a per-user remote cluster,
//!   including credential extraction and persistence
//! - **Artifact Generation**: topology/runtime/logging configuration
//!   documents generated from version and user-supplied templates
//! - **Container Provisioning**: linked origin/proxy container pairs with
//!   configuration baked in at creation
//! - **Lifecycle Operations**: list, start, stop, and configuration
//!   introspection against running instances
//! - **Instance Testing**: synthetic requests through a running proxy with
//!   diagnostic log capture
//!
//! ## Quick Start
//!
//! ```no_run
//! use proxy_lab::{Orchestrator, BuildRequest};
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     auth: Arc<dyn proxy_lab::auth::Authenticator>,
//! #     plane: Arc<dyn proxy_lab::cluster::ControlPlane>,
//! #     store: Arc<dyn proxy_lab::state::ClusterStore>,
//! #     runtime: Arc<dyn proxy_lab::runtime::ContainerRuntime>,
//! # ) -> Result<(), proxy_lab::Error> {
//! let orchestrator = Orchestrator::builder()
//!     .authenticator(auth)
//!     .control_plane(plane)
//!     .cluster_store(store)
//!     .container_runtime(runtime)
//!     .build()?;
//!
//! let request = BuildRequest::from_json(br#"{"versionId":"7.1","configurations":[]}"#)?;
//! let outcome = orchestrator.build("session-token", request).await?;
//! println!("proxy instance: {}", outcome.proxy_id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! All operations are synchronous from the caller's point of view: one
//! inbound request drives one pipeline to completion or failure. Concurrency
//! arises only from simultaneous callers. Every outbound call is bounded by a
//! fixed 30-second timeout, and the cluster store tolerates duplicate-create
//! races by last-writer-wins upserts. There are no automatic retries; a
//! failed remote call is terminal for that request.

pub mod auth;
pub mod cluster;
pub mod error;
pub mod orchestrator;
pub mod request;
pub mod runtime;
pub mod state;
pub mod template;
pub mod tester;

// Re-export commonly used types
pub use auth::User;
pub use cluster::{Cluster, Resolver};
pub use error::{Error, Result, StatusClass};
pub use orchestrator::{BuildOutcome, Orchestrator, OrchestratorBuilder};
pub use request::{BuildRequest, BuildResponse};
pub use runtime::Provisioner;
pub use template::Artifact;
pub use tester::{InstanceTester, TestRequest, TestResult};

use std::time::Duration;

/// Fixed bound on every outbound call to the identity provider, cluster
/// control plane, or remote container runtime. A timeout surfaces as
/// [`Error::UpstreamTimeout`] rather than blocking the caller indefinitely.
pub const REMOTE_TIMEOUT: Duration = Duration::from_secs(30);
