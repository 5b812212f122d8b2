//! Remote container runtime access and provisioning.
//!
//! [`ContainerRuntime`] is the seam to the Docker-compatible remote API:
//! every operation opens a fresh authenticated connection with the cluster's
//! TLS bundle and releases it on completion or error. [`Provisioner`] builds
//! the origin/proxy pairs and drives instance lifecycles on top of that seam.

mod docker;
mod error;
mod provisioner;

pub use docker::DockerCliRuntime;
pub use error::RuntimeError;
pub use provisioner::{OriginHandle, Provisioner};

use crate::cluster::Cluster;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Label carrying the owning user, set on every managed container.
pub const LABEL_OWNER: &str = "plab.owner";
/// Label carrying the container role (`origin` or `proxy`).
pub const LABEL_ROLE: &str = "plab.role";
/// Label on proxy containers naming their linked origin's identifier.
pub const LABEL_ORIGIN: &str = "plab.origin";
/// Label carrying the requested version identifier.
pub const LABEL_VERSION: &str = "plab.version";

/// Role of a managed container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Backend the proxy forwards real traffic to.
    Origin,
    /// The instance under management, fronting its origin.
    Proxy,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Origin => "origin",
            Role::Proxy => "proxy",
        }
    }
}

/// An instance as observed on the remote runtime. Lifecycle state is owned
/// by the runtime; we report it, we never store it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub role: Role,
    /// For proxies, the identifier of the linked origin container.
    pub origin_id: Option<String>,
    pub state: String,
}

/// Creation parameters for one container.
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub labels: HashMap<String, String>,
    /// (target container id, alias) link pairs.
    pub links: Vec<(String, String)>,
    /// Container port published to an ephemeral host port.
    pub publish_port: Option<u16>,
}

/// Output of one isolated exec invocation.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Docker-compatible remote runtime primitives, addressed to one cluster per
/// call. No call is retried automatically; the caller decides whether to
/// re-resolve the cluster and retry once.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create a container without starting it. Returns the remote-assigned id.
    async fn create(&self, cluster: &Cluster, spec: &ContainerSpec) -> Result<String>;

    /// Start a container. `false` means it was already running (no state
    /// change), which is not an error.
    async fn start(&self, cluster: &Cluster, id: &str) -> Result<bool>;

    /// Stop a container. `false` means it was already stopped.
    async fn stop(&self, cluster: &Cluster, id: &str) -> Result<bool>;

    /// List containers carrying the given label, running or not.
    async fn list_labeled(&self, cluster: &Cluster, label: &str) -> Result<Vec<Instance>>;

    /// Run one command in a running container. Each invocation is its own
    /// exec session; output never interleaves between concurrent callers.
    async fn exec(&self, cluster: &Cluster, id: &str, command: &[&str]) -> Result<ExecOutput>;

    /// Write a file into a (created or running) container.
    async fn copy_in(&self, cluster: &Cluster, id: &str, path: &str, content: &str) -> Result<()>;

    /// The ephemeral host port a container port was published to, if any.
    async fn published_port(
        &self,
        cluster: &Cluster,
        id: &str,
        container_port: u16,
    ) -> Result<Option<u16>>;
}
