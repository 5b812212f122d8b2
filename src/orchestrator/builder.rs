use super::core::{Orchestrator, DEFAULT_CLUSTER_NAME};
use crate::auth::Authenticator;
use crate::cluster::{ControlPlane, Resolver};
use crate::error::{Error, Result};
use crate::runtime::{ContainerRuntime, Provisioner};
use crate::state::ClusterStore;
use crate::tester::InstanceTester;
use std::sync::Arc;

/// Builder for constructing an [`Orchestrator`] with a fluent API.
///
/// The four collaborators are required; everything else has defaults. The
/// orchestrator holds them as trait objects, so the real HTTP/CLI clients
/// and in-process fakes are equally valid implementations.
///
/// # Example
///
/// ```no_run
/// use proxy_lab::Orchestrator;
/// use proxy_lab::runtime::DockerCliRuntime;
/// use std::sync::Arc;
///
/// # async fn example(
/// #     auth: Arc<dyn proxy_lab::auth::Authenticator>,
/// #     plane: Arc<dyn proxy_lab::cluster::ControlPlane>,
/// #     store: Arc<dyn proxy_lab::state::ClusterStore>,
/// # ) -> Result<(), proxy_lab::Error> {
/// let orchestrator = Orchestrator::builder()
///     .authenticator(auth)
///     .control_plane(plane)
///     .cluster_store(store)
///     .container_runtime(Arc::new(DockerCliRuntime::new()))
///     .cluster_name("staging")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct OrchestratorBuilder {
    authenticator: Option<Arc<dyn Authenticator>>,
    control_plane: Option<Arc<dyn ControlPlane>>,
    cluster_store: Option<Arc<dyn ClusterStore>>,
    container_runtime: Option<Arc<dyn ContainerRuntime>>,
    cluster_name: String,
    admin_scope: bool,
    images: Option<(String, String)>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            authenticator: None,
            control_plane: None,
            cluster_store: None,
            container_runtime: None,
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            admin_scope: false,
            images: None,
        }
    }

    /// Token validation collaborator. Required.
    pub fn authenticator(mut self, auth: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(auth);
        self
    }

    /// Cluster control-plane collaborator. Required.
    pub fn control_plane(mut self, plane: Arc<dyn ControlPlane>) -> Self {
        self.control_plane = Some(plane);
        self
    }

    /// Cluster record store. Required.
    pub fn cluster_store(mut self, store: Arc<dyn ClusterStore>) -> Self {
        self.cluster_store = Some(store);
        self
    }

    /// Remote container runtime. Required.
    pub fn container_runtime(mut self, runtime: Arc<dyn ContainerRuntime>) -> Self {
        self.container_runtime = Some(runtime);
        self
    }

    /// Logical cluster name for this deployment. Defaults to `default`.
    pub fn cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = name.into();
        self
    }

    /// Key cluster records by tenant instead of username, so administrators
    /// of a tenant share one cluster.
    pub fn admin_scope(mut self, admin: bool) -> Self {
        self.admin_scope = admin;
        self
    }

    /// Override the origin/proxy image repositories.
    pub fn images(mut self, origin: impl Into<String>, proxy: impl Into<String>) -> Self {
        self.images = Some((origin.into(), proxy.into()));
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        let auth = self
            .authenticator
            .ok_or_else(|| Error::Config("orchestrator requires an authenticator".to_string()))?;
        let control_plane = self
            .control_plane
            .ok_or_else(|| Error::Config("orchestrator requires a control plane".to_string()))?;
        let store = self
            .cluster_store
            .ok_or_else(|| Error::Config("orchestrator requires a cluster store".to_string()))?;
        let runtime = self.container_runtime.ok_or_else(|| {
            Error::Config("orchestrator requires a container runtime".to_string())
        })?;

        let mut provisioner = Provisioner::new(runtime.clone());
        if let Some((origin, proxy)) = self.images {
            provisioner = provisioner.with_images(origin, proxy);
        }

        Ok(Orchestrator {
            auth,
            resolver: Resolver::new(store, control_plane),
            provisioner,
            tester: InstanceTester::new(runtime)?,
            cluster_name: self.cluster_name,
            admin_scope: self.admin_scope,
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_without_collaborators_is_a_config_error() {
        let err = OrchestratorBuilder::new().build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
