use crate::auth::{Authenticator, User};
use crate::cluster::{Cluster, Resolver};
use crate::error::{Error, Result};
use crate::request::BuildRequest;
use crate::runtime::{Instance, Provisioner};
use crate::template::{merge_artifacts, Artifact};
use crate::tester::{InstanceTester, TestRequest, TestResult};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Logical cluster name used when the embedder doesn't pick one. Every user
/// gets their own cluster under this name.
pub const DEFAULT_CLUSTER_NAME: &str = "default";

/// Outcome of a successful build pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
    pub proxy_id: String,
    pub origin_id: String,
}

/// The public face of the environment orchestrator.
///
/// Composes cluster resolution, artifact generation, provisioning, and
/// testing into the caller-visible operations, enforcing ordering and
/// translating every failure into the closed error taxonomy. Collaborators
/// arrive through the builder as narrow trait objects; there is no ambient
/// global state.
///
/// Every operation authenticates first: an invalid or expired token
/// short-circuits before any orchestrator work. Lifecycle and test
/// operations re-resolve the cluster handle on each call, which is a cache
/// hit from the store after the first resolution for a user.
pub struct Orchestrator {
    pub(super) auth: Arc<dyn Authenticator>,
    pub(super) resolver: Resolver,
    pub(super) provisioner: Provisioner,
    pub(super) tester: InstanceTester,
    pub(super) cluster_name: String,
    pub(super) admin_scope: bool,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("cluster_name", &self.cluster_name)
            .field("admin_scope", &self.admin_scope)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create a builder for constructing an `Orchestrator` with a fluent API.
    pub fn builder() -> super::OrchestratorBuilder {
        super::OrchestratorBuilder::new()
    }

    /// Validate the token and load its user, or fail unauthorized.
    async fn authenticate(&self, token: &str) -> Result<User> {
        if !self.auth.is_valid(token).await? {
            return Err(Error::Auth("invalid or expired token".to_string()));
        }
        self.auth
            .find_by_token(token)
            .await?
            .ok_or_else(|| Error::Auth("token has no associated user".to_string()))
    }

    async fn resolve_cluster(&self, user: &User) -> Result<Cluster> {
        self.resolver
            .resolve(user, &self.cluster_name, true, self.admin_scope)
            .await
    }

    /// Run the build pipeline: resolve cluster, generate artifacts, create
    /// the origin, then the proxy wired to it.
    ///
    /// Any stage's failure aborts the remaining stages and surfaces with the
    /// stage name in the message. Already-created containers are not rolled
    /// back: a failed `create-proxy` leaves its origin running.
    #[instrument(skip(self, request), fields(version_id = %request.version_id))]
    pub async fn build(&self, token: &str, request: BuildRequest) -> Result<BuildOutcome> {
        let user = self.authenticate(token).await?;

        let cluster = self
            .resolve_cluster(&user)
            .await
            .map_err(|e| Error::at_stage("resolve-cluster", e))?;

        let artifacts = merge_artifacts(&user.username, &request.version_id, &request.configurations)
            .map_err(|e| Error::at_stage("generate-artifacts", e))?;

        let origin = self
            .provisioner
            .create_origin(&cluster, &user, &request.version_id)
            .await
            .map_err(|e| Error::at_stage("create-origin", e))?;

        let proxy_id = self
            .provisioner
            .create_proxy(&cluster, &user, &request.version_id, &artifacts, &origin)
            .await
            .map_err(|e| {
                warn!(origin = %origin.id(), "proxy creation failed; origin container left running");
                Error::at_stage("create-proxy", e)
            })?;

        info!(user = %user.username, %proxy_id, "build pipeline complete");
        Ok(BuildOutcome {
            proxy_id,
            origin_id: origin.id().to_string(),
        })
    }

    /// All of the user's instances on their cluster. Always allows cluster
    /// creation, so the first `list` of a fresh user provisions their
    /// cluster rather than failing.
    pub async fn list(&self, token: &str) -> Result<Vec<Instance>> {
        let user = self.authenticate(token).await?;
        let cluster = self.resolve_cluster(&user).await?;
        self.provisioner.list(&cluster, &user).await
    }

    /// Start an instance. `false` means it was already running.
    pub async fn start(&self, token: &str, container_id: &str) -> Result<bool> {
        let user = self.authenticate(token).await?;
        let cluster = self.resolve_cluster(&user).await?;
        self.provisioner.start(&cluster, container_id).await
    }

    /// Stop an instance. `false` means it was already stopped.
    pub async fn stop(&self, token: &str, container_id: &str) -> Result<bool> {
        let user = self.authenticate(token).await?;
        let cluster = self.resolve_cluster(&user).await?;
        self.provisioner.stop(&cluster, container_id).await
    }

    /// Read back the configuration documents baked into an instance.
    pub async fn get_configurations(
        &self,
        token: &str,
        container_id: &str,
    ) -> Result<Vec<Artifact>> {
        let user = self.authenticate(token).await?;
        let cluster = self.resolve_cluster(&user).await?;
        self.provisioner
            .fetch_configurations(&cluster, container_id)
            .await
    }

    /// Push a synthetic request through a running proxy instance and collect
    /// its diagnostic logs alongside the response.
    pub async fn test(
        &self,
        token: &str,
        container_id: &str,
        request: &TestRequest,
    ) -> Result<TestResult> {
        let user = self.authenticate(token).await?;
        let cluster = self.resolve_cluster(&user).await?;
        self.tester.test(&cluster, container_id, request).await
    }
}
