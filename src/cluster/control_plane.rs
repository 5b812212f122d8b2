use crate::auth::User;
use crate::error::{transport_error, Error, Result};
use crate::REMOTE_TIMEOUT;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

/// Remote-side state of a cluster as reported by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterStatus {
    /// Provisioned and serving; adopt without a create call.
    Active,
    /// Known but still coming up.
    Provisioning,
    /// Unknown to the control plane.
    Absent,
}

/// The cluster control plane: status queries, creation, and credential
/// bundles. The HTTP implementation talks to the real service; tests inject
/// in-process fakes.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn status(&self, user: &User, name: &str) -> Result<ClusterStatus>;

    /// Create the remote cluster. The control plane blocks or polls per its
    /// own semantics; when this returns Ok the cluster is usable.
    async fn create(&self, user: &User, name: &str) -> Result<()>;

    /// Fetch the cluster's credential bundle as a zip archive.
    async fn credentials(&self, user: &User, name: &str) -> Result<Vec<u8>>;
}

/// REST client for the cluster control plane.
pub struct HttpControlPlane {
    base_url: String,
    client: Client,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
}

impl HttpControlPlane {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REMOTE_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn cluster_url(&self, user: &User, name: &str) -> String {
        format!("{}/clusters/{}/{}", self.base_url, user.username, name)
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn status(&self, user: &User, name: &str) -> Result<ClusterStatus> {
        let response = self
            .client
            .get(self.cluster_url(user, name))
            .bearer_auth(&user.token)
            .send()
            .await
            .map_err(|e| transport_error("cluster status", e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(ClusterStatus::Absent),
            status if status.is_success() => {
                let body: StatusResponse = response.json().await.map_err(|e| {
                    Error::Provision(format!("control plane returned invalid JSON: {e}"))
                })?;
                debug!(name, status = %body.status, "control plane cluster status");
                match body.status.as_str() {
                    "active" => Ok(ClusterStatus::Active),
                    _ => Ok(ClusterStatus::Provisioning),
                }
            }
            status => Err(Error::Provision(format!(
                "control plane status query returned {status}"
            ))),
        }
    }

    async fn create(&self, user: &User, name: &str) -> Result<()> {
        let response = self
            .client
            .post(self.cluster_url(user, name))
            .bearer_auth(&user.token)
            .send()
            .await
            .map_err(|e| transport_error("cluster create", e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Provision(format!(
                "cluster creation returned {}",
                response.status()
            )))
        }
    }

    async fn credentials(&self, user: &User, name: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(format!("{}/credentials", self.cluster_url(user, name)))
            .bearer_auth(&user.token)
            .send()
            .await
            .map_err(|e| transport_error("cluster credentials", e))?;

        if !response.status().is_success() {
            return Err(Error::Provision(format!(
                "credential fetch returned {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error("cluster credentials", e))?;
        Ok(bytes.to_vec())
    }
}
