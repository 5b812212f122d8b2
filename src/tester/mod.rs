//! Ad-hoc exercising of a running proxy instance.
//!
//! The tester clears the instance's three diagnostic logs, pushes one
//! caller-shaped HTTP request through the proxy's published address, and
//! reads the logs back next to the raw response. Everything around the
//! response itself is best-effort: a log that can't be cleared or read is
//! reported as empty with a warning, never as a failed test.

use crate::cluster::Cluster;
use crate::error::{transport_error, Error, Result};
use crate::runtime::ContainerRuntime;
use crate::template::documents::{log_path, LOG_NAMES};
use crate::template::topology::PROXY_PORT;
use crate::REMOTE_TIMEOUT;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// The HTTP-shaped request pushed through the proxy. Ephemeral; never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRequest {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
}

/// One assembled result document: the proxy's response plus the three named
/// log excerpts captured around it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub status: u16,
    pub body: String,
    /// Log name (`access`, `error`, `service`) to captured excerpt. An
    /// excerpt that could not be captured is present but empty.
    pub logs: BTreeMap<String, String>,
}

/// Sends synthetic requests through running proxy instances.
pub struct InstanceTester {
    runtime: Arc<dyn ContainerRuntime>,
    client: Client,
}

impl InstanceTester {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REMOTE_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { runtime, client })
    }

    /// Exercise a running proxy instance with one request.
    pub async fn test(
        &self,
        cluster: &Cluster,
        container_id: &str,
        request: &TestRequest,
    ) -> Result<TestResult> {
        let method: reqwest::Method = request
            .method
            .parse()
            .map_err(|_| Error::Validation(format!("invalid HTTP method '{}'", request.method)))?;

        self.clear_logs(cluster, container_id).await;

        let host_port = self
            .runtime
            .published_port(cluster, container_id, PROXY_PORT)
            .await?
            .ok_or_else(|| {
                Error::Connection(format!(
                    "instance {container_id} has no published port {PROXY_PORT}; is it a proxy?"
                ))
            })?;

        let path = if request.path.starts_with('/') {
            request.path.clone()
        } else {
            format!("/{}", request.path)
        };
        let url = format!("http://{}:{}{}", cluster.endpoint_host(), host_port, path);
        debug!(%url, method = %request.method, "sending test request");

        let mut builder = self.client.request(method, &url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error("instance test request", e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error("instance test response", e))?;

        let logs = self.capture_logs(cluster, container_id).await;

        Ok(TestResult { status, body, logs })
    }

    /// Truncate the three log files before the request, so each excerpt
    /// covers only this test. Failures are logged, not fatal.
    async fn clear_logs(&self, cluster: &Cluster, container_id: &str) {
        for name in LOG_NAMES {
            let path = log_path(name);
            let result = self
                .runtime
                .exec(cluster, container_id, &["sh", "-c", &format!(": > {path}")])
                .await;
            match result {
                Ok(output) if output.success() => {}
                Ok(output) => {
                    warn!(container = container_id, log = name, stderr = %output.stderr, "could not clear log");
                }
                Err(e) => {
                    warn!(container = container_id, log = name, error = %e, "could not clear log");
                }
            }
        }
    }

    /// Read the three log files back. A failed read contributes an empty
    /// excerpt; it never voids the captured response.
    async fn capture_logs(&self, cluster: &Cluster, container_id: &str) -> BTreeMap<String, String> {
        let mut logs = BTreeMap::new();
        for name in LOG_NAMES {
            let path = log_path(name);
            let excerpt = match self
                .runtime
                .exec(cluster, container_id, &["cat", &path])
                .await
            {
                Ok(output) if output.success() => output.stdout,
                Ok(output) => {
                    warn!(container = container_id, log = name, stderr = %output.stderr, "could not capture log");
                    String::new()
                }
                Err(e) => {
                    warn!(container = container_id, log = name, error = %e, "could not capture log");
                    String::new()
                }
            };
            logs.insert(name.to_string(), excerpt);
        }
        logs
    }
}
