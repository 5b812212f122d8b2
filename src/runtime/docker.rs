//! Remote Docker CLI client.
//!
//! Every operation shells out to `docker` pointed at the cluster's endpoint
//! with its TLS bundle. The bundle is written to a private temp directory
//! for the duration of one command and removed on every exit path, so cert
//! material never outlives the call. One subprocess per command keeps exec
//! output isolated between concurrent callers by construction.

use super::error::RuntimeError;
use super::{ContainerRuntime, ContainerSpec, ExecOutput, Instance, Role};
use crate::cluster::Cluster;
use crate::error::Result;
use crate::REMOTE_TIMEOUT;
use async_trait::async_trait;
use std::io::Write;
use std::process::Output;
use tempfile::TempDir;
use tracing::debug;

use super::{LABEL_ORIGIN, LABEL_ROLE};

/// Docker CLI transport to a remote, TLS-secured daemon.
#[derive(Debug, Clone, Default)]
pub struct DockerCliRuntime;

impl DockerCliRuntime {
    pub fn new() -> Self {
        DockerCliRuntime
    }

    /// Write the cluster's TLS material into a fresh temp dir and return the
    /// connection arguments. The dir (and the keys in it) is removed when
    /// the returned guard drops.
    fn connection_args(cluster: &Cluster) -> std::io::Result<(TempDir, Vec<String>)> {
        let dir = TempDir::new()?;
        let write = |name: &str, content: &str| -> std::io::Result<String> {
            let path = dir.path().join(name);
            let mut file = std::fs::File::create(&path)?;
            file.write_all(content.as_bytes())?;
            Ok(path.to_string_lossy().into_owned())
        };
        let ca = write("ca.pem", &cluster.tls.ca_cert)?;
        let cert = write("cert.pem", &cluster.tls.client_cert)?;
        let key = write("key.pem", &cluster.tls.client_key)?;

        let args = vec![
            "--host".to_string(),
            cluster.endpoint.clone(),
            "--tlsverify".to_string(),
            "--tlscacert".to_string(),
            ca,
            "--tlscert".to_string(),
            cert,
            "--tlskey".to_string(),
            key,
        ];
        Ok((dir, args))
    }

    /// Run one docker command against the cluster, bounded by the fixed
    /// remote timeout. Raw output; exit status not yet checked.
    async fn run(&self, cluster: &Cluster, args: &[&str]) -> std::result::Result<Output, RuntimeError> {
        // The command string for errors names the operation, not the TLS
        // plumbing that carried it.
        let cmd_str = format!("docker {}", args.join(" "));
        debug!(endpoint = %cluster.endpoint, command = %cmd_str, "remote docker call");

        let (_tls_dir, mut full_args) = Self::connection_args(cluster)
            .map_err(|e| RuntimeError::exec_failed(cmd_str.clone(), e))?;
        full_args.extend(args.iter().map(|s| s.to_string()));

        let result = tokio::time::timeout(
            REMOTE_TIMEOUT,
            tokio::process::Command::new("docker")
                .args(&full_args)
                .output(),
        )
        .await;

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(RuntimeError::exec_failed(cmd_str, e)),
            Err(_) => Err(RuntimeError::timeout(cmd_str, REMOTE_TIMEOUT)),
        }
    }

    /// Run one docker command, failing on non-zero exit.
    async fn run_success(
        &self,
        cluster: &Cluster,
        args: &[&str],
        container: Option<&str>,
    ) -> std::result::Result<Output, RuntimeError> {
        let output = self.run(cluster, args).await?;
        if output.status.success() {
            Ok(output)
        } else {
            let cmd_str = format!("docker {}", args.join(" "));
            Err(RuntimeError::from_output(cmd_str, container, &output))
        }
    }

    /// Whether the container is currently running on the remote daemon.
    async fn is_running(&self, cluster: &Cluster, id: &str) -> Result<bool> {
        let output = self
            .run_success(
                cluster,
                &["inspect", "-f", "{{.State.Running}}", id],
                Some(id),
            )
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim() == "true")
    }
}

/// Parse one `docker ps --format` line into an [`Instance`].
/// Lines without a recognized role label are not ours and yield `None`.
fn parse_instance_line(line: &str) -> Option<Instance> {
    let mut fields = line.split('\t');
    let id = fields.next()?.trim();
    let name = fields.next()?.trim();
    let role = match fields.next()?.trim() {
        "origin" => Role::Origin,
        "proxy" => Role::Proxy,
        _ => return None,
    };
    let origin_id = match fields.next().map(str::trim) {
        Some("") | None => None,
        Some(origin) => Some(origin.to_string()),
    };
    let state = fields.next().unwrap_or("unknown").trim().to_string();

    if id.is_empty() {
        return None;
    }
    Some(Instance {
        id: id.to_string(),
        name: name.to_string(),
        role,
        origin_id,
        state,
    })
}

/// Parse a `docker port` line (`0.0.0.0:32768`) into the host port.
fn parse_port_line(line: &str) -> Option<u16> {
    line.trim().rsplit_once(':')?.1.parse().ok()
}

#[async_trait]
impl ContainerRuntime for DockerCliRuntime {
    async fn create(&self, cluster: &Cluster, spec: &ContainerSpec) -> Result<String> {
        let mut args: Vec<String> = vec!["create".into(), "--name".into(), spec.name.clone()];
        for (key, value) in &spec.labels {
            args.push("--label".into());
            args.push(format!("{key}={value}"));
        }
        for (target, alias) in &spec.links {
            args.push("--link".into());
            args.push(format!("{target}:{alias}"));
        }
        if let Some(port) = spec.publish_port {
            args.push("-p".into());
            args.push(port.to_string());
        }
        args.push(spec.image.clone());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run_success(cluster, &arg_refs, None).await?;
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(name = %spec.name, %id, "container created");
        Ok(id)
    }

    async fn start(&self, cluster: &Cluster, id: &str) -> Result<bool> {
        if self.is_running(cluster, id).await? {
            return Ok(false);
        }
        self.run_success(cluster, &["start", id], Some(id)).await?;
        Ok(true)
    }

    async fn stop(&self, cluster: &Cluster, id: &str) -> Result<bool> {
        if !self.is_running(cluster, id).await? {
            return Ok(false);
        }
        self.run_success(cluster, &["stop", id], Some(id)).await?;
        Ok(true)
    }

    async fn list_labeled(&self, cluster: &Cluster, label: &str) -> Result<Vec<Instance>> {
        let filter = format!("label={label}");
        let format = format!(
            "{{{{.ID}}}}\t{{{{.Names}}}}\t{{{{.Label \"{LABEL_ROLE}\"}}}}\t{{{{.Label \"{LABEL_ORIGIN}\"}}}}\t{{{{.State}}}}"
        );
        let output = self
            .run_success(
                cluster,
                &["ps", "-a", "--filter", &filter, "--format", &format],
                None,
            )
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().filter_map(parse_instance_line).collect())
    }

    async fn exec(&self, cluster: &Cluster, id: &str, command: &[&str]) -> Result<ExecOutput> {
        let mut args = vec!["exec", id];
        args.extend_from_slice(command);

        let output = self.run(cluster, &args).await.map_err(crate::Error::from)?;
        if !output.status.success() {
            // A failing command inside the container is a result, not an
            // error; only transport-level failures abort the call.
            let cmd_str = format!("docker {}", args.join(" "));
            match RuntimeError::from_output(cmd_str, Some(id), &output) {
                err @ (RuntimeError::ConnectionFailed { .. }
                | RuntimeError::ContainerNotFound { .. }) => return Err(err.into()),
                _ => {}
            }
        }
        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }

    async fn copy_in(&self, cluster: &Cluster, id: &str, path: &str, content: &str) -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(content.as_bytes())?;
        let local = file.path().to_string_lossy().into_owned();
        let target = format!("{id}:{path}");
        self.run_success(cluster, &["cp", &local, &target], Some(id))
            .await?;
        Ok(())
    }

    async fn published_port(
        &self,
        cluster: &Cluster,
        id: &str,
        container_port: u16,
    ) -> Result<Option<u16>> {
        let spec = format!("{container_port}/tcp");
        let output = self.run(cluster, &["port", id, &spec]).await.map_err(crate::Error::from)?;
        if !output.status.success() {
            let cmd_str = format!("docker port {id} {spec}");
            match RuntimeError::from_output(cmd_str, Some(id), &output) {
                err @ (RuntimeError::ConnectionFailed { .. }
                | RuntimeError::ContainerNotFound { .. }) => return Err(err.into()),
                // Unpublished port: docker exits non-zero, nothing to report.
                _ => return Ok(None),
            }
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().and_then(parse_port_line))
    }
}
