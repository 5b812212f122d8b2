//! In-process fakes for driving the orchestrator without a network.

// Each integration test binary compiles this module separately and uses a
// different subset of the helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use proxy_lab::auth::{Authenticator, User};
use proxy_lab::cluster::{ClusterStatus, ControlPlane};
use proxy_lab::runtime::{ContainerRuntime, ContainerSpec, ExecOutput, Instance, Role};
use proxy_lab::state::MemoryClusterStore;
use proxy_lab::{Cluster, Error, Orchestrator, Result};
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const TOKEN: &str = "valid-token";
pub const ENDPOINT: &str = "tcp://127.0.0.1:2376";

/// Surface crate logs in test output, filtered by `RUST_LOG`. Safe to call
/// from every test; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_user(username: &str) -> User {
    User {
        token: TOKEN.to_string(),
        username: username.to_string(),
        tenant_id: "acme".to_string(),
        token_expiry: Utc::now() + Duration::hours(1),
    }
}

/// Authenticator knowing exactly one token.
pub struct FakeAuth {
    pub user: User,
}

impl FakeAuth {
    pub fn for_user(username: &str) -> Arc<Self> {
        Arc::new(Self {
            user: test_user(username),
        })
    }
}

#[async_trait]
impl Authenticator for FakeAuth {
    async fn is_valid(&self, token: &str) -> Result<bool> {
        Ok(token == self.user.token && !self.user.is_expired_at(Utc::now()))
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<User>> {
        if token == self.user.token {
            Ok(Some(self.user.clone()))
        } else {
            Ok(None)
        }
    }
}

/// Zip archive holding a complete credential bundle for [`ENDPOINT`].
pub fn credentials_zip() -> Vec<u8> {
    let entries: &[(&str, &str)] = &[
        ("ca.pem", "FAKE CA CERT"),
        ("ca-key.pem", "FAKE CA KEY"),
        ("cert.pem", "FAKE CLIENT CERT"),
        ("key.pem", "FAKE CLIENT KEY"),
        ("docker.env", "DOCKER_HOST=tcp://127.0.0.1:2376\nDOCKER_TLS_VERIFY=1\n"),
    ];
    let mut buffer = std::io::Cursor::new(Vec::new());
    let mut writer = zip::ZipWriter::new(&mut buffer);
    for (name, content) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
    buffer.into_inner()
}

/// Control plane fake with call counters. Clusters start absent; `create`
/// flips them active.
#[derive(Default)]
pub struct FakeControlPlane {
    active: Mutex<HashMap<String, bool>>,
    pub status_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub credential_calls: AtomicUsize,
}

impl FakeControlPlane {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_active(name: &str) -> Arc<Self> {
        let plane = Self::default();
        plane.active.lock().unwrap().insert(name.to_string(), true);
        Arc::new(plane)
    }

    pub fn remote_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
            + self.create_calls.load(Ordering::SeqCst)
            + self.credential_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn status(&self, _user: &User, name: &str) -> Result<ClusterStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.lock().unwrap();
        if active.get(name).copied().unwrap_or(false) {
            Ok(ClusterStatus::Active)
        } else {
            Ok(ClusterStatus::Absent)
        }
    }

    async fn create(&self, _user: &User, name: &str) -> Result<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.active.lock().unwrap().insert(name.to_string(), true);
        Ok(())
    }

    async fn credentials(&self, _user: &User, _name: &str) -> Result<Vec<u8>> {
        self.credential_calls.fetch_add(1, Ordering::SeqCst);
        Ok(credentials_zip())
    }
}

#[derive(Clone)]
struct FakeContainer {
    name: String,
    labels: HashMap<String, String>,
    running: bool,
    files: HashMap<String, String>,
}

/// Stateful in-memory stand-in for the remote daemon.
#[derive(Default)]
pub struct FakeRuntime {
    containers: Mutex<HashMap<String, FakeContainer>>,
    next_id: AtomicUsize,
    /// Host port reported for any published container port.
    pub host_port: Mutex<Option<u16>>,
    /// When set, `create` fails with this connection error message.
    pub fail_create: Mutex<Option<String>>,
}

impl FakeRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn container_count(&self) -> usize {
        self.containers.lock().unwrap().len()
    }

    pub fn set_running(&self, id: &str, running: bool) {
        if let Some(c) = self.containers.lock().unwrap().get_mut(id) {
            c.running = running;
        }
    }

    pub fn put_file(&self, id: &str, path: &str, content: &str) {
        if let Some(c) = self.containers.lock().unwrap().get_mut(id) {
            c.files.insert(path.to_string(), content.to_string());
        }
    }

    pub fn file(&self, id: &str, path: &str) -> Option<String> {
        self.containers
            .lock()
            .unwrap()
            .get(id)
            .and_then(|c| c.files.get(path).cloned())
    }

    pub fn label(&self, id: &str, key: &str) -> Option<String> {
        self.containers
            .lock()
            .unwrap()
            .get(id)
            .and_then(|c| c.labels.get(key).cloned())
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn create(&self, _cluster: &Cluster, spec: &ContainerSpec) -> Result<String> {
        if let Some(reason) = self.fail_create.lock().unwrap().clone() {
            return Err(Error::Connection(reason));
        }
        let id = format!("ctr-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.containers.lock().unwrap().insert(
            id.clone(),
            FakeContainer {
                name: spec.name.clone(),
                labels: spec.labels.clone(),
                running: false,
                files: HashMap::new(),
            },
        );
        Ok(id)
    }

    async fn start(&self, _cluster: &Cluster, id: &str) -> Result<bool> {
        let mut containers = self.containers.lock().unwrap();
        let container = containers
            .get_mut(id)
            .ok_or_else(|| Error::InstanceNotFound(id.to_string()))?;
        if container.running {
            return Ok(false);
        }
        container.running = true;
        Ok(true)
    }

    async fn stop(&self, _cluster: &Cluster, id: &str) -> Result<bool> {
        let mut containers = self.containers.lock().unwrap();
        let container = containers
            .get_mut(id)
            .ok_or_else(|| Error::InstanceNotFound(id.to_string()))?;
        if !container.running {
            return Ok(false);
        }
        container.running = false;
        Ok(true)
    }

    async fn list_labeled(&self, _cluster: &Cluster, label: &str) -> Result<Vec<Instance>> {
        let (key, value) = label.split_once('=').unwrap_or((label, ""));
        let containers = self.containers.lock().unwrap();
        let mut instances: Vec<Instance> = containers
            .iter()
            .filter(|(_, c)| c.labels.get(key).map(String::as_str) == Some(value))
            .map(|(id, c)| Instance {
                id: id.clone(),
                name: c.name.clone(),
                role: match c.labels.get("plab.role").map(String::as_str) {
                    Some("origin") => Role::Origin,
                    _ => Role::Proxy,
                },
                origin_id: c.labels.get("plab.origin").cloned(),
                state: (if c.running { "running" } else { "created" }).to_string(),
            })
            .collect();
        instances.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(instances)
    }

    async fn exec(&self, _cluster: &Cluster, id: &str, command: &[&str]) -> Result<ExecOutput> {
        let mut containers = self.containers.lock().unwrap();
        let container = containers
            .get_mut(id)
            .ok_or_else(|| Error::InstanceNotFound(id.to_string()))?;

        let ok = |stdout: String| ExecOutput {
            stdout,
            stderr: String::new(),
            exit_code: Some(0),
        };
        let fail = |stderr: &str| ExecOutput {
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_code: Some(1),
        };

        // Emulates the handful of shell commands the crate issues.
        if command[0] == "cat" {
            return Ok(match container.files.get(command[1]) {
                Some(content) => ok(content.clone()),
                None => fail("No such file or directory"),
            });
        }
        if command[0] == "sh" && command[1] == "-c" {
            let script = command[2];
            if let Some(rest) = script.strip_prefix("ls ") {
                let prefix = rest
                    .split_whitespace()
                    .next()
                    .unwrap_or("")
                    .trim_end_matches("*.cfg.xml");
                let mut matches: Vec<&String> = container
                    .files
                    .keys()
                    .filter(|p| p.starts_with(prefix) && p.ends_with(".cfg.xml"))
                    .collect();
                matches.sort();
                let listing = matches
                    .iter()
                    .map(|p| format!("{p}\n"))
                    .collect::<String>();
                return Ok(ok(listing));
            }
            if let Some(path) = script.strip_prefix(": > ") {
                container.files.insert(path.to_string(), String::new());
                return Ok(ok(String::new()));
            }
        }
        Ok(fail("unsupported command"))
    }

    async fn copy_in(&self, _cluster: &Cluster, id: &str, path: &str, content: &str) -> Result<()> {
        let mut containers = self.containers.lock().unwrap();
        let container = containers
            .get_mut(id)
            .ok_or_else(|| Error::InstanceNotFound(id.to_string()))?;
        container.files.insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn published_port(
        &self,
        _cluster: &Cluster,
        id: &str,
        _container_port: u16,
    ) -> Result<Option<u16>> {
        if !self.containers.lock().unwrap().contains_key(id) {
            return Err(Error::InstanceNotFound(id.to_string()));
        }
        Ok(*self.host_port.lock().unwrap())
    }
}

/// Everything a test needs to drive the façade.
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub plane: Arc<FakeControlPlane>,
    pub runtime: Arc<FakeRuntime>,
    pub store: Arc<MemoryClusterStore>,
}

pub fn harness(username: &str) -> Harness {
    init_tracing();
    let plane = FakeControlPlane::new();
    let runtime = FakeRuntime::new();
    let store = Arc::new(MemoryClusterStore::new());
    let orchestrator = Orchestrator::builder()
        .authenticator(FakeAuth::for_user(username))
        .control_plane(plane.clone())
        .cluster_store(store.clone())
        .container_runtime(runtime.clone())
        .build()
        .expect("harness orchestrator");
    Harness {
        orchestrator,
        plane,
        runtime,
        store,
    }
}
