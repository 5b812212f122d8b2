use super::{
    ContainerRuntime, ContainerSpec, Instance, Role, LABEL_ORIGIN, LABEL_OWNER, LABEL_ROLE,
    LABEL_VERSION,
};
use crate::auth::User;
use crate::cluster::Cluster;
use crate::error::{Error, Result};
use crate::template::topology::{ORIGIN_ALIAS, PROXY_PORT};
use crate::template::{trailing_name, Artifact};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Directory inside an instance container where configuration artifacts are
/// baked in at creation. Both images ship this directory, so `docker cp`
/// into a created-but-not-started container succeeds.
pub const CONFIG_DIR: &str = "/etc/proxy-lab";

/// Glob enumerated by configuration introspection.
const CONFIG_PATTERN: &str = "*.cfg.xml";

const DEFAULT_ORIGIN_IMAGE: &str = "proxy-lab/origin";
const DEFAULT_PROXY_IMAGE: &str = "proxy-lab/proxy";

/// Proof that an origin was created for this build request, on this cluster.
///
/// `create_proxy` refuses a handle minted against a different cluster, which
/// is the ordering invariant: a proxy is only ever wired to an origin from
/// its own build.
#[derive(Debug, Clone)]
pub struct OriginHandle {
    id: String,
    cluster_key: String,
}

impl OriginHandle {
    pub fn new(id: impl Into<String>, cluster: &Cluster) -> Self {
        Self {
            id: id.into(),
            cluster_key: cluster.key(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Provisions linked origin/proxy pairs and drives instance lifecycles.
pub struct Provisioner {
    runtime: Arc<dyn ContainerRuntime>,
    origin_image: String,
    proxy_image: String,
}

impl Provisioner {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            origin_image: DEFAULT_ORIGIN_IMAGE.to_string(),
            proxy_image: DEFAULT_PROXY_IMAGE.to_string(),
        }
    }

    /// Override the image repositories (tags are always the version id).
    pub fn with_images(mut self, origin: impl Into<String>, proxy: impl Into<String>) -> Self {
        self.origin_image = origin.into();
        self.proxy_image = proxy.into();
        self
    }

    /// Create and start the origin backend for a build request.
    pub async fn create_origin(
        &self,
        cluster: &Cluster,
        user: &User,
        version_id: &str,
    ) -> Result<OriginHandle> {
        let name = container_name(Role::Origin, &user.username);
        let spec = ContainerSpec {
            name: name.clone(),
            image: format!("{}:{}", self.origin_image, version_id),
            labels: base_labels(user, Role::Origin, version_id),
            links: Vec::new(),
            publish_port: None,
        };
        let id = self.runtime.create(cluster, &spec).await?;
        self.runtime.start(cluster, &id).await?;
        info!(%name, %id, version_id, "origin container running");
        Ok(OriginHandle::new(id, cluster))
    }

    /// Create and start the proxy instance, wired to its origin, with the
    /// configuration artifacts baked in before first start.
    ///
    /// Must follow a successful [`create_origin`](Self::create_origin) for
    /// the same build request; a missing or foreign handle fails with
    /// [`Error::Dependency`] before any remote call is made.
    pub async fn create_proxy(
        &self,
        cluster: &Cluster,
        user: &User,
        version_id: &str,
        artifacts: &[Artifact],
        origin: &OriginHandle,
    ) -> Result<String> {
        if origin.id.is_empty() {
            return Err(Error::Dependency(
                "proxy creation requires a created origin container".to_string(),
            ));
        }
        if origin.cluster_key != cluster.key() {
            return Err(Error::Dependency(format!(
                "origin container belongs to cluster '{}', not '{}'",
                origin.cluster_key,
                cluster.key()
            )));
        }

        let name = container_name(Role::Proxy, &user.username);
        let mut labels = base_labels(user, Role::Proxy, version_id);
        labels.insert(LABEL_ORIGIN.to_string(), origin.id.clone());
        let spec = ContainerSpec {
            name: name.clone(),
            image: format!("{}:{}", self.proxy_image, version_id),
            labels,
            links: vec![(origin.id.clone(), ORIGIN_ALIAS.to_string())],
            publish_port: Some(PROXY_PORT),
        };

        let id = self.runtime.create(cluster, &spec).await?;
        for artifact in artifacts {
            let path = format!("{CONFIG_DIR}/{}", trailing_name(&artifact.name));
            self.runtime
                .copy_in(cluster, &id, &path, &artifact.content)
                .await?;
        }
        self.runtime.start(cluster, &id).await?;
        info!(%name, %id, origin = %origin.id, version_id, "proxy instance running");
        Ok(id)
    }

    /// All instances on the cluster belonging to the user.
    pub async fn list(&self, cluster: &Cluster, user: &User) -> Result<Vec<Instance>> {
        self.runtime
            .list_labeled(cluster, &format!("{LABEL_OWNER}={}", user.username))
            .await
    }

    /// Start an instance. `false` means it was already running.
    pub async fn start(&self, cluster: &Cluster, id: &str) -> Result<bool> {
        self.runtime.start(cluster, id).await
    }

    /// Stop an instance. `false` means it was already stopped.
    pub async fn stop(&self, cluster: &Cluster, id: &str) -> Result<bool> {
        self.runtime.stop(cluster, id).await
    }

    /// Read back the configuration documents inside a container, one
    /// isolated exec per file. Introspection only; not the provisioning path.
    pub async fn fetch_configurations(&self, cluster: &Cluster, id: &str) -> Result<Vec<Artifact>> {
        let listing = self
            .runtime
            .exec(
                cluster,
                id,
                &["sh", "-c", &format!("ls {CONFIG_DIR}/{CONFIG_PATTERN} 2>/dev/null")],
            )
            .await?;

        let mut artifacts = Vec::new();
        for path in listing.stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let read = self.runtime.exec(cluster, id, &["cat", path]).await?;
            if read.success() {
                artifacts.push(Artifact::new(trailing_name(path), read.stdout));
            } else {
                warn!(container = id, path, stderr = %read.stderr, "unreadable configuration file skipped");
            }
        }
        Ok(artifacts)
    }
}

fn base_labels(user: &User, role: Role, version_id: &str) -> HashMap<String, String> {
    HashMap::from([
        (LABEL_OWNER.to_string(), user.username.clone()),
        (LABEL_ROLE.to_string(), role.as_str().to_string()),
        (LABEL_VERSION.to_string(), version_id.to_string()),
    ])
}

/// Container name: `plab-<role>-<sanitized user>-<random suffix>`.
///
/// The random suffix keeps concurrent builds for the same user from
/// colliding; two simultaneous build requests legitimately produce two
/// independent pairs.
fn container_name(role: Role, username: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "plab-{}-{}-{}",
        role.as_str(),
        sanitize_name_component(username),
        &suffix[..8]
    )
}

/// Sanitize a string for use in Docker container names, which must match
/// `[a-zA-Z0-9][a-zA-Z0-9_.-]*`. Invalid characters become underscores and
/// components are capped at 32 characters.
fn sanitize_name_component(input: &str) -> String {
    const MAX_COMPONENT_LEN: usize = 32;

    let sanitized: String = input
        .chars()
        .take(MAX_COMPONENT_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        return "unnamed".to_string();
    }
    // First char must be alphanumeric; all chars are ASCII after the map, so
    // byte slicing at offset 1 is safe.
    if sanitized.starts_with(|c: char| !c.is_ascii_alphanumeric()) {
        format!("x{}", &sanitized[1..])
    } else {
        sanitized
    }
}
