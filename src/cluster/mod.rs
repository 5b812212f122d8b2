//! Cluster resolution.
//!
//! A cluster is a named remote pool of compute reachable via one TLS-secured
//! Docker endpoint, scoped to one user. The [`Resolver`] is the sole writer
//! of cluster records: it serves cache hits from the store, adopts clusters
//! the control plane already reports active, provisions new ones when the
//! caller allows it, and extracts the credential bundle either way.

pub mod control_plane;
pub mod credentials;

pub use control_plane::{ClusterStatus, ControlPlane, HttpControlPlane};

use crate::auth::User;
use crate::error::{Error, Result};
use crate::state::ClusterStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// TLS material for the remote Docker endpoint. The CA key is only present
/// when the control plane hands it out; nothing in this crate needs it, but
/// it is kept so the record round-trips the whole credential bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsBundle {
    pub ca_cert: String,
    pub client_cert: String,
    pub client_key: String,
    pub ca_key: Option<String>,
}

/// A persisted cluster record. At most one exists per (owner, name); the
/// store upserts with last-writer-wins so duplicate-create races never
/// produce duplicate rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Owner key: the username, or the tenant id under admin scope.
    pub owner: String,
    pub name: String,
    /// Remote daemon endpoint, `tcp://host:port` form.
    pub endpoint: String,
    pub tls: TlsBundle,
    /// Environment needed to address the remote daemon, from the bundle's
    /// connection descriptor.
    pub env: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Cluster {
    /// Store key, unique per record.
    pub fn key(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Host portion of the endpoint (`tcp://1.2.3.4:2376` → `1.2.3.4`).
    pub fn endpoint_host(&self) -> &str {
        let rest = self
            .endpoint
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.endpoint);
        rest.rsplit_once(':').map(|(host, _)| host).unwrap_or(rest)
    }
}

/// Fetch-or-create resolution of per-user clusters.
pub struct Resolver {
    store: Arc<dyn ClusterStore>,
    control_plane: Arc<dyn ControlPlane>,
}

impl Resolver {
    pub fn new(store: Arc<dyn ClusterStore>, control_plane: Arc<dyn ControlPlane>) -> Self {
        Self {
            store,
            control_plane,
        }
    }

    /// Resolve a cluster handle for (user, name).
    ///
    /// A stored record is returned immediately with no remote round trip.
    /// Otherwise the control plane is consulted: an `active` cluster is
    /// adopted as-is; anything else is created when `allow_create` is set and
    /// fails with [`Error::ClusterNotFound`] when it is not. The credential
    /// bundle is then fetched, extracted, persisted, and returned.
    ///
    /// Concurrent resolutions for the same key may both reach the control
    /// plane; its own idempotency is inherited. Locally the upsert keeps the
    /// one-record-per-key invariant.
    pub async fn resolve(
        &self,
        user: &User,
        name: &str,
        allow_create: bool,
        admin_scope: bool,
    ) -> Result<Cluster> {
        let owner = if admin_scope {
            user.tenant_id.as_str()
        } else {
            user.username.as_str()
        };

        if let Some(cluster) = self.store.get(owner, name).await? {
            debug!(owner, name, "cluster record found, no remote round trip");
            return Ok(cluster);
        }

        match self.control_plane.status(user, name).await? {
            ClusterStatus::Active => {
                debug!(owner, name, "remote cluster already active, adopting");
            }
            status if allow_create => {
                info!(owner, name, ?status, "creating remote cluster");
                self.control_plane.create(user, name).await?;
            }
            _ => {
                return Err(Error::ClusterNotFound {
                    user: owner.to_string(),
                    name: name.to_string(),
                })
            }
        }

        let archive = self.control_plane.credentials(user, name).await?;
        let bundle = credentials::extract(&archive)?;

        let cluster = Cluster {
            owner: owner.to_string(),
            name: name.to_string(),
            endpoint: bundle.endpoint,
            tls: bundle.tls,
            env: bundle.env,
            created_at: Utc::now(),
        };
        self.store.upsert(&cluster).await?;
        info!(owner, name, endpoint = %cluster.endpoint, "cluster record persisted");
        Ok(cluster)
    }
}
