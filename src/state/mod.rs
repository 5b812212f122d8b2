//! Cluster record persistence.
//!
//! The store holds the only shared mutable state in the crate: one cluster
//! record per (owner, name). Reads interleave freely; writes are
//! last-writer-wins upserts so concurrent resolutions never corrupt or
//! duplicate a record.

mod sqlite;

pub use sqlite::SqliteClusterStore;

use crate::cluster::Cluster;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Persistence seam for cluster records. The resolver is the sole writer.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn get(&self, owner: &str, name: &str) -> Result<Option<Cluster>>;

    /// Insert or replace the record for `(cluster.owner, cluster.name)`.
    async fn upsert(&self, cluster: &Cluster) -> Result<()>;

    async fn list(&self, owner: &str) -> Result<Vec<Cluster>>;
}

/// In-memory store for tests and embedders that persist records themselves.
#[derive(Default)]
pub struct MemoryClusterStore {
    records: RwLock<HashMap<(String, String), Cluster>>,
}

impl MemoryClusterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClusterStore for MemoryClusterStore {
    async fn get(&self, owner: &str, name: &str) -> Result<Option<Cluster>> {
        let records = self.records.read().await;
        Ok(records.get(&(owner.to_string(), name.to_string())).cloned())
    }

    async fn upsert(&self, cluster: &Cluster) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(
            (cluster.owner.clone(), cluster.name.clone()),
            cluster.clone(),
        );
        Ok(())
    }

    async fn list(&self, owner: &str) -> Result<Vec<Cluster>> {
        let records = self.records.read().await;
        let mut clusters: Vec<Cluster> = records
            .values()
            .filter(|c| c.owner == owner)
            .cloned()
            .collect();
        clusters.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(clusters)
    }
}
