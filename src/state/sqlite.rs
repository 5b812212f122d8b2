use super::ClusterStore;
use crate::cluster::{Cluster, TlsBundle};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::OptionalExtension;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio_rusqlite::Connection;
use tracing::debug;

const DB_FILE_NAME: &str = "clusters.db";

/// SQLite-backed cluster store.
///
/// WAL mode gives crash recovery; the composite primary key plus
/// `INSERT OR REPLACE` gives the one-record-per-(owner, name) invariant with
/// last-writer-wins semantics under concurrent resolutions.
pub struct SqliteClusterStore {
    conn: Connection,
}

impl SqliteClusterStore {
    /// Open (or create) the store under `data_dir`.
    pub async fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        let db_path: PathBuf = data_dir.join(DB_FILE_NAME);

        let conn = Connection::open(&db_path).await?;
        conn.call(|conn: &mut rusqlite::Connection| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            Ok(())
        })
        .await?;

        let store = Self { conn };
        store.init_schema().await?;
        debug!(?db_path, "cluster store opened");
        Ok(store)
    }

    /// Ephemeral in-memory store, for tests.
    pub async fn new_in_memory() -> Result<Self> {
        let conn = Connection::open(":memory:").await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        self.conn
            .call(|conn: &mut rusqlite::Connection| {
                conn.execute(
                    "CREATE TABLE IF NOT EXISTS clusters (
                        owner TEXT NOT NULL,
                        name TEXT NOT NULL,
                        endpoint TEXT NOT NULL,
                        ca_cert TEXT NOT NULL,
                        ca_key TEXT,
                        client_cert TEXT NOT NULL,
                        client_key TEXT NOT NULL,
                        env TEXT NOT NULL,
                        created_at TEXT NOT NULL,
                        PRIMARY KEY (owner, name)
                    )",
                    [],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

/// Map one row onto a [`Cluster`]. Runs inside the connection thread, so
/// conversion failures surface as rusqlite errors.
fn row_to_cluster(row: &rusqlite::Row<'_>) -> rusqlite::Result<Cluster> {
    let env_json: String = row.get(7)?;
    let env: HashMap<String, String> = serde_json::from_str(&env_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;
    let created_at_str: String = row.get(8)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_at_str)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(Cluster {
        owner: row.get(0)?,
        name: row.get(1)?,
        endpoint: row.get(2)?,
        tls: TlsBundle {
            ca_cert: row.get(3)?,
            ca_key: row.get(4)?,
            client_cert: row.get(5)?,
            client_key: row.get(6)?,
        },
        env,
        created_at,
    })
}

#[async_trait]
impl ClusterStore for SqliteClusterStore {
    async fn get(&self, owner: &str, name: &str) -> Result<Option<Cluster>> {
        let owner = owner.to_string();
        let name = name.to_string();
        let cluster = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| {
                let cluster = conn
                    .query_row(
                        "SELECT owner, name, endpoint, ca_cert, ca_key, client_cert, client_key, env, created_at
                         FROM clusters WHERE owner = ?1 AND name = ?2",
                        rusqlite::params![owner, name],
                        row_to_cluster,
                    )
                    .optional()?;
                Ok(cluster)
            })
            .await?;
        Ok(cluster)
    }

    async fn upsert(&self, cluster: &Cluster) -> Result<()> {
        let env_json = serde_json::to_string(&cluster.env)
            .map_err(|e| Error::Config(format!("unserializable cluster env: {e}")))?;
        let cluster = cluster.clone();
        self.conn
            .call(move |conn: &mut rusqlite::Connection| {
                conn.execute(
                    "INSERT OR REPLACE INTO clusters
                     (owner, name, endpoint, ca_cert, ca_key, client_cert, client_key, env, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    rusqlite::params![
                        cluster.owner,
                        cluster.name,
                        cluster.endpoint,
                        cluster.tls.ca_cert,
                        cluster.tls.ca_key,
                        cluster.tls.client_cert,
                        cluster.tls.client_key,
                        env_json,
                        cluster.created_at.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn list(&self, owner: &str) -> Result<Vec<Cluster>> {
        let owner = owner.to_string();
        let clusters = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| {
                let mut stmt = conn.prepare(
                    "SELECT owner, name, endpoint, ca_cert, ca_key, client_cert, client_key, env, created_at
                     FROM clusters WHERE owner = ?1 ORDER BY name",
                )?;
                let rows = stmt.query_map(rusqlite::params![owner], row_to_cluster)?;
                let mut clusters = Vec::new();
                for row in rows {
                    clusters.push(row?);
                }
                Ok(clusters)
            })
            .await?;
        Ok(clusters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(owner: &str, name: &str, endpoint: &str) -> Cluster {
        Cluster {
            owner: owner.into(),
            name: name.into(),
            endpoint: endpoint.into(),
            tls: TlsBundle {
                ca_cert: "CA CERT".into(),
                client_cert: "CLIENT CERT".into(),
                client_key: "CLIENT KEY".into(),
                ca_key: Some("CA KEY".into()),
            },
            env: HashMap::from([
                ("DOCKER_HOST".to_string(), endpoint.to_string()),
                ("DOCKER_TLS_VERIFY".to_string(), "1".to_string()),
            ]),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn round_trips_a_full_record() {
        let store = SqliteClusterStore::new_in_memory().await.unwrap();
        let cluster = sample("alice", "default", "tcp://10.0.0.9:2376");
        store.upsert(&cluster).await.unwrap();

        let fetched = store.get("alice", "default").await.unwrap().unwrap();
        assert_eq!(fetched.endpoint, cluster.endpoint);
        assert_eq!(fetched.tls, cluster.tls);
        assert_eq!(fetched.env, cluster.env);
    }

    #[tokio::test]
    async fn get_returns_none_for_missing_record() {
        let store = SqliteClusterStore::new_in_memory().await.unwrap();
        assert!(store.get("alice", "default").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_overwrites_silently() {
        let store = SqliteClusterStore::new_in_memory().await.unwrap();
        store
            .upsert(&sample("alice", "default", "tcp://old:2376"))
            .await
            .unwrap();
        store
            .upsert(&sample("alice", "default", "tcp://new:2376"))
            .await
            .unwrap();

        let listed = store.list("alice").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].endpoint, "tcp://new:2376");
    }

    #[tokio::test]
    async fn list_is_scoped_and_ordered() {
        let store = SqliteClusterStore::new_in_memory().await.unwrap();
        store
            .upsert(&sample("alice", "beta", "tcp://b:2376"))
            .await
            .unwrap();
        store
            .upsert(&sample("alice", "alpha", "tcp://a:2376"))
            .await
            .unwrap();
        store
            .upsert(&sample("bob", "alpha", "tcp://c:2376"))
            .await
            .unwrap();

        let listed = store.list("alice").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "alpha");
        assert_eq!(listed[1].name, "beta");
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SqliteClusterStore::new(dir.path()).await.unwrap();
            store
                .upsert(&sample("alice", "default", "tcp://h:2376"))
                .await
                .unwrap();
        }
        let store = SqliteClusterStore::new(dir.path()).await.unwrap();
        assert!(store.get("alice", "default").await.unwrap().is_some());
    }
}
