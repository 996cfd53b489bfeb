use std::collections::HashMap;

use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Process-wide store of live connection pools, keyed by logical name.
///
/// Owned explicitly and constructor-injected into every component that needs
/// connection lookup; all mutation goes through the single lock here. Pools
/// are shared handles, so `get`/`all` hand out clones and callers never close
/// an entry directly.
pub struct ConnectionRegistry {
    pools: RwLock<HashMap<String, PgPool>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or overwrite the pool registered under `name`.
    pub async fn put(&self, name: impl Into<String>, pool: PgPool) {
        let name = name.into();
        let previous = self.pools.write().await.insert(name.clone(), pool);
        if previous.is_some() {
            warn!("Replaced existing connection registration '{}'", name);
        }
    }

    pub async fn get(&self, name: &str) -> Option<PgPool> {
        self.pools.read().await.get(name).cloned()
    }

    pub async fn has(&self, name: &str) -> bool {
        self.pools.read().await.contains_key(name)
    }

    /// Snapshot copy of every registered (name, pool) pair.
    ///
    /// Callers iterating the result (health checks) never race a concurrent
    /// `put`; the snapshot is detached from the live map.
    pub async fn all(&self) -> Vec<(String, PgPool)> {
        self.pools
            .read()
            .await
            .iter()
            .map(|(name, pool)| (name.clone(), pool.clone()))
            .collect()
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn remove(&self, name: &str) -> Option<PgPool> {
        self.pools.write().await.remove(name)
    }

    /// Remove and close the pool registered under `name`.
    pub async fn close(&self, name: &str) -> bool {
        match self.remove(name).await {
            Some(pool) => {
                pool.close().await;
                info!("Closed connection pool '{}'", name);
                true
            }
            None => false,
        }
    }

    /// Close and remove all pools (process shutdown).
    pub async fn close_all(&self) {
        let drained: Vec<(String, PgPool)> = self.pools.write().await.drain().collect();
        for (name, pool) in drained {
            pool.close().await;
            info!("Closed connection pool '{}'", name);
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
