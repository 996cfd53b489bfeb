use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use sqlx::PgPool;
use tracing::warn;

use crate::database::registry::ConnectionRegistry;

/// Liveness verdict for one registered connection.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionHealth {
    pub name: String,
    pub healthy: bool,
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated verdict across every registered connection.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub checked_at: DateTime<Utc>,
    pub connections: Vec<ConnectionHealth>,
}

/// Probes every pool in the registry with a trivial liveness query.
pub struct HealthService {
    registry: Arc<ConnectionRegistry>,
    probe_timeout: Duration,
}

impl HealthService {
    pub fn new(registry: Arc<ConnectionRegistry>, probe_timeout: Duration) -> Self {
        Self {
            registry,
            probe_timeout,
        }
    }

    /// Snapshot the registry and probe each connection concurrently.
    pub async fn check_all(&self) -> HealthReport {
        let snapshot = self.registry.all().await;
        let probes = snapshot
            .into_iter()
            .map(|(name, pool)| probe(name, pool, self.probe_timeout));

        let mut connections: Vec<ConnectionHealth> = join_all(probes).await;
        connections.sort_by(|a, b| a.name.cmp(&b.name));

        HealthReport {
            healthy: connections.iter().all(|c| c.healthy),
            checked_at: Utc::now(),
            connections,
        }
    }
}

async fn probe(name: String, pool: PgPool, timeout: Duration) -> ConnectionHealth {
    let started = Instant::now();
    let result = tokio::time::timeout(timeout, sqlx::query("SELECT 1").execute(&pool)).await;
    let latency_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(_)) => ConnectionHealth {
            name,
            healthy: true,
            latency_ms: Some(latency_ms),
            error: None,
        },
        Ok(Err(e)) => {
            warn!("Health probe failed for '{}': {}", name, e);
            ConnectionHealth {
                name,
                healthy: false,
                latency_ms: Some(latency_ms),
                error: Some(e.to_string()),
            }
        }
        Err(_) => {
            warn!("Health probe timed out for '{}'", name);
            ConnectionHealth {
                name,
                healthy: false,
                latency_ms: None,
                error: Some(format!("probe timed out after {:?}", timeout)),
            }
        }
    }
}
