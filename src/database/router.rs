use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{PgPool, Postgres};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::policy::{
    archive_connection_name, read_connection_name, write_connection_name, TenantContext,
};
use super::registry::ConnectionRegistry;
use crate::config::TenancyConfig;
use crate::services::provisioning::{ProvisionOutcome, ProvisioningError, ProvisioningService};

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("No connection registered under '{0}'")]
    NotFound(String),

    #[error("Query failed on '{name}': {source}")]
    Query {
        name: String,
        #[source]
        source: sqlx::Error,
    },
}

/// Startup progression of the router. A failed transition parks the router
/// in `Failed`; the process must not serve traffic from there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterState {
    Uninitialized,
    MainReady,
    ReplicaReady,
    ArchiveReady,
    Ready,
    Failed,
}

/// Public façade over the registry: resolves an optional tenant context and
/// a resource kind to a live pool, and fronts the provisioning workflow.
pub struct TenantRouter {
    registry: Arc<ConnectionRegistry>,
    provisioner: ProvisioningService,
    tenancy: TenancyConfig,
    state: RwLock<RouterState>,
}

impl TenantRouter {
    pub fn new(
        tenancy: TenancyConfig,
        registry: Arc<ConnectionRegistry>,
        provisioner: ProvisioningService,
    ) -> Self {
        Self {
            registry,
            provisioner,
            tenancy,
            state: RwLock::new(RouterState::Uninitialized),
        }
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    pub async fn state(&self) -> RouterState {
        *self.state.read().await
    }

    pub async fn is_ready(&self) -> bool {
        self.state().await == RouterState::Ready
    }

    /// Drive the startup sequence: main, then conditionally the global
    /// replica and archive connections. Fail-fast: any error leaves the
    /// router `Failed` and propagates.
    pub async fn bootstrap(&self) -> Result<(), ProvisioningError> {
        let result = self.run_bootstrap().await;
        if result.is_err() {
            *self.state.write().await = RouterState::Failed;
        }
        result
    }

    async fn run_bootstrap(&self) -> Result<(), ProvisioningError> {
        self.provisioner.provision_main().await?;
        *self.state.write().await = RouterState::MainReady;

        if self.tenancy.auto_replica {
            self.provisioner.provision_global_replica().await?;
            *self.state.write().await = RouterState::ReplicaReady;
        }
        if self.tenancy.auto_archive {
            self.provisioner.provision_global_archive().await?;
            *self.state.write().await = RouterState::ArchiveReady;
        }

        *self.state.write().await = RouterState::Ready;
        info!(
            "Router ready: mode {}, auto_replica {}, auto_archive {}",
            self.tenancy.mode, self.tenancy.auto_replica, self.tenancy.auto_archive
        );
        Ok(())
    }

    /// Resolve the write connection. A miss is a hard failure; there is no
    /// safe fallback for writes.
    pub async fn write_pool(&self, context: Option<&TenantContext>) -> Result<PgPool, RouteError> {
        let name = write_connection_name(self.tenancy.mode, tenant_of(context));
        self.registry
            .get(&name)
            .await
            .ok_or_else(|| RouteError::NotFound(name))
    }

    /// Resolve the read connection, falling back to the write path when no
    /// replica is registered. Reads never hard-fail solely because replica
    /// infrastructure is missing.
    pub async fn read_pool(&self, context: Option<&TenantContext>) -> Result<PgPool, RouteError> {
        let name = read_connection_name(tenant_of(context));
        match self.registry.get(&name).await {
            Some(pool) => Ok(pool),
            None => {
                debug!("No replica registered under '{}', using write path", name);
                self.write_pool(context).await
            }
        }
    }

    /// Resolve the archive connection. A miss is a hard failure; archive
    /// data is not substitutable by the write path.
    pub async fn archive_pool(
        &self,
        context: Option<&TenantContext>,
    ) -> Result<PgPool, RouteError> {
        let name = archive_connection_name(tenant_of(context));
        self.registry
            .get(&name)
            .await
            .ok_or_else(|| RouteError::NotFound(name))
    }

    /// Route a statement like a write and fetch its rows.
    pub async fn execute_query(
        &self,
        sql: &str,
        params: &[Value],
        context: Option<&TenantContext>,
    ) -> Result<Vec<PgRow>, RouteError> {
        let name = write_connection_name(self.tenancy.mode, tenant_of(context));
        let pool = self
            .registry
            .get(&name)
            .await
            .ok_or_else(|| RouteError::NotFound(name.clone()))?;

        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_param(query, param);
        }
        query
            .fetch_all(&pool)
            .await
            .map_err(|source| RouteError::Query { name, source })
    }

    /// Registry membership check for the tenant's write connection. O(1),
    /// no I/O.
    pub async fn tenant_exists(&self, tenant_id: &str) -> bool {
        let name = write_connection_name(self.tenancy.mode, Some(tenant_id));
        self.registry.has(&name).await
    }

    /// Entry point for the tenant on-boarding workflow.
    pub async fn provision_tenant(
        &self,
        tenant_id: &str,
    ) -> Result<ProvisionOutcome, ProvisioningError> {
        self.provisioner.provision_tenant(tenant_id).await
    }

    pub async fn deprovision_tenant(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<String>, ProvisioningError> {
        self.provisioner.deprovision_tenant(tenant_id).await
    }
}

fn tenant_of<'a>(context: Option<&'a TenantContext>) -> Option<&'a str> {
    context.map(|c| c.tenant_id.as_str())
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                q.bind(u as i64)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()), // JSONB
    }
}
