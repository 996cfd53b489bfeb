use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::config::{ConnectionMap, ConnectionSettings, TenancyConfig};
use crate::database::descriptor::ConnectionDescriptor;
use crate::database::factory::{ConnectionError, ConnectionFactory};
use crate::database::policy::{
    archive_connection_name, is_valid_tenant_id, quote_identifier, read_connection_name,
    tenant_archive_database_name, tenant_database_name, tenant_replica_database_name,
    tenant_schema_name, write_connection_name, TenancyMode, ARCHIVE_CONNECTION, MAIN_CONNECTION,
    REPLICA_CONNECTION,
};
use crate::database::registry::ConnectionRegistry;

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("Invalid tenant id: {0}")]
    InvalidTenantId(String),

    #[error("No connection settings named '{0}' configured")]
    MissingConnection(String),

    #[error("Main connection is not registered; bootstrap must run first")]
    MainNotReady,

    #[error("Failed to create schema {schema}: {source}")]
    CreateSchema {
        schema: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to create database {database}: {source}")]
    CreateDatabase {
        database: String,
        #[source]
        source: sqlx::Error,
    },

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Result of a tenant provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// Single mode: the tenant shares main storage, nothing was created.
    SharedStorage,
    /// The tenant's primary connection was already registered.
    AlreadyProvisioned,
    /// Storage was created and these logical connections registered.
    Provisioned { connections: Vec<String> },
}

#[derive(Clone, Copy)]
enum Satellite {
    Replica,
    Archive,
}

/// Brings tenant storage online: drives DDL through the main connection,
/// then materializes the tenant's dedicated connections in the registry.
pub struct ProvisioningService {
    registry: Arc<ConnectionRegistry>,
    factory: ConnectionFactory,
    tenancy: TenancyConfig,
    connections: ConnectionMap,
    // Serializes concurrent provisioning of the same tenant id; different
    // tenants proceed in parallel.
    tenant_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ProvisioningService {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        factory: ConnectionFactory,
        tenancy: TenancyConfig,
        connections: ConnectionMap,
    ) -> Self {
        Self {
            registry,
            factory,
            tenancy,
            connections,
            tenant_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn tenancy(&self) -> &TenancyConfig {
        &self.tenancy
    }

    /// Open and register the main connection from the default settings.
    pub async fn provision_main(&self) -> Result<(), ProvisioningError> {
        self.open_global(MAIN_CONNECTION, &self.tenancy.default_connection)
            .await
    }

    /// Open and register the global read replica.
    pub async fn provision_global_replica(&self) -> Result<(), ProvisioningError> {
        self.open_global(REPLICA_CONNECTION, &self.tenancy.replica_connection)
            .await
    }

    /// Open and register the global archive store.
    pub async fn provision_global_archive(&self) -> Result<(), ProvisioningError> {
        self.open_global(ARCHIVE_CONNECTION, &self.tenancy.archive_connection)
            .await
    }

    async fn open_global(
        &self,
        logical_name: &str,
        settings_name: &str,
    ) -> Result<(), ProvisioningError> {
        let settings = self.settings(settings_name)?;
        let descriptor = ConnectionDescriptor::from_settings(logical_name, settings);
        let pool = self.factory.open(&descriptor).await.map_err(|e| {
            error!("Failed to open global connection '{}': {}", logical_name, e);
            e
        })?;
        self.registry.put(logical_name, pool).await;
        Ok(())
    }

    /// Bring a tenant's storage online.
    ///
    /// Schema/database creation completes before the dedicated connection is
    /// opened against it; steps are strictly sequential per tenant. The first
    /// failing step aborts the rest and surfaces the error; partially created
    /// storage is not rolled back.
    pub async fn provision_tenant(
        &self,
        tenant_id: &str,
    ) -> Result<ProvisionOutcome, ProvisioningError> {
        if !is_valid_tenant_id(tenant_id) {
            return Err(ProvisioningError::InvalidTenantId(tenant_id.to_string()));
        }

        if self.tenancy.mode == TenancyMode::Single {
            debug!(
                "Tenant {} shares main storage, nothing to provision",
                tenant_id
            );
            return Ok(ProvisionOutcome::SharedStorage);
        }

        let lock = self.tenant_lock(tenant_id).await;
        let _guard = lock.lock().await;

        let primary_name = write_connection_name(self.tenancy.mode, Some(tenant_id));
        // Re-provisioning is a designed no-op, not a second round of DDL
        if self.registry.has(&primary_name).await {
            debug!("Tenant {} is already provisioned", tenant_id);
            return Ok(ProvisionOutcome::AlreadyProvisioned);
        }

        let mut registered = Vec::new();
        self.provision_tenant_primary(tenant_id, &primary_name)
            .await
            .map_err(|e| {
                error!(
                    "Provisioning tenant {} failed at '{}': {}",
                    tenant_id, primary_name, e
                );
                e
            })?;
        registered.push(primary_name);

        if self.tenancy.auto_replica {
            let name = read_connection_name(Some(tenant_id));
            self.provision_tenant_satellite(tenant_id, &name, Satellite::Replica)
                .await
                .map_err(|e| {
                    error!(
                        "Provisioning tenant {} failed at '{}': {}",
                        tenant_id, name, e
                    );
                    e
                })?;
            registered.push(name);
        }

        if self.tenancy.auto_archive {
            let name = archive_connection_name(Some(tenant_id));
            self.provision_tenant_satellite(tenant_id, &name, Satellite::Archive)
                .await
                .map_err(|e| {
                    error!(
                        "Provisioning tenant {} failed at '{}': {}",
                        tenant_id, name, e
                    );
                    e
                })?;
            registered.push(name);
        }

        info!(
            "Provisioned tenant {}: {}",
            tenant_id,
            registered.join(", ")
        );
        Ok(ProvisionOutcome::Provisioned {
            connections: registered,
        })
    }

    async fn provision_tenant_primary(
        &self,
        tenant_id: &str,
        logical_name: &str,
    ) -> Result<(), ProvisioningError> {
        let main = self.main_pool().await?;
        let base = self.settings(&self.tenancy.default_connection)?.clone();

        let descriptor = match self.tenancy.mode {
            TenancyMode::Single => unreachable!("single mode returns before DDL"),
            TenancyMode::MultiSchema => {
                let schema = tenant_schema_name(tenant_id);
                // Idempotent, safe to retry
                sqlx::query(&format!(
                    "CREATE SCHEMA IF NOT EXISTS {}",
                    quote_identifier(&schema)
                ))
                .execute(&main)
                .await
                .map_err(|source| ProvisioningError::CreateSchema {
                    schema: schema.clone(),
                    source,
                })?;
                ConnectionDescriptor::from_settings(logical_name, &base).with_schema(schema)
            }
            TenancyMode::MultiDatabase => {
                let database = tenant_database_name(&base.database, tenant_id);
                match sqlx::query(&format!("CREATE DATABASE {}", quote_identifier(&database)))
                    .execute(&main)
                    .await
                {
                    Ok(_) => {}
                    // duplicate_database: object survived an earlier partial run
                    Err(e) if is_duplicate_database(&e) => {
                        info!("Database {} already exists, reusing it", database);
                    }
                    Err(source) => {
                        return Err(ProvisioningError::CreateDatabase { database, source });
                    }
                }
                ConnectionDescriptor::from_settings(logical_name, &base).with_database(database)
            }
        };

        let pool = self.factory.open(&descriptor).await?;
        self.registry.put(logical_name, pool).await;
        Ok(())
    }

    /// Open a tenant replica or archive connection. No DDL: replicas and
    /// archive stores track the primary through their own machinery.
    async fn provision_tenant_satellite(
        &self,
        tenant_id: &str,
        logical_name: &str,
        kind: Satellite,
    ) -> Result<(), ProvisioningError> {
        let settings_name = match kind {
            Satellite::Replica => &self.tenancy.replica_connection,
            Satellite::Archive => &self.tenancy.archive_connection,
        };
        let settings = self.settings(settings_name)?.clone();
        let descriptor = match self.tenancy.mode {
            TenancyMode::Single => return Ok(()),
            TenancyMode::MultiSchema => ConnectionDescriptor::from_settings(logical_name, &settings)
                .with_schema(tenant_schema_name(tenant_id)),
            TenancyMode::MultiDatabase => {
                let main_base = self.settings(&self.tenancy.default_connection)?;
                let database = match kind {
                    Satellite::Replica => {
                        tenant_replica_database_name(&main_base.database, tenant_id)
                    }
                    Satellite::Archive => {
                        tenant_archive_database_name(&main_base.database, tenant_id)
                    }
                };
                ConnectionDescriptor::from_settings(logical_name, &settings).with_database(database)
            }
        };

        let pool = self.factory.open(&descriptor).await?;
        self.registry.put(logical_name, pool).await;
        Ok(())
    }

    /// Tear down a tenant's registered connections. Pools are closed and
    /// evicted; the schema/database itself is retained for the operator.
    pub async fn deprovision_tenant(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<String>, ProvisioningError> {
        if !is_valid_tenant_id(tenant_id) {
            return Err(ProvisioningError::InvalidTenantId(tenant_id.to_string()));
        }
        if self.tenancy.mode == TenancyMode::Single {
            return Ok(Vec::new());
        }

        let lock = self.tenant_lock(tenant_id).await;
        let _guard = lock.lock().await;

        let candidates = [
            write_connection_name(self.tenancy.mode, Some(tenant_id)),
            read_connection_name(Some(tenant_id)),
            archive_connection_name(Some(tenant_id)),
        ];
        let mut closed = Vec::new();
        for name in candidates {
            if self.registry.close(&name).await {
                closed.push(name);
            }
        }
        if !closed.is_empty() {
            info!(
                "Deprovisioned tenant {}: closed {}",
                tenant_id,
                closed.join(", ")
            );
        }
        Ok(closed)
    }

    async fn tenant_lock(&self, tenant_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.tenant_locks.lock().await;
        locks
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn settings(&self, name: &str) -> Result<&ConnectionSettings, ProvisioningError> {
        self.connections
            .get(name)
            .ok_or_else(|| ProvisioningError::MissingConnection(name.to_string()))
    }

    async fn main_pool(&self) -> Result<PgPool, ProvisioningError> {
        self.registry
            .get(MAIN_CONNECTION)
            .await
            .ok_or(ProvisioningError::MainNotReady)
    }
}

fn is_duplicate_database(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("42P04"),
        _ => false,
    }
}
