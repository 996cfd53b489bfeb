#![allow(dead_code)]

use std::sync::Arc;

use stratum::config::{ConnectionMap, ConnectionSettings, DatabaseConfig, TenancyConfig};
use stratum::database::factory::ConnectionFactory;
use stratum::database::policy::TenancyMode;
use stratum::database::registry::ConnectionRegistry;
use stratum::database::router::TenantRouter;
use stratum::services::provisioning::ProvisioningService;

/// Integration tests need a throwaway Postgres. Set
/// STRATUM_TEST_DATABASE_URL to run them; they skip silently otherwise.
pub fn test_database_url() -> Option<String> {
    std::env::var("STRATUM_TEST_DATABASE_URL").ok()
}

pub fn test_settings(url: &str) -> ConnectionSettings {
    ConnectionSettings::from_url(url).expect("STRATUM_TEST_DATABASE_URL must be a postgres URL")
}

/// Assemble a full stack against the test server. Replica and archive
/// settings point at the same server so satellite provisioning can be
/// exercised without real replication infrastructure.
pub fn build_router(
    mode: TenancyMode,
    auto_replica: bool,
    auto_archive: bool,
    url: &str,
) -> Arc<TenantRouter> {
    let settings = test_settings(url);
    let mut connections = ConnectionMap::default();
    connections
        .connections
        .insert("default".to_string(), settings.clone());
    connections
        .connections
        .insert("replica".to_string(), settings.clone());
    connections
        .connections
        .insert("archive".to_string(), settings);

    let tenancy = TenancyConfig {
        mode,
        auto_replica,
        auto_archive,
        default_connection: "default".to_string(),
        replica_connection: "replica".to_string(),
        archive_connection: "archive".to_string(),
    };
    let registry = Arc::new(ConnectionRegistry::new());
    let factory = ConnectionFactory::new(&DatabaseConfig {
        max_connections: 4,
        connect_timeout_secs: 5,
        probe_timeout_secs: 5,
    });
    let provisioner =
        ProvisioningService::new(registry.clone(), factory, tenancy.clone(), connections);
    Arc::new(TenantRouter::new(tenancy, registry, provisioner))
}

pub fn unique_tenant_id() -> String {
    format!("t{}", uuid::Uuid::new_v4().simple())
}
