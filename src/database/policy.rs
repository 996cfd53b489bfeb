use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Logical name of the main write connection.
pub const MAIN_CONNECTION: &str = "main";

/// Logical name of the global read replica.
pub const REPLICA_CONNECTION: &str = "replica";

/// Logical name of the global archive store.
pub const ARCHIVE_CONNECTION: &str = "archive";

/// Strategy by which tenants share or isolate physical storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TenancyMode {
    /// All tenants share the main database and schema.
    Single,
    /// One schema per tenant inside the main database.
    MultiSchema,
    /// One dedicated database per tenant.
    MultiDatabase,
}

impl FromStr for TenancyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(TenancyMode::Single),
            "multi-schema" => Ok(TenancyMode::MultiSchema),
            "multi-database" => Ok(TenancyMode::MultiDatabase),
            other => Err(format!(
                "unknown tenancy mode '{}', expected single | multi-schema | multi-database",
                other
            )),
        }
    }
}

impl fmt::Display for TenancyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TenancyMode::Single => "single",
            TenancyMode::MultiSchema => "multi-schema",
            TenancyMode::MultiDatabase => "multi-database",
        };
        write!(f, "{}", s)
    }
}

/// Caller-supplied tenant scope for routing decisions.
///
/// `organization_id` is accepted but not yet consulted by routing; it is
/// reserved for future organization-level scoping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: String,
    pub organization_id: Option<String>,
}

impl TenantContext {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            organization_id: None,
        }
    }

    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }
}

/// Resolve the logical name of the write connection for a tenant.
///
/// Total: callers without a tenant scope always land on the main connection.
pub fn write_connection_name(mode: TenancyMode, tenant_id: Option<&str>) -> String {
    match (mode, tenant_id) {
        (_, None) => MAIN_CONNECTION.to_string(),
        (TenancyMode::Single, Some(_)) => MAIN_CONNECTION.to_string(),
        (TenancyMode::MultiSchema, Some(id)) => format!("schema_{}", id),
        (TenancyMode::MultiDatabase, Some(id)) => format!("tenant_{}", id),
    }
}

/// Resolve the logical name of the read connection for a tenant.
///
/// Mode-independent: replicas are resolved by direct lookup and the router
/// falls back to the write connection when the name is absent.
pub fn read_connection_name(tenant_id: Option<&str>) -> String {
    match tenant_id {
        None => REPLICA_CONNECTION.to_string(),
        Some(id) => format!("replica_tenant_{}", id),
    }
}

/// Resolve the logical name of the archive connection for a tenant.
pub fn archive_connection_name(tenant_id: Option<&str>) -> String {
    match tenant_id {
        None => ARCHIVE_CONNECTION.to_string(),
        Some(id) => format!("archive_tenant_{}", id),
    }
}

/// Schema created for a tenant in multi-schema mode.
pub fn tenant_schema_name(tenant_id: &str) -> String {
    format!("tenant_{}", tenant_id)
}

/// Database created for a tenant in multi-database mode.
pub fn tenant_database_name(base_database: &str, tenant_id: &str) -> String {
    format!("{}_tenant_{}", base_database, tenant_id)
}

/// Replica database for a tenant in multi-database mode.
pub fn tenant_replica_database_name(base_database: &str, tenant_id: &str) -> String {
    format!("{}_tenant_{}_replica", base_database, tenant_id)
}

/// Archive database for a tenant in multi-database mode.
pub fn tenant_archive_database_name(base_database: &str, tenant_id: &str) -> String {
    format!("{}_tenant_{}_archive", base_database, tenant_id)
}

/// Validate tenant ids before they are spliced into schema/database names.
/// Accepts `[A-Za-z0-9_]+` up to 48 characters, leaving headroom under the
/// 63-byte Postgres identifier limit after prefixes and suffixes are added.
pub fn is_valid_tenant_id(tenant_id: &str) -> bool {
    !tenant_id.is_empty()
        && tenant_id.len() <= 48
        && tenant_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote a SQL identifier to prevent injection.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
