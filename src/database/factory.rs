use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use thiserror::Error;
use tracing::info;

use super::descriptor::ConnectionDescriptor;
use super::policy::quote_identifier;
use crate::config::DatabaseConfig;

/// Errors opening a physical connection pool.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Invalid connection descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Failed to connect '{name}': {source}")]
    ConnectFailure {
        name: String,
        #[source]
        source: sqlx::Error,
    },
}

/// Opens a single pool from a fully-formed descriptor. No tenancy awareness.
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    max_connections: u32,
    connect_timeout: Duration,
}

impl ConnectionFactory {
    pub fn new(database: &DatabaseConfig) -> Self {
        Self {
            max_connections: database.max_connections,
            connect_timeout: Duration::from_secs(database.connect_timeout_secs),
        }
    }

    /// Open an eager pool against the descriptor's target.
    ///
    /// Performs no schema-level changes; when the descriptor pins a schema,
    /// every pooled session gets its `search_path` set on checkout.
    pub async fn open(&self, descriptor: &ConnectionDescriptor) -> Result<PgPool, ConnectionError> {
        descriptor.validate()?;
        let url = descriptor.to_url()?;

        let mut options = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connect_timeout);

        if let Some(schema) = &descriptor.schema {
            let set_path = format!("SET search_path TO {}", quote_identifier(schema));
            options = options.after_connect(move |conn, _meta| {
                let set_path = set_path.clone();
                Box::pin(async move {
                    conn.execute(set_path.as_str()).await?;
                    Ok(())
                })
            });
        }

        let pool = options
            .connect(&url)
            .await
            .map_err(|source| ConnectionError::ConnectFailure {
                name: descriptor.name.clone(),
                source,
            })?;

        info!(
            "Opened connection pool '{}' -> {}:{}/{}{}",
            descriptor.name,
            descriptor.host,
            descriptor.port,
            descriptor.database,
            descriptor
                .schema
                .as_deref()
                .map(|s| format!(" (schema {})", s))
                .unwrap_or_default()
        );
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionSettings;

    fn factory() -> ConnectionFactory {
        ConnectionFactory::new(&DatabaseConfig {
            max_connections: 2,
            connect_timeout_secs: 1,
            probe_timeout_secs: 1,
        })
    }

    #[tokio::test]
    async fn invalid_descriptor_fails_before_io() {
        let settings = ConnectionSettings {
            host: String::new(),
            port: 5432,
            username: "app".to_string(),
            password: String::new(),
            database: "app".to_string(),
        };
        let descriptor = ConnectionDescriptor::from_settings("main", &settings);
        let err = factory().open(&descriptor).await.unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidDescriptor(_)));
    }
}
