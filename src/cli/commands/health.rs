use std::time::Duration;

use crate::cli::{build_router, OutputFormat};
use crate::config::config;
use crate::services::health::HealthService;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config();
    let router = build_router()?;
    router.bootstrap().await?;

    let health = HealthService::new(
        router.registry(),
        Duration::from_secs(config.database.probe_timeout_secs),
    );
    let report = health.check_all().await;

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            for conn in &report.connections {
                let status = if conn.healthy { "ok" } else { "FAIL" };
                let latency = conn
                    .latency_ms
                    .map(|ms| format!("{}ms", ms))
                    .unwrap_or_else(|| "-".to_string());
                match &conn.error {
                    Some(err) => println!("{:<24} {:<6} {:<8} {}", conn.name, status, latency, err),
                    None => println!("{:<24} {:<6} {}", conn.name, status, latency),
                }
            }
            println!(
                "overall: {}",
                if report.healthy { "healthy" } else { "degraded" }
            );
        }
    }

    if !report.healthy {
        anyhow::bail!("one or more connections are unhealthy");
    }
    Ok(())
}
