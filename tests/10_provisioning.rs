mod common;

use common::{build_router, test_database_url, test_settings, unique_tenant_id};
use stratum::database::policy::{TenancyMode, TenantContext};
use stratum::database::router::RouteError;
use stratum::services::provisioning::ProvisionOutcome;

#[tokio::test]
async fn multi_schema_tenant_lifecycle() {
    let Some(url) = test_database_url() else {
        return;
    };
    let router = build_router(TenancyMode::MultiSchema, false, false, &url);
    router.bootstrap().await.expect("bootstrap");
    assert!(router.is_ready().await);

    let tenant = unique_tenant_id();
    assert!(!router.tenant_exists(&tenant).await);

    let outcome = router.provision_tenant(&tenant).await.expect("provision");
    assert!(matches!(outcome, ProvisionOutcome::Provisioned { .. }));
    assert!(router.tenant_exists(&tenant).await);

    // The tenant pool is pinned to its own schema, distinct from main
    let ctx = TenantContext::new(tenant.clone());
    let pool = router.write_pool(Some(&ctx)).await.expect("tenant pool");
    let (schema,): (String,) = sqlx::query_as("SELECT current_schema()")
        .fetch_one(&pool)
        .await
        .expect("current_schema");
    assert_eq!(schema, format!("tenant_{}", tenant));

    let main = router.write_pool(None).await.expect("main pool");
    let (main_schema,): (String,) = sqlx::query_as("SELECT current_schema()")
        .fetch_one(&main)
        .await
        .expect("current_schema");
    assert_ne!(main_schema, schema);

    // Re-provisioning is a designed no-op
    let again = router.provision_tenant(&tenant).await.expect("reprovision");
    assert_eq!(again, ProvisionOutcome::AlreadyProvisioned);

    // No replica registered: reads fall back to the tenant's write pool
    let read = router.read_pool(Some(&ctx)).await.expect("read pool");
    let (read_schema,): (String,) = sqlx::query_as("SELECT current_schema()")
        .fetch_one(&read)
        .await
        .expect("current_schema");
    assert_eq!(read_schema, schema);

    let closed = router
        .deprovision_tenant(&tenant)
        .await
        .expect("deprovision");
    assert_eq!(closed, vec![format!("schema_{}", tenant)]);
    assert!(!router.tenant_exists(&tenant).await);
}

#[tokio::test]
async fn unprovisioned_tenant_write_is_not_found() {
    let Some(url) = test_database_url() else {
        return;
    };
    let router = build_router(TenancyMode::MultiSchema, false, false, &url);
    router.bootstrap().await.expect("bootstrap");

    let ctx = TenantContext::new(unique_tenant_id());
    let err = router.write_pool(Some(&ctx)).await.unwrap_err();
    assert!(matches!(err, RouteError::NotFound(_)));
}

#[tokio::test]
async fn multi_database_tenant_gets_dedicated_database() {
    let Some(url) = test_database_url() else {
        return;
    };
    let router = build_router(TenancyMode::MultiDatabase, false, false, &url);
    router.bootstrap().await.expect("bootstrap");

    let tenant = unique_tenant_id();
    router.provision_tenant(&tenant).await.expect("provision");

    let base = test_settings(&url).database;
    let expected = format!("{}_tenant_{}", base, tenant);

    let ctx = TenantContext::new(tenant.clone());
    let pool = router.write_pool(Some(&ctx)).await.expect("tenant pool");
    let (database,): (String,) = sqlx::query_as("SELECT current_database()")
        .fetch_one(&pool)
        .await
        .expect("current_database");
    assert_eq!(database, expected);

    // Cleanup: evict the pool first, then drop the tenant database
    router
        .deprovision_tenant(&tenant)
        .await
        .expect("deprovision");
    let main = router.write_pool(None).await.expect("main pool");
    let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{}\"", expected))
        .execute(&main)
        .await;
}

#[tokio::test]
async fn auto_replica_registers_tenant_replica() {
    let Some(url) = test_database_url() else {
        return;
    };
    let router = build_router(TenancyMode::MultiSchema, true, false, &url);
    router.bootstrap().await.expect("bootstrap");

    let tenant = unique_tenant_id();
    let outcome = router.provision_tenant(&tenant).await.expect("provision");
    let ProvisionOutcome::Provisioned { connections } = outcome else {
        panic!("expected fresh provisioning");
    };
    assert_eq!(
        connections,
        vec![
            format!("schema_{}", tenant),
            format!("replica_tenant_{}", tenant)
        ]
    );

    // The replica pool is pinned to the tenant schema too
    let ctx = TenantContext::new(tenant.clone());
    let read = router.read_pool(Some(&ctx)).await.expect("replica pool");
    let (schema,): (String,) = sqlx::query_as("SELECT current_schema()")
        .fetch_one(&read)
        .await
        .expect("current_schema");
    assert_eq!(schema, format!("tenant_{}", tenant));

    router
        .deprovision_tenant(&tenant)
        .await
        .expect("deprovision");
}

#[tokio::test]
async fn single_mode_provisioning_touches_nothing() {
    let Some(url) = test_database_url() else {
        return;
    };
    let router = build_router(TenancyMode::Single, false, false, &url);
    router.bootstrap().await.expect("bootstrap");

    let outcome = router.provision_tenant("1").await.expect("provision");
    assert_eq!(outcome, ProvisionOutcome::SharedStorage);
    assert_eq!(router.registry().names().await, vec!["main".to_string()]);

    // Tenant-scoped writes land on main
    let ctx = TenantContext::new("1");
    router.write_pool(Some(&ctx)).await.expect("main pool");
}

#[tokio::test]
async fn execute_query_routes_through_the_tenant_connection() {
    let Some(url) = test_database_url() else {
        return;
    };
    let router = build_router(TenancyMode::MultiSchema, false, false, &url);
    router.bootstrap().await.expect("bootstrap");

    let tenant = unique_tenant_id();
    router.provision_tenant(&tenant).await.expect("provision");

    let ctx = TenantContext::new(tenant.clone());
    let rows = router
        .execute_query(
            "SELECT current_schema() AS schema, $1::text AS marker",
            &[serde_json::json!("hello")],
            Some(&ctx),
        )
        .await
        .expect("query");
    assert_eq!(rows.len(), 1);

    use sqlx::Row;
    let schema: String = rows[0].get("schema");
    let marker: String = rows[0].get("marker");
    assert_eq!(schema, format!("tenant_{}", tenant));
    assert_eq!(marker, "hello");

    router
        .deprovision_tenant(&tenant)
        .await
        .expect("deprovision");
}
