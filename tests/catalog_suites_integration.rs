use catalog_harness::{
    serve_catalog, suites, AssetClient, AuditClient, Asset, AuditAction, AuditSearchRequest,
    CatalogError, ConnectorType, HttpCatalog, InMemoryCatalog, RetryPolicy, SharedClient,
    UserContext,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

// Serve a fresh in-memory catalog on an ephemeral port and return its base URL
async fn spawn_catalog(index_lag: u64) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let catalog = Arc::new(InMemoryCatalog::with_index_lag(index_lag));

    tokio::spawn(async move {
        if let Err(e) = serve_catalog(listener, catalog).await {
            eprintln!("catalog server stopped: {}", e);
        }
    });

    format!("http://{}", address)
}

fn client_for(base_url: &str, user: &str) -> HttpCatalog {
    HttpCatalog::new(
        base_url,
        UserContext::new(user.to_string()),
        Duration::from_secs(10),
    )
    .unwrap()
}

#[tokio::test]
async fn test_all_suites_pass_over_http() {
    let _ = env_logger::builder().is_test(true).try_init();
    let base_url = spawn_catalog(2).await;
    let client: SharedClient = Arc::new(client_for(&base_url, "integration"));

    let policy = RetryPolicy {
        max_attempts: 20,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(50),
    };
    let reports = suites::run_all(client, &policy).await.unwrap();

    assert_eq!(reports.len(), 7);
    for report in &reports {
        println!("{}", report);
        assert!(report.is_success(), "{}", report);
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let base_url = spawn_catalog(0).await;
    let response = reqwest::get(format!("{}/health", base_url)).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_errors_use_kind_and_message_body() {
    let base_url = spawn_catalog(0).await;
    let response = reqwest::get(format!("{}/api/assets/guid/does-not-exist", base_url))
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "not_found");
    assert!(body["error"].as_str().unwrap().contains("does-not-exist"));

    let client = client_for(&base_url, "integration");
    let missing = client.get_by_guid(&"does-not-exist".to_string()).await;
    assert!(matches!(missing, Err(CatalogError::NotFound(_))));
}

#[tokio::test]
async fn test_audit_entries_record_the_calling_user() {
    let base_url = spawn_catalog(0).await;
    let client = client_for(&base_url, "alice");

    let response = client
        .save(Asset::connection("audited", ConnectorType::Kafka, vec![]))
        .await
        .unwrap();
    let connection = &response.created[0];
    assert_eq!(connection.created_by, "alice");

    let audit = client
        .audit_search(&AuditSearchRequest::for_guid(&connection.guid))
        .await
        .unwrap();
    assert_eq!(audit.total_count, 1);
    assert_eq!(audit.entries[0].action, AuditAction::EntityCreate);
    assert_eq!(audit.entries[0].user, "alice");
}

#[tokio::test]
async fn test_unreachable_catalog_is_transient() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{}", address), "integration");
    let result = client.get_by_guid(&"anything".to_string()).await;
    assert!(matches!(result, Err(CatalogError::Transient(_))));
}
