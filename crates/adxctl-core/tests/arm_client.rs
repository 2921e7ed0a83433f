//! HTTP-level tests of the management client using a mock server

use adxctl_core::credential::{ClientSecretCredential, StaticTokenCredential, TokenCredential};
use adxctl_core::kusto::{AzureSku, ClusterSpec, DatabaseKind, DatabaseSpec, KustoApi};
use adxctl_core::progress::Operation;
use adxctl_core::{
    CoreError, KustoManagementClient, ManualClock, PollPolicy, list_clusters,
    list_read_write_databases, wait_for_completion,
};
use futures::TryStreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{
    body_partial_json, body_string_contains, header, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CLUSTER_PATH: &str =
    "/subscriptions/sub-1/resourceGroups/rg/providers/Microsoft.Kusto/clusters/c1";
const DATABASE_PATH: &str =
    "/subscriptions/sub-1/resourceGroups/rg/providers/Microsoft.Kusto/clusters/c1/databases/db1";

fn client(server: &MockServer) -> KustoManagementClient {
    KustoManagementClient::new(
        Url::parse(&server.uri()).unwrap(),
        "sub-1",
        Arc::new(StaticTokenCredential::new("test-token")),
    )
    .unwrap()
}

fn cluster_json(state: &str) -> serde_json::Value {
    json!({
        "id": CLUSTER_PATH,
        "name": "c1",
        "type": "Microsoft.Kusto/Clusters",
        "location": "West Europe",
        "sku": {"name": "Dev(No SLA)_Standard_D11_v2", "tier": "Basic", "capacity": 1},
        "properties": {
            "state": "Running",
            "provisioningState": state,
            "uri": "https://c1.westeurope.kusto.windows.net"
        }
    })
}

fn cluster_spec() -> ClusterSpec {
    ClusterSpec {
        location: "westeurope".to_string(),
        sku: AzureSku {
            name: "Dev(No SLA)_Standard_D11_v2".to_string(),
            tier: "Basic".to_string(),
            capacity: Some(1),
        },
    }
}

#[tokio::test]
async fn test_create_cluster_follows_async_operation() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path(CLUSTER_PATH))
        .and(query_param("api-version", "2023-08-15"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "location": "westeurope",
            "sku": {"tier": "Basic", "capacity": 1}
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("Azure-AsyncOperation", format!("{}/operations/op-1", server.uri()))
                .set_body_json(cluster_json("Creating")),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/operations/op-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Retry-After", "3")
                .set_body_json(json!({"status": "InProgress"})),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/operations/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "Succeeded"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(CLUSTER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(cluster_json("Succeeded")))
        .mount(&server)
        .await;

    let client = client(&server);
    let clock = ManualClock::new();
    let mut operation = client
        .begin_create_cluster("rg", "c1", &cluster_spec())
        .await
        .unwrap();
    assert_eq!(operation.description(), "create cluster c1");

    let cluster = wait_for_completion(operation.as_mut(), &PollPolicy::default(), &clock, None)
        .await
        .unwrap();

    assert_eq!(cluster.name, "c1");
    assert_eq!(cluster.properties.provisioning_state.as_deref(), Some("Succeeded"));
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(3)]);
}

#[tokio::test]
async fn test_async_operation_failure_carries_service_error() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path(CLUSTER_PATH))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("Azure-AsyncOperation", format!("{}/operations/op-2", server.uri())),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/operations/op-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "Failed",
            "error": {"code": "QuotaExceeded", "message": "Not enough cores in region"}
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut operation = client
        .begin_create_cluster("rg", "c1", &cluster_spec())
        .await
        .unwrap();
    let err = wait_for_completion(
        operation.as_mut(),
        &PollPolicy::default(),
        &ManualClock::new(),
        None,
    )
    .await
    .unwrap_err();

    match err {
        CoreError::OperationFailed(message) => {
            assert!(message.contains("QuotaExceeded"));
            assert!(message.contains("Not enough cores"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_rejected_request_parses_error_envelope() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path(CLUSTER_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": "InvalidResourceLocation",
                "message": "The resource 'c1' already exists in location 'northeurope'."
            }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let err = match client.begin_create_cluster("rg", "c1", &cluster_spec()).await {
        Err(err) => err,
        Ok(_) => panic!("expected the request to be rejected"),
    };

    assert!(err.is_bad_request());
    match err {
        CoreError::Api { code, message, .. } => {
            assert_eq!(code, "InvalidResourceLocation");
            assert!(message.contains("northeurope"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_error_without_envelope_uses_status_reason() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client.list_clusters_page("rg", None).await.unwrap_err();

    assert!(err.is_retryable());
    match err {
        CoreError::Api {
            status,
            code,
            message,
        } => {
            assert_eq!(status, 503);
            assert_eq!(code, "ServiceUnavailable");
            assert_eq!(message, "upstream unavailable");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_cluster_follows_location() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path(CLUSTER_PATH))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("Location", format!("{}/locations/loc-1", server.uri())),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/locations/loc-1"))
        .respond_with(ResponseTemplate::new(202))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/locations/loc-1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = client(&server);
    let clock = ManualClock::new();
    let mut operation = client.begin_delete_cluster("rg", "c1").await.unwrap();
    let outcome = wait_for_completion(operation.as_mut(), &PollPolicy::default(), &clock, None)
        .await
        .unwrap();

    assert_eq!(outcome.status_code, 204);
    assert!(outcome.is_success());
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(10); 2]);
}

#[tokio::test]
async fn test_synchronous_delete_completes_without_polling() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path(DATABASE_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let clock = ManualClock::new();
    let mut operation = client
        .begin_delete_database("rg", "c1", "db1")
        .await
        .unwrap();
    let outcome = wait_for_completion(operation.as_mut(), &PollPolicy::default(), &clock, None)
        .await
        .unwrap();

    assert_eq!(outcome.status_code, 200);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn test_delete_without_headers_polls_resource_until_gone() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path(DATABASE_PATH))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(DATABASE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "c1/db1",
            "kind": "ReadWrite",
            "properties": {"provisioningState": "Deleting"}
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(DATABASE_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "NotFound", "message": "gone"}
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut operation = client
        .begin_delete_database("rg", "c1", "db1")
        .await
        .unwrap();
    let outcome = wait_for_completion(
        operation.as_mut(),
        &PollPolicy::default(),
        &ManualClock::new(),
        None,
    )
    .await
    .unwrap();

    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_create_database_polls_provisioning_state() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path(DATABASE_PATH))
        .and(body_partial_json(json!({"kind": "ReadWrite", "location": "westeurope"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "name": "c1/db1",
            "kind": "ReadWrite",
            "properties": {"provisioningState": "Creating"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(DATABASE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "c1/db1",
            "kind": "ReadWrite",
            "properties": {"provisioningState": "Creating"}
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(DATABASE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": DATABASE_PATH,
            "name": "c1/db1",
            "type": "Microsoft.Kusto/Clusters/Databases",
            "location": "West Europe",
            "kind": "ReadWrite",
            "properties": {"provisioningState": "Succeeded", "softDeletePeriod": "P365D"}
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let clock = ManualClock::new();
    let mut operation = client
        .begin_create_database("rg", "c1", "db1", &DatabaseSpec::read_write("westeurope"))
        .await
        .unwrap();
    let database = wait_for_completion(operation.as_mut(), &PollPolicy::default(), &clock, None)
        .await
        .unwrap();

    assert_eq!(database.kind, DatabaseKind::ReadWrite);
    assert_eq!(database.id.as_deref(), Some(DATABASE_PATH));
    assert_eq!(clock.sleeps().len(), 1);
}

#[tokio::test]
async fn test_list_clusters_follows_next_link() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(
            "/subscriptions/sub-1/resourceGroups/rg/providers/Microsoft.Kusto/clusters",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [cluster_json("Succeeded")],
            "nextLink": format!("{}/continuation/clusters?page=2", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut second = cluster_json("Succeeded");
    second["name"] = json!("c2");
    Mock::given(method("GET"))
        .and(path("/continuation/clusters"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [second]})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let clusters: Vec<_> = list_clusters(&client, "rg").try_collect().await.unwrap();

    let names: Vec<&str> = clusters.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["c1", "c2"]);
}

#[tokio::test]
async fn test_list_databases_empty_and_filtered() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(
            "/subscriptions/sub-1/resourceGroups/rg/providers/Microsoft.Kusto/clusters/c1/databases",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"name": "c1/follower", "kind": "ReadOnlyFollowing"},
                {"name": "c1/db1", "kind": "ReadWrite"}
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(
            "/subscriptions/sub-1/resourceGroups/rg/providers/Microsoft.Kusto/clusters/c2/databases",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .mount(&server)
        .await;

    let client = client(&server);
    let databases: Vec<_> = list_read_write_databases(&client, "rg", "c1")
        .try_collect()
        .await
        .unwrap();
    assert_eq!(databases.len(), 1);
    assert_eq!(databases[0].name, "c1/db1");

    let none: Vec<_> = list_read_write_databases(&client, "rg", "c2")
        .try_collect()
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_client_secret_token_is_cached() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=app-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "issued-token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let credential = ClientSecretCredential::new(server.uri(), "tenant-1", "app-1", "s3cret");
    assert_eq!(credential.token().await.unwrap(), "issued-token");
    assert_eq!(credential.token().await.unwrap(), "issued-token");
}

#[tokio::test]
async fn test_client_secret_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided."
        })))
        .mount(&server)
        .await;

    let credential = ClientSecretCredential::new(server.uri(), "tenant-1", "app-1", "wrong");
    let err = credential.token().await.unwrap_err();

    assert!(matches!(err, CoreError::Authentication(ref m) if m.starts_with("invalid_client")));
}

#[tokio::test]
async fn test_lowercase_succeeded_status_completes() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path(CLUSTER_PATH))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("Azure-AsyncOperation", format!("{}/operations/op-3", server.uri())),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/operations/op-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "succeeded"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let clock = ManualClock::new();
    let mut operation = client.begin_delete_cluster("rg", "c1").await.unwrap();
    let outcome = wait_for_completion(operation.as_mut(), &PollPolicy::default(), &clock, None)
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn test_lowercase_failed_status_fails() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path(CLUSTER_PATH))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("Azure-AsyncOperation", format!("{}/operations/op-4", server.uri())),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/operations/op-4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "failed"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let clock = ManualClock::new();
    let mut operation = client
        .begin_create_cluster("rg", "c1", &cluster_spec())
        .await
        .unwrap();
    let err = wait_for_completion(operation.as_mut(), &PollPolicy::default(), &clock, None)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::OperationFailed(ref m) if m.contains("failed")));
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn test_lowercase_provisioning_state_completes() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path(DATABASE_PATH))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(DATABASE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "c1/db1",
            "kind": "ReadWrite",
            "properties": {"provisioningState": "succeeded"}
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let clock = ManualClock::new();
    let mut operation = client
        .begin_create_database("rg", "c1", "db1", &DatabaseSpec::read_write("westeurope"))
        .await
        .unwrap();
    let database = wait_for_completion(operation.as_mut(), &PollPolicy::default(), &clock, None)
        .await
        .unwrap();

    assert_eq!(database.name, "c1/db1");
    assert!(clock.sleeps().is_empty());
}
