//! Provider configuration, tag filters, data sources and the server.

use std::time::Duration;

use serde_json::{json, Value};
use terraform_provider_instana::provider::{API_TOKEN_ENV, ENDPOINT_ENV};
use terraform_provider_instana::testing::{
    assert_error_contains, assert_no_errors, test_client_options, ProviderTester, TestError,
};
use terraform_provider_instana::{
    serve_on_listener, InstanaProvider, ProviderError, ProviderService, ServeOptions,
};
use tokio::net::TcpListener;
use tokio_test::assert_ok;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const APPLICATION: &str = "instana_application_config";
const APPLICATIONS_PATH: &str = "/api/application-monitoring/settings/application";

async fn setup() -> (MockServer, ProviderTester<InstanaProvider>) {
    let server = MockServer::start().await;
    let tester = ProviderTester::configured(&server.uri()).await.unwrap();
    (server, tester)
}

fn application_config(tag_filter: &str) -> Value {
    json!({
        "label": "shop",
        "tag_filter": tag_filter,
        "access_rule": [{"access_type": "READ_WRITE", "relation_type": "GLOBAL"}]
    })
}

fn application_body(id: &str) -> Value {
    json!({
        "id": id,
        "label": "shop",
        "scope": "INCLUDE_NO_DOWNSTREAM",
        "boundaryScope": "DEFAULT",
        "tagFilterExpression": {
            "type": "TAG_FILTER",
            "name": "service.name",
            "stringValue": "checkout",
            "operator": "EQUALS",
            "entity": "DESTINATION"
        },
        "accessRules": [{"accessType": "READ_WRITE", "relationType": "GLOBAL"}]
    })
}

#[tokio::test]
async fn test_configure_reads_environment() {
    let server = MockServer::start().await;
    let endpoint = server.uri();
    let provider = InstanaProvider::new()
        .with_client_options(test_client_options())
        .with_env(move |name| match name {
            API_TOKEN_ENV => Some("env-token".to_string()),
            ENDPOINT_ENV => Some(endpoint.clone()),
            _ => None,
        });
    let tester = ProviderTester::new(provider);
    assert_ok!(tester.configure(json!({"api_token": null, "endpoint": null})).await);

    let meta = tester.provider().meta().await.unwrap();
    assert_eq!(meta.api_token, "env-token");
    assert!(!meta.tls_skip_verify);
}

#[tokio::test]
async fn test_configure_reports_unknown_token() {
    let provider = InstanaProvider::new().with_env(|name| match name {
        API_TOKEN_ENV => Some("env-token".to_string()),
        _ => None,
    });
    let diagnostics = provider
        .configure(json!({
            "api_token": terraform_provider_instana::value::UNKNOWN_VALUE,
            "endpoint": "tenant-unit.instana.io"
        }))
        .await
        .unwrap();
    assert_error_contains(&diagnostics, "Unknown Instana API Token");
    assert!(provider.meta().await.is_none());
}

#[tokio::test]
async fn test_tag_filter_is_sent_as_tree_and_kept_as_configured() {
    let (server, tester) = setup().await;
    Mock::given(method("POST"))
        .and(path(APPLICATIONS_PATH))
        .and(body_partial_json(json!({
            "label": "shop",
            "tagFilterExpression": {
                "type": "TAG_FILTER",
                "name": "service.name",
                "operator": "EQUALS",
                "stringValue": "checkout"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(application_body("app-1")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/app-1", APPLICATIONS_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(application_body("app-1")))
        .mount(&server)
        .await;

    let configured = "service.name   EQUALS 'checkout'";
    let state = tester
        .lifecycle_create(APPLICATION, application_config(configured))
        .await
        .unwrap();
    assert_eq!(state["id"], "app-1");
    assert_eq!(state["tag_filter"], configured);

    let imported = tester.read(APPLICATION, json!({"id": "app-1"})).await.unwrap();
    let normalized = imported["tag_filter"].as_str().unwrap();
    assert!(terraform_provider_instana::tagfilter::semantically_equal(normalized, configured));
}

#[tokio::test]
async fn test_invalid_tag_filter_is_a_validation_error() {
    let tester = ProviderTester::new(InstanaProvider::new());
    let err = tester
        .validate_resource_config(APPLICATION, application_config("service.name EQUALS"))
        .await
        .unwrap_err();
    let TestError::Diagnostics(diagnostics) = err else {
        panic!("expected diagnostics");
    };
    assert!(diagnostics
        .iter()
        .any(|d| d.attribute.as_deref() == Some("tag_filter")));

    let valid = tester
        .provider()
        .validate_resource_config(APPLICATION, application_config("service.name EQUALS 'checkout'"))
        .await
        .unwrap();
    assert_no_errors(&valid);
}

#[tokio::test]
async fn test_builtin_event_data_source() {
    let (server, tester) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/events/settings/event-specifications/built-in"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "host.cpu", "shortPluginId": "host", "name": "High CPU", "severity": 5},
            {"id": "host.mem", "shortPluginId": "host", "name": "High memory", "severity": 10,
             "triggering": true, "enabled": true}
        ])))
        .mount(&server)
        .await;

    let event = tester
        .read_data_source(
            "instana_builtin_event_spec",
            json!({"name": "High memory", "short_plugin_id": "host"}),
        )
        .await
        .unwrap();
    assert_eq!(event["id"], "host.mem");
    assert_eq!(event["severity"], "critical");
    assert_eq!(event["severity_code"], 10);

    let err = tester
        .read_data_source(
            "instana_builtin_event_spec",
            json!({"name": "High memory", "short_plugin_id": "jvm"}),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));
}

#[tokio::test]
async fn test_synthetic_location_data_source() {
    let (server, tester) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/synthetics/settings/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "loc-1", "label": "Frankfurt", "locationType": "Public"},
            {"id": "loc-2", "label": "Basement", "description": "on premises", "locationType": "Private"}
        ])))
        .mount(&server)
        .await;

    let location = tester
        .read_data_source("instana_synthetic_location", json!({"location_type": "Private"}))
        .await
        .unwrap();
    assert_eq!(location["id"], "loc-2");
    assert_eq!(location["description"], "on premises");
}

#[tokio::test]
async fn test_alerting_channel_data_source() {
    let (server, tester) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/events/settings/alertingChannels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "chan-1", "name": "ops", "kind": "EMAIL", "emails": ["ops@example.com"]}
        ])))
        .mount(&server)
        .await;

    let channel = tester
        .read_data_source("instana_alerting_channel", json!({"name": "ops"}))
        .await
        .unwrap();
    assert_eq!(channel["id"], "chan-1");
    assert_eq!(channel["email"]["emails"], json!(["ops@example.com"]));
}

#[tokio::test]
async fn test_user_data_sources() {
    let (server, tester) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/settings/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "u1", "email": "ops@example.com", "fullName": "Ops"},
            {"id": "u2", "email": "Dev@Example.com", "fullName": "Dev"}
        ])))
        .mount(&server)
        .await;

    let user = tester
        .read_data_source("instana_user", json!({"email": "dev@example.com"}))
        .await
        .unwrap();
    assert_eq!(user["id"], "u2");
    assert_eq!(user["full_name"], "Dev");

    let users = tester
        .read_data_source(
            "instana_users",
            json!({"emails": ["ops@example.com", "dev@example.com"]}),
        )
        .await
        .unwrap();
    assert_eq!(users["id"], "users-2");
    assert_eq!(users["users"][0]["id"], "u1");
    assert_eq!(users["users"][1]["id"], "u2");

    let err = tester
        .read_data_source("instana_users", json!({"emails": ["ops@example.com", "x@example.com"]}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));
}

#[tokio::test]
async fn test_automation_action_data_source() {
    let (server, tester) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/automation/actions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "a1", "name": "restart", "type": "SCRIPT", "tags": ["ops"]},
            {"id": "a2", "name": "restart", "type": "HTTP"}
        ])))
        .mount(&server)
        .await;

    let action = tester
        .read_data_source("instana_automation_action", json!({"name": "restart", "type": "script"}))
        .await
        .unwrap();
    assert_eq!(action["id"], "a1");
    assert_eq!(action["tags"], json!(["ops"]));
}

#[tokio::test]
async fn test_custom_event_specification_data_source() {
    let (server, tester) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/events/settings/event-specifications/custom"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "ces-1", "name": "disk full", "entityType": "host", "triggering": true,
             "enabled": true, "rules": []}
        ])))
        .mount(&server)
        .await;

    let spec = tester
        .read_data_source(
            "instana_custom_event_specification",
            json!({"name": "disk full", "entity_type": "host"}),
        )
        .await
        .unwrap();
    assert_eq!(spec["id"], "ces-1");
    assert_eq!(spec["triggering"], true);

    let err = tester
        .read_data_source(
            "instana_custom_event_specification",
            json!({"name": "disk full", "entity_type": "jvm"}),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));
}

#[tokio::test]
async fn test_host_agents_data_source() {
    let (server, tester) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/host-agent"))
        .and(query_param("query", "entity.tag:env=prod"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"snapshotId": "s1", "label": "host-1", "host": "10.0.0.1", "plugin": "host"}],
            "totalHits": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let agents = tester
        .read_data_source("instana_host_agents", json!({"filter": "entity.tag:env=prod"}))
        .await
        .unwrap();
    assert_eq!(agents["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(agents["items"][0]["label"], "host-1");
    assert!(agents["id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn test_data_source_requires_configuration() {
    let tester = ProviderTester::new(InstanaProvider::new());
    let err = tester
        .read_data_source("instana_host_agents", json!({"filter": "x"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::NotConfigured));
}

#[tokio::test]
async fn test_server_stops_on_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let options = ServeOptions::new().with_shutdown_timeout(Duration::from_secs(1));
    let served = tokio::time::timeout(
        Duration::from_secs(5),
        serve_on_listener(InstanaProvider::new(), listener, async {}, options),
    )
    .await
    .expect("server did not shut down");
    assert!(served.is_ok());
}
