//! REST client behavior against a mocked Instana API.

use std::time::Duration;

use serde_json::json;
use terraform_provider_instana::restapi::{
    ApiError, HostAgentResource, InstanaApi, ReadOnlyRestResource, RestResource, RetryPolicy,
};
use terraform_provider_instana::testing::test_client_options;
use tokio::time::Instant;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHANNELS_PATH: &str = "/api/events/settings/alertingChannels";

fn api(server: &MockServer) -> InstanaApi {
    InstanaApi::with_options("test-token", &server.uri(), false, test_client_options()).unwrap()
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CHANNELS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CHANNELS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "a", "name": "ops", "kind": "EMAIL", "emails": ["ops@example.com"]}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let channels = assert_ok!(api(&server).alerting_channels().get_all(&CancellationToken::new()).await);
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].name, "ops");
}

#[tokio::test]
async fn test_retries_give_up_after_policy_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CHANNELS_PATH))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let err = api(&server)
        .alerting_channels()
        .get_all(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Server { status: 502, .. }));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/a", CHANNELS_PATH)))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(1)
        .mount(&server)
        .await;

    let err = api(&server)
        .alerting_channels()
        .get_one("a", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ApiError::Client {
            status: 403,
            path: format!("{}/a", CHANNELS_PATH),
            body: "forbidden".to_string(),
        }
    );
}

#[tokio::test]
async fn test_not_found_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/a", CHANNELS_PATH)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = api(&server)
        .alerting_channels()
        .delete_by_id("a", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_requests_carry_token_and_accept_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/synthetics/settings/locations"))
        .and(header("authorization", "apiToken test-token"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let locations = assert_ok!(api(&server).synthetic_locations().get_all(&CancellationToken::new()).await);
    assert!(locations.is_empty());
}

#[tokio::test]
async fn test_host_agents_are_paged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(HostAgentResource::PATH))
        .and(query_param("page", "1"))
        .and(query_param("pageSize", "2"))
        .and(query_param("query", "entity.zone:eu"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"snapshotId": "s1"}, {"snapshotId": "s2"}],
            "totalHits": 3
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(HostAgentResource::PATH))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"snapshotId": "s3", "tags": ["prod"]}],
            "totalHits": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    let agents = HostAgentResource::new(api(&server).client().clone())
        .with_page_size(2)
        .query(Some("entity.zone:eu"), &CancellationToken::new())
        .await
        .unwrap();
    let ids: Vec<_> = agents.iter().map(|a| a.snapshot_id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "s2", "s3"]);
    assert_eq!(agents[2].tags, vec!["prod".to_string()]);
}

#[tokio::test]
async fn test_cancelled_requests_are_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = api(&server).alerting_channels().get_all(&cancel).await.unwrap_err();
    assert_eq!(err, ApiError::Cancelled);
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_request() {
    let server = MockServer::start().await;
    let delay = Duration::from_secs(3);
    Mock::given(method("GET"))
        .and(path(CHANNELS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])).set_delay(delay))
        .expect(1)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = api(&server).alerting_channels().get_all(&cancel).await.unwrap_err();
    assert_eq!(err, ApiError::Cancelled);
    assert!(started.elapsed() < delay, "request outlived its cancellation");
}

#[tokio::test]
async fn test_cancellation_interrupts_retry_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CHANNELS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let options = test_client_options().with_retry(RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_secs(5),
        max_delay: Duration::from_secs(5),
        total_budget: Duration::from_secs(30),
    });
    let api = InstanaApi::with_options("test-token", &server.uri(), false, options).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = api.alerting_channels().get_all(&cancel).await.unwrap_err();
    assert_eq!(err, ApiError::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_invalid_json_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CHANNELS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .expect(1)
        .mount(&server)
        .await;

    let err = api(&server)
        .alerting_channels()
        .get_all(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}
