use common::errors::{AppError, FetchErrorKind};
use common::http_client::{HttpClient, RetryPolicy};
use serde_json::json;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

fn fast_client(timeout: Duration) -> HttpClient {
    let retry = RetryPolicy {
        max_attempts: 3,
        multiplier: Duration::from_millis(10),
        min_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(40),
    };
    HttpClient::new(timeout, retry).expect("Failed to build client")
}

/// Three consecutive 5xx responses: two retries, then a transient error
#[tokio::test]
async fn test_transient_failures_exhaust_three_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = fast_client(Duration::from_secs(2));
    let result: Result<serde_json::Value, AppError> = client
        .get_json(&format!("{}/v1/forecast", mock_server.uri()))
        .await;

    match result {
        Err(AppError::FetchError {
            kind, attempts, source,
        }) => {
            assert_eq!(kind, FetchErrorKind::Transient);
            assert_eq!(attempts, 3);
            assert!(matches!(*source, AppError::HttpError { status: 503, .. }));
        }
        other => panic!("expected transient fetch error, got {:?}", other),
    }
}

/// A 4xx response is permanent and is not retried
#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": true,
            "reason": "Latitude must be in range of -90 to 90°."
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_client(Duration::from_secs(2));
    let result: Result<serde_json::Value, AppError> = client
        .get_json(&format!("{}/v1/forecast", mock_server.uri()))
        .await;

    let err = result.expect_err("400 must fail");
    assert_eq!(err.fetch_kind(), Some(FetchErrorKind::Permanent));
    assert!(matches!(err, AppError::FetchError { attempts: 1, .. }));
}

/// Recovers when a later attempt succeeds
#[tokio::test]
async fn test_recovers_after_transient_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/air-quality"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/air-quality"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": 1 })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_client(Duration::from_secs(2));
    let (body, attempts): (serde_json::Value, u32) = client
        .get_json_with_attempts(&format!("{}/v1/air-quality", mock_server.uri()))
        .await
        .expect("third attempt should succeed");

    assert_eq!(body["ok"], 1);
    assert_eq!(attempts, 3);
}

/// Slow responses time out per attempt and count as transient
#[tokio::test]
async fn test_timeout_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = fast_client(Duration::from_millis(100));
    let result: Result<serde_json::Value, AppError> = client
        .get_json(&format!("{}/slow", mock_server.uri()))
        .await;

    let err = result.expect_err("slow endpoint must time out");
    assert_eq!(err.fetch_kind(), Some(FetchErrorKind::Transient));
}

/// An undecodable body is permanent
#[tokio::test]
async fn test_invalid_json_is_permanent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/garbage"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_client(Duration::from_secs(2));
    let result: Result<serde_json::Value, AppError> = client
        .get_json(&format!("{}/garbage", mock_server.uri()))
        .await;

    let err = result.expect_err("html is not json");
    assert_eq!(err.fetch_kind(), Some(FetchErrorKind::Permanent));
}
