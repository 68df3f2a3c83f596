use crate::common::{client, ALICE, ALICE_AUTH, BOB, BOB_AUTH, CAROL, CAROL_AUTH};
use devrank_crawler::api::{ApiError, Target};
use devrank_crawler::config::ApiConfig;
use devrank_crawler::ApiClient;
use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn exhausted() -> ResponseTemplate {
    ResponseTemplate::new(403).insert_header("X-RateLimit-Remaining", "0")
}

fn ok(remaining: u32) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("X-RateLimit-Remaining", remaining.to_string().as_str())
        .set_body_json(json!({"id": 1, "login": "octocat"}))
}

#[tokio::test]
async fn test_fresh_response_uses_active_credential() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .and(header("authorization", ALICE_AUTH))
        .respond_with(ok(4999).insert_header("ETag", "\"v1\""))
        .expect(1)
        .mount(&server)
        .await;

    let mut c = client(&server.uri(), 3, &[ALICE, BOB]);
    let response = c.get(Target::Path("users/octocat"), None).await.unwrap();

    assert!(response.is_fresh());
    assert_eq!(response.etag(), Some("\"v1\""));
    assert_eq!(c.remaining_requests(), 4999);
    assert_eq!(c.active_username(), "alice");
}

#[tokio::test]
async fn test_conditional_request_not_modified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .and(header("if-none-match", "\"v1\""))
        .respond_with(ResponseTemplate::new(304).insert_header("X-RateLimit-Remaining", "10"))
        .expect(1)
        .mount(&server)
        .await;

    let mut c = client(&server.uri(), 3, &[ALICE]);
    let response = c
        .get(Target::Path("/users/octocat"), Some("\"v1\""))
        .await
        .unwrap();

    assert!(response.is_not_modified());
    assert!(!response.is_fresh());
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/ghost"))
        .respond_with(ResponseTemplate::new(404).insert_header("X-RateLimit-Remaining", "10"))
        .expect(1)
        .mount(&server)
        .await;

    let mut c = client(&server.uri(), 3, &[ALICE]);
    let response = c.get(Target::Path("users/ghost"), None).await.unwrap();
    assert!(response.is_not_found());
}

#[tokio::test]
async fn test_exhausted_quota_rotates_without_spending_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", ALICE_AUTH))
        .respond_with(exhausted())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("authorization", BOB_AUTH))
        .respond_with(ok(4000))
        .expect(1)
        .mount(&server)
        .await;

    // A budget of one would be gone if rotation counted as an attempt
    let mut c = client(&server.uri(), 1, &[ALICE, BOB]);
    let response = c.get(Target::Path("users/octocat"), None).await.unwrap();

    assert!(response.is_fresh());
    assert_eq!(c.active_username(), "bob");
    assert_eq!(c.credentials().index(), 1);
}

#[tokio::test]
async fn test_rotation_wraps_and_persists_across_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .and(header("authorization", ALICE_AUTH))
        .respond_with(exhausted())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .and(header("authorization", BOB_AUTH))
        .respond_with(exhausted())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("authorization", CAROL_AUTH))
        .respond_with(ok(1))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .and(header("authorization", CAROL_AUTH))
        .respond_with(exhausted())
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .and(header("authorization", ALICE_AUTH))
        .respond_with(ok(5000))
        .mount(&server)
        .await;

    let mut c = client(&server.uri(), 3, &[ALICE, BOB, CAROL]);

    c.get(Target::Path("a"), None).await.unwrap();
    assert_eq!(c.active_username(), "carol");

    // The next request starts on carol and wraps back to alice
    c.get(Target::Path("b"), None).await.unwrap();
    assert_eq!(c.active_username(), "alice");
}

#[tokio::test]
async fn test_forbidden_with_quota_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("X-RateLimit-Remaining", "12")
                .set_body_json(json!({"message": "Repository access blocked"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut c = client(&server.uri(), 3, &[ALICE, BOB]);
    let response = c
        .get(Target::Path("repos/x/y/stargazers"), None)
        .await
        .unwrap();

    assert!(response.is_forbidden());
    assert_eq!(c.active_username(), "alice");
    assert_eq!(c.remaining_requests(), 12);
}

#[tokio::test]
async fn test_missing_quota_header_counts_as_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", ALICE_AUTH))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("authorization", BOB_AUTH))
        .respond_with(ok(100))
        .mount(&server)
        .await;

    let mut c = client(&server.uri(), 3, &[ALICE, BOB]);
    let response = c.get(Target::Path("users/octocat"), None).await.unwrap();

    assert!(response.is_fresh());
    assert_eq!(c.active_username(), "bob");
}

#[tokio::test]
async fn test_retry_budget_exhaustion() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).insert_header("X-RateLimit-Remaining", "50"))
        .expect(3)
        .mount(&server)
        .await;

    let mut c = client(&server.uri(), 3, &[ALICE]);
    let err = c
        .get(Target::Path("users/octocat"), None)
        .await
        .unwrap_err();

    match err {
        ApiError::Exhausted { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected Exhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_success_on_last_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).insert_header("X-RateLimit-Remaining", "50"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ok(47))
        .expect(1)
        .mount(&server)
        .await;

    let mut c = client(&server.uri(), 3, &[ALICE]);
    let response = c.get(Target::Path("users/octocat"), None).await.unwrap();
    assert!(response.is_fresh());
}

#[tokio::test]
async fn test_transport_errors_spend_budget() {
    // Nothing listens on the port once the listener is dropped
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let mut c = client(&uri, 2, &[ALICE]);
    let err = c
        .get(Target::Path("users/octocat"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Exhausted { attempts: 2, .. }));
}

#[tokio::test]
async fn test_exhausted_pool_waits_for_reset() {
    let server = MockServer::start().await;
    let reset = chrono::Utc::now().timestamp() + 2;
    Mock::given(method("GET"))
        .respond_with(exhausted().insert_header("X-RateLimit-Reset", reset.to_string().as_str()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ok(5000))
        .mount(&server)
        .await;

    let config = ApiConfig {
        base_url: server.uri(),
        retry: 1,
        retry_delay_ms: 0,
        exhausted_pool_pause: 60,
        ..ApiConfig::default()
    };
    let mut c = ApiClient::new(&config, crate::common::pool(&[ALICE])).unwrap();

    let started = Instant::now();
    let response = c.get(Target::Path("users/octocat"), None).await.unwrap();

    assert!(response.is_fresh());
    // Paused until the reset time rather than the full minute
    assert!(started.elapsed() < Duration::from_secs(30));
}

#[tokio::test]
async fn test_absolute_url_target_for_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/1/repos"))
        .and(query_param("page", "2"))
        .respond_with(ok(10))
        .expect(1)
        .mount(&server)
        .await;

    let mut c = client(&server.uri(), 1, &[ALICE]);
    let next = format!("{}/user/1/repos?page=2", server.uri());
    let response = c.get(Target::Url(&next), None).await.unwrap();
    assert!(response.is_fresh());
}
