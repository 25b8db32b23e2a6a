//! Integration tests for the GraphQL HTTP session against a mock OS2mo.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mo_init::domain::ports::{GraphqlSession, GraphqlSessionError};
use mo_init::domain::{CREATE_FACET, ROOT_ORG_QUERY, SessionErrorKind, classify_session_error};
use futures_util::future::join_all;
use mo_init::outbound::graphql::{HttpGraphqlSession, MAX_IN_FLIGHT_REQUESTS};
use mo_init::test_support::StaticTokenProvider;
use reqwest::Url;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GRAPHQL_PATH: &str = "/graphql/v22";

fn endpoint(server: &MockServer) -> Url {
    Url::parse(&format!("{}{GRAPHQL_PATH}", server.uri())).expect("valid endpoint")
}

fn session(server: &MockServer, tokens: Arc<StaticTokenProvider>) -> HttpGraphqlSession {
    HttpGraphqlSession::new(endpoint(server), Duration::from_secs(5), tokens)
        .expect("client should build")
}

#[tokio::test]
async fn posts_operation_with_bearer_token_and_returns_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(header("authorization", "Bearer token-1"))
        .and(body_json(json!({
            "query": CREATE_FACET.document,
            "operationName": "CreateFacet",
            "variables": {"user_key": "visibility"},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"facet_create": {"uuid": "0f8b4b5c-ef3e-4a43-9f4b-0a5fd1c8d7e2"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let data = session(&server, Arc::new(StaticTokenProvider::new("token-1")))
        .execute(&CREATE_FACET, json!({"user_key": "visibility"}))
        .await
        .expect("mutation should succeed");

    assert_eq!(
        data,
        json!({"facet_create": {"uuid": "0f8b4b5c-ef3e-4a43-9f4b-0a5fd1c8d7e2"}})
    );
}

#[tokio::test]
async fn unconfigured_org_error_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{"message": "ErrorCodes.E_ORG_UNCONFIGURED", "path": ["org"]}]
        })))
        .mount(&server)
        .await;

    let error = session(&server, Arc::new(StaticTokenProvider::new("token-1")))
        .execute(&ROOT_ORG_QUERY, json!({}))
        .await
        .expect_err("query should fail");

    assert_eq!(classify_session_error(&error), SessionErrorKind::NotConfigured);
}

#[tokio::test]
async fn rejected_token_is_invalidated_and_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"org": {"uuid": "67bae43a-2b92-484a-9476-95135633aaf4"}}
        })))
        .expect(1)
        .mount(&server)
        .await;
    let tokens = Arc::new(StaticTokenProvider::new("token-1"));

    session(&server, Arc::clone(&tokens))
        .execute(&ROOT_ORG_QUERY, json!({}))
        .await
        .expect("retry should succeed");

    assert_eq!(tokens.invalidations(), 1);
}

#[tokio::test]
async fn repeated_rejection_is_unauthorised() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .expect(2)
        .mount(&server)
        .await;

    let error = session(&server, Arc::new(StaticTokenProvider::new("token-1")))
        .execute(&ROOT_ORG_QUERY, json!({}))
        .await
        .expect_err("request should fail");

    assert!(matches!(error, GraphqlSessionError::Unauthorized { .. }));
}

#[tokio::test]
async fn slow_responses_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {}}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;
    let session = HttpGraphqlSession::new(
        endpoint(&server),
        Duration::from_millis(100),
        Arc::new(StaticTokenProvider::new("token-1")),
    )
    .expect("client should build");

    let error = session
        .execute(&ROOT_ORG_QUERY, json!({}))
        .await
        .expect_err("request should time out");

    assert!(
        matches!(error, GraphqlSessionError::Timeout { .. }),
        "unexpected error: {error:?}"
    );
}

#[tokio::test]
async fn server_errors_map_to_transport_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let error = session(&server, Arc::new(StaticTokenProvider::new("token-1")))
        .execute(&ROOT_ORG_QUERY, json!({}))
        .await
        .expect_err("request should fail");

    assert_eq!(
        error,
        GraphqlSessionError::transport("status 503: maintenance")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_are_bounded_per_session() {
    const RESPONSE_DELAY: Duration = Duration::from_millis(300);
    let requests = MAX_IN_FLIGHT_REQUESTS * 2;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"org": {"uuid": "67bae43a-2b92-484a-9476-95135633aaf4"}}}))
                .set_delay(RESPONSE_DELAY),
        )
        .expect(u64::try_from(requests).expect("request count fits u64"))
        .mount(&server)
        .await;
    let session = session(&server, Arc::new(StaticTokenProvider::new("token-1")));

    let started = Instant::now();
    let results = join_all((0..requests).map(|_| session.execute(&ROOT_ORG_QUERY, json!({})))).await;
    let elapsed = started.elapsed();

    assert!(results.iter().all(Result::is_ok), "every request should succeed");
    // Twice the permit count needs at least two full response delays.
    assert!(
        elapsed >= RESPONSE_DELAY * 2,
        "{requests} requests finished in {elapsed:?}; the session let more than \
         {MAX_IN_FLIGHT_REQUESTS} run at once"
    );
}
