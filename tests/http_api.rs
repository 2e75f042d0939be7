/// HTTP surface tests: the router driven with `oneshot` against a mocked
/// MailChimp API
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use mailchimp_signup::handlers::{router, AppState};
use mailchimp_signup::mailchimp_client::MailChimpClient;
use mailchimp_signup::models::subscriber_hash;
use mailchimp_signup::services::{MailChimpService, METADATA_CACHE_TTL};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_app(mock_server: &MockServer) -> Router {
    let client =
        MailChimpClient::with_base_url("key-us6", mock_server.uri(), Duration::from_secs(5))
            .unwrap();
    let service = MailChimpService::new(client, METADATA_CACHE_TTL);
    router(Arc::new(AppState { service }))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn mount_list(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/lists/abc123"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "abc123", "name": "Newsletter"})),
        )
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_health() {
    let mock_server = MockServer::start().await;
    let (status, body) = send(test_app(&mock_server), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_list_index() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/lists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lists": [{"id": "abc123", "name": "Newsletter"}]
        })))
        .mount(&mock_server)
        .await;

    let (status, body) = send(test_app(&mock_server), get("/api/v1/lists")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lists"][0]["name"], "Newsletter");
}

#[tokio::test]
async fn test_list_index_failure_is_bad_gateway() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/lists"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"detail": "Down for maintenance"})))
        .mount(&mock_server)
        .await;

    let (status, body) = send(test_app(&mock_server), get("/api/v1/lists")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(
        body["error"],
        "An error occurred while trying to fetch lists from MailChimp: \"Down for maintenance\""
    );
}

#[tokio::test]
async fn test_list_detail_with_members_page() {
    let mock_server = MockServer::start().await;
    mount_list(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/lists/abc123/members"))
        .and(query_param("count", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "members": [],
            "total_items": 41
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/lists/abc123/members"))
        .and(query_param("count", "2"))
        .and(query_param("offset", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "members": [
                {"email_address": "a@b.com", "status": "subscribed"},
                {"email_address": "c@d.com", "status": "cleaned"}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        test_app(&mock_server),
        get("/api/v1/lists/abc123?limit=2&offset=4"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["list"]["name"], "Newsletter");
    assert_eq!(body["total_items"], 41);
    assert_eq!(body["members"].as_array().unwrap().len(), 2);
    assert_eq!(body["members"][1]["status"], "cleaned");
}

#[tokio::test]
async fn test_list_detail_unknown_list() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/lists/nope"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "not found"})))
        .mount(&mock_server)
        .await;

    let (status, body) = send(test_app(&mock_server), get("/api/v1/lists/nope")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "The list with id \"nope\" does not exist");
}

#[tokio::test]
async fn test_list_detail_rejects_filters() {
    let mock_server = MockServer::start().await;

    let (status, body) = send(
        test_app(&mock_server),
        get("/api/v1/lists/abc123?status=subscribed"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("status"));
}

#[tokio::test]
async fn test_subscribe_endpoint() {
    let mock_server = MockServer::start().await;
    mount_list(&mock_server).await;

    Mock::given(method("PUT"))
        .and(path(format!(
            "/lists/abc123/members/{}",
            subscriber_hash("a@b.com")
        )))
        .and(body_partial_json(json!({"status": "pending"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "email_address": "a@b.com",
            "status": "pending"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        test_app(&mock_server),
        json_request(
            "POST",
            "/api/v1/lists/abc123/subscribe",
            json!({"email_address": "a@b.com"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["message"],
        "Subscribed email \"a@b.com\" to list \"Newsletter\". Note: The user will receive an email to confirm the subscription!"
    );
    assert_eq!(body["member"]["status"], "pending");
}

#[tokio::test]
async fn test_unsubscribe_endpoint() {
    let mock_server = MockServer::start().await;
    mount_list(&mock_server).await;

    Mock::given(method("PUT"))
        .and(path(format!(
            "/lists/abc123/members/{}",
            subscriber_hash("a@b.com")
        )))
        .and(body_partial_json(json!({"status": "unsubscribed"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "email_address": "a@b.com",
            "status": "unsubscribed"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        test_app(&mock_server),
        json_request(
            "POST",
            "/api/v1/lists/abc123/unsubscribe",
            json!({"email_address": "a@b.com"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["message"],
        "Unsubscribed email \"a@b.com\" from list \"Newsletter\"."
    );
}

#[tokio::test]
async fn test_validate_endpoint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!(
            "/lists/abc123/members/{}",
            subscriber_hash("taken@b.com")
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "email_address": "taken@b.com",
            "status": "subscribed"
        })))
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        test_app(&mock_server),
        get("/api/v1/lists/abc123/validate?email=taken@b.com"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert_eq!(body["errors"][0]["code"], 1422317184u64);
}

#[tokio::test]
async fn test_data_source_endpoint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/lists/abc123/interest-categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "categories": [{"id": "cat1", "title": "Topics", "type": "checkboxes"}]
        })))
        .mount(&mock_server)
        .await;

    let app = test_app(&mock_server);

    let (status, body) = send(
        app.clone(),
        get("/api/v1/data-sources/mailchimp-interest-category?listId=abc123"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"value": "cat1", "label": "Topics"}]));

    let (status, _) = send(
        app.clone(),
        get("/api/v1/data-sources/mailchimp-interest?listId=abc123"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(app, get("/api/v1/data-sources/unknown?listId=abc123")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_form_finisher_endpoint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path(format!(
            "/lists/abc123/members/{}",
            subscriber_hash("ada@example.com")
        )))
        .and(body_partial_json(json!({"merge_fields": {"FNAME": "Ada"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "email_address": "ada@example.com",
            "status": "pending"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        test_app(&mock_server),
        json_request(
            "POST",
            "/api/v1/forms/subscribe",
            json!({
                "options": {
                    "listId": "abc123",
                    "additionalFields": {"FNAME": "{firstName}"}
                },
                "values": {"email": "ada@example.com", "firstName": "Ada"}
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["member"]["status"], "pending");
}

#[tokio::test]
async fn test_interests_element_endpoint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/lists/abc123/interest-categories/cat1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cat1",
            "title": "Topics",
            "type": "radio"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/lists/abc123/interest-categories/cat1/interests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "interests": [{"id": "i1", "name": "Rust", "display_order": 1}]
        })))
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        test_app(&mock_server),
        get("/api/v1/lists/abc123/interest-categories/cat1/element"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"label": "Topics", "type": "radio", "options": {"i1": "Rust"}})
    );
}
