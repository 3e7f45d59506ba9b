use serde_json::json;
use sitedesk::chat::{ChatTransport, PersistRequest};
use sitedesk::client::{ApiClient, ApiError, AuthContext};
use sitedesk::cms::content::default_page;
use sitedesk::cms::{ContentResolver, HttpRepository, Page, Product, Repository};
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, auth: AuthContext) -> ApiClient {
    ApiClient::with_base_url(format!("{}/api", server.uri()), auth).unwrap()
}

#[tokio::test]
async fn chat_message_is_posted_and_acknowledged() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat/message"))
        .and(body_partial_json(json!({ "sender": "user", "message": "hello", "pageUrl": "/home" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true,
            "data": { "sessionId": "7d0f", "messageId": 3 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = PersistRequest::user("hello");
    request.page_url = Some("/home".to_string());

    let ack = client(&server, AuthContext::in_memory()).persist(&request).await.unwrap();
    assert_eq!(ack.session_id, "7d0f");
    assert_eq!(ack.message_id, Some(3));
}

#[tokio::test]
async fn bearer_token_follows_login_and_logout() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/admin/products"))
        .and(header("authorization", "Bearer secret-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{ "_id": "p1", "name": "Starter site", "price": 499.0 }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/products"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid or missing API key" })))
        .mount(&server)
        .await;

    let auth = AuthContext::in_memory();
    let repo = HttpRepository::<Product>::new(client(&server, auth.clone()));

    let err = repo.list().await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Status {
            status: 401,
            message: "Invalid or missing API key".to_string()
        }
    );

    auth.login("secret-1").unwrap();
    let products = repo.list().await.unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].id.as_deref(), Some("p1"));
    assert_eq!(products[0].price, Some(499.0));

    auth.logout().unwrap();
    assert!(repo.list().await.is_err());
}

#[tokio::test]
async fn failures_are_normalised_into_the_response() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/admin/pages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": false, "message": "Maintenance" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/admin/crm/1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = client(&server, AuthContext::in_memory());

    let rejected = client.get::<Vec<Page>>("/admin/pages").await;
    assert!(!rejected.success);
    assert_eq!(rejected.message, "Maintenance");
    assert_eq!(rejected.error, Some(ApiError::Rejected("Maintenance".to_string())));

    let garbled = client.get::<Vec<serde_json::Value>>("/admin/settings").await;
    assert!(!garbled.success);
    assert!(matches!(garbled.error, Some(ApiError::Decode(_))));

    let empty = client.delete::<serde_json::Value>("/admin/crm/1").await;
    assert!(empty.success);
    assert!(empty.data.is_none());
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let client = ApiClient::with_base_url("http://127.0.0.1:9", AuthContext::in_memory()).unwrap();
    let response = client.get::<serde_json::Value>("/health").await;

    assert!(!response.success);
    let err = response.error.unwrap();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn create_returns_the_relisted_collection() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/admin/products"))
        .and(body_partial_json(json!({ "name": "Audit" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "success": true, "data": { "id": "p9" } })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [
                { "id": "p1", "name": "Starter site" },
                { "id": "p9", "name": "Audit" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let repo = HttpRepository::<Product>::new(client(&server, AuthContext::with_token("k")));
    let draft: Product = serde_json::from_value(json!({ "name": "Audit" })).unwrap();

    let items = repo.create(&draft).await.unwrap();
    let names: Vec<&str> = items.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Starter site", "Audit"]);
}

#[tokio::test]
async fn published_page_overrides_default_content() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/admin/pages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [
                { "id": "1", "title": "Draft", "slug": "home", "published": false, "content": { "hero": { "heading": "Draft" } } },
                { "id": "2", "title": "Welcome", "slug": "home", "published": true, "content": { "hero": { "heading": "Hello from the CMS" } } }
            ]
        })))
        .mount(&server)
        .await;

    let resolver = ContentResolver::new(Arc::new(HttpRepository::<Page>::new(client(&server, AuthContext::in_memory()))));
    let fallback = default_page("home").unwrap();
    let view = resolver.resolve(fallback.clone()).await;

    assert!(view.overridden);
    assert_eq!(view.title, "Welcome");
    assert_eq!(view.content["hero"]["heading"], "Hello from the CMS");
    assert_eq!(view.content["hero"]["subheading"], fallback.content["hero"]["subheading"]);
    assert_eq!(view.content["sections"], fallback.content["sections"]);
}

#[tokio::test]
async fn backend_outage_serves_default_content() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/admin/pages"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let resolver = ContentResolver::new(Arc::new(HttpRepository::<Page>::new(client(&server, AuthContext::in_memory()))));
    let fallback = default_page("contact").unwrap();

    assert_eq!(resolver.resolve(fallback.clone()).await, fallback);
}
