use apichain::http::{Auth, Client, ExecuteError, HttpExecutor, Method, Request};
use std::time::Duration;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_query_params_are_appended() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "rust lang"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("found"))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::new(Method::Get, format!("{}/search", server.uri()))
        .with_query("q", "rust lang")
        .with_query("page", "2");
    let response = Client::new().execute(&request, TIMEOUT).await.unwrap();

    assert_eq!(response.status.code(), 200);
    assert_eq!(response.body, "found");
    assert_eq!(response.size(), 5);
}

#[tokio::test]
async fn test_json_body_gets_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(header("content-type", "application/json"))
        .and(body_string(r#"{"name":"alice"}"#))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::new(Method::Post, format!("{}/users", server.uri()))
        .with_body(r#"{"name":"alice"}"#);
    let response = Client::new().execute(&request, TIMEOUT).await.unwrap();
    assert_eq!(response.status.code(), 201);
}

#[tokio::test]
async fn test_auth_schemes() {
    let server = MockServer::start().await;
    Mock::given(path("/bearer"))
        .and(header("authorization", "Bearer t0k3n"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    // "user:pass" in base64
    Mock::given(path("/basic"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(path("/key"))
        .and(header("x-api-key", "k-1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = Client::new();
    let cases = [
        ("/bearer", Auth::Bearer { token: "t0k3n".into() }),
        (
            "/basic",
            Auth::Basic {
                username: "user".into(),
                password: "pass".into(),
            },
        ),
        (
            "/key",
            Auth::ApiKey {
                header: "X-Api-Key".into(),
                value: "k-1".into(),
            },
        ),
    ];

    for (route, auth) in cases {
        let request = Request::new(Method::Get, format!("{}{}", server.uri(), route)).with_auth(auth);
        let response = client.execute(&request, TIMEOUT).await.unwrap();
        assert_eq!(response.status.code(), 204, "route {}", route);
    }
}

#[tokio::test]
async fn test_error_status_is_a_response() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let request = Request::new(Method::Delete, format!("{}/items/1", server.uri()));
    let response = Client::new().execute(&request, TIMEOUT).await.unwrap();
    assert!(response.is_server_error());
    assert!(!response.status.is_ok());
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let limit = Duration::from_millis(150);
    let request = Request::new(Method::Get, server.uri());
    let err = Client::new().execute(&request, limit).await.unwrap_err();
    assert_eq!(err, ExecuteError::Timeout(limit));
}

#[tokio::test]
async fn test_unreachable_host_is_transport_error() {
    let request = Request::new(Method::Get, "http://127.0.0.1:1/");
    let err = Client::new().execute(&request, TIMEOUT).await.unwrap_err();
    assert!(matches!(err, ExecuteError::Transport(_)));
}

#[tokio::test]
async fn test_invalid_url_is_transport_error() {
    let request = Request::new(Method::Get, "http://exa mple.com/");
    let err = Client::new().execute(&request, TIMEOUT).await.unwrap_err();
    assert!(matches!(err, ExecuteError::Transport(msg) if msg.contains("invalid URL")));
}
