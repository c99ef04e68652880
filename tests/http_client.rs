//! reqwest-backed client against a local mock server: status, timeout and body handling.

use novelscrape::scraper::{ErrorKind, HttpClient, HttpStatusError, NetworkClient, Request};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn success_returns_body_and_final_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/novel/a-will-eternal/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>A Will Eternal</h1>"))
        .mount(&server)
        .await;

    let client = HttpClient::new().unwrap();
    let url = format!("{}/novel/a-will-eternal/", server.uri());
    let response = client.get(&url).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.url, url);
    assert_eq!(response.body, "<h1>A Will Eternal</h1>");
}

#[tokio::test]
async fn server_error_is_network_error_with_status_cause() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/novel/missing/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = HttpClient::new().unwrap();
    let err = client
        .get(&format!("{}/novel/missing/", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    let status = err
        .cause()
        .and_then(|c| c.downcast_ref::<HttpStatusError>())
        .map(|e| e.status);
    assert_eq!(status, Some(500));
}

#[tokio::test]
async fn slow_response_times_out_as_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let client = HttpClient::builder().timeout_secs(1).build().unwrap();
    let err = client.get(&server.uri()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn form_post_sends_encoded_fields_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/e/search/index.php"))
        .and(header("referer", "https://www.fanmtl.com/"))
        .and(body_string_contains("keyboard=martial+peak"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::builder().user_agent("novelscrape-test").build().unwrap();
    let request = Request::post(format!("{}/e/search/index.php", server.uri()))
        .header("Referer", "https://www.fanmtl.com/")
        .form([("show", "title"), ("keyboard", "martial peak")]);
    let response = client.call(request).await.unwrap();
    assert_eq!(response.body, "ok");
}

#[tokio::test]
async fn json_post_and_malformed_json_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/series/search"))
        .and(body_json(json!({"search": "solo", "page": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = HttpClient::new().unwrap();
    let request = Request::post(format!("{}/v1/series/search", server.uri()))
        .json(json!({"search": "solo", "page": 1}));
    let response = client.call(request).await.unwrap();
    let err = response.to_json().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parsing);
}

#[tokio::test]
async fn refused_connection_is_network_error() {
    // Nothing listens on port 1.
    let client = HttpClient::builder().timeout_secs(2).build().unwrap();
    let err = client.get("http://127.0.0.1:1/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
}
