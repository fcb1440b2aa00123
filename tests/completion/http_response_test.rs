//! HTTP status mapping and error-body sanitization tests.
//!
//! Serves one canned HTTP response from a raw TCP socket so the real
//! reqwest/axum stack is exercised without external dependencies.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use mentord::completion::openai::OpenAiClient;
use mentord::completion::{check_http_response, CompletionClient, CompletionError};

async fn serve_once(status_line: &str, body: &str) -> String {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) => panic!("listener should bind: {err}"),
    };
    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(err) => panic!("listener should expose local addr: {err}"),
    };

    let status_line_owned = status_line.to_owned();
    let body_owned = body.to_owned();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut read_buf = [0_u8; 4096];
            let _ = socket.read(&mut read_buf).await;

            let response = format!(
                "HTTP/1.1 {status_line_owned}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body_owned}",
                body_owned.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });

    format!("http://{addr}/")
}

#[tokio::test]
async fn status_429_maps_to_rate_limited() {
    let url = serve_once("429 Too Many Requests", "{\"error\":\"quota\"}").await;

    let response = match reqwest::get(url).await {
        Ok(response) => response,
        Err(err) => panic!("request should complete: {err}"),
    };

    let checked = check_http_response(response).await;
    assert!(matches!(checked, Err(CompletionError::RateLimited)));
}

#[tokio::test]
async fn other_error_status_maps_to_http_status() {
    let url = serve_once("500 Internal Server Error", "boom").await;

    let response = match reqwest::get(url).await {
        Ok(response) => response,
        Err(err) => panic!("request should complete: {err}"),
    };

    let checked = check_http_response(response).await;
    match checked {
        Err(CompletionError::HttpStatus { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn error_body_redacts_api_keys() {
    let leaked = "sk-abcdefghijklmnopqrstuvwxyz123456";
    let body = format!("invalid key {leaked} rejected");
    let url = serve_once("401 Unauthorized", &body).await;

    let response = match reqwest::get(url).await {
        Ok(response) => response,
        Err(err) => panic!("request should complete: {err}"),
    };

    match check_http_response(response).await {
        Err(CompletionError::HttpStatus { body, .. }) => {
            assert!(!body.contains(leaked));
            assert!(body.contains("[REDACTED]"));
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn success_status_returns_body() {
    let url = serve_once("200 OK", "{\"ok\":true}").await;

    let response = match reqwest::get(url).await {
        Ok(response) => response,
        Err(err) => panic!("request should complete: {err}"),
    };

    let body = check_http_response(response)
        .await
        .expect("2xx should pass through");
    assert_eq!(body, "{\"ok\":true}");
}

#[tokio::test]
async fn generate_round_trips_against_canned_endpoint() {
    let payload = serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": " Bonjour ! "}}]
    })
    .to_string();
    let url = serve_once("200 OK", &payload).await;

    let client = OpenAiClient::with_base_url(
        "gpt-4.1-mini".to_owned(),
        Some("test-key".to_owned()),
        std::time::Duration::from_secs(5),
        url,
    )
    .expect("client should build");

    let reply = client
        .generate("Tu es un mentor.", "Bonjour", 400)
        .await
        .expect("generate should succeed");
    assert_eq!(reply, "Bonjour !");
}

#[tokio::test]
async fn generate_surfaces_rate_limit_from_endpoint() {
    let url = serve_once("429 Too Many Requests", "{}").await;

    let client = OpenAiClient::with_base_url(
        "gpt-4.1-mini".to_owned(),
        Some("test-key".to_owned()),
        std::time::Duration::from_secs(5),
        url,
    )
    .expect("client should build");

    let result = client.generate("sys", "msg", 400).await;
    assert!(matches!(result, Err(CompletionError::RateLimited)));
}
