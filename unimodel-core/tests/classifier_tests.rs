//! Classification of vendor failures, including real HTTP responses

use std::time::Duration;
use test_case::test_case;
use unimodel_core::diagnostics::{Classifier, ErrorKind};
use unimodel_core::redact::Redactor;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test_case(Some(429), ErrorKind::RateLimit, true ; "rate limit")]
#[test_case(Some(400), ErrorKind::InvalidRequest, false ; "bad request")]
#[test_case(Some(401), ErrorKind::Authentication, false ; "unauthorized")]
#[test_case(Some(403), ErrorKind::Authentication, false ; "forbidden")]
#[test_case(Some(404), ErrorKind::NotFound, false ; "not found")]
#[test_case(Some(408), ErrorKind::InvalidRequest, true ; "request timeout is retryable")]
#[test_case(Some(409), ErrorKind::InvalidRequest, true ; "conflict is retryable")]
#[test_case(Some(422), ErrorKind::InvalidRequest, false ; "unprocessable")]
#[test_case(Some(500), ErrorKind::Server, true ; "internal error")]
#[test_case(Some(503), ErrorKind::Server, true ; "unavailable")]
#[test_case(Some(302), ErrorKind::Unknown, false ; "redirect")]
#[test_case(None, ErrorKind::Network, true ; "no response")]
fn test_status_table(status: Option<u16>, kind: ErrorKind, retryable: bool) {
    let diagnostic = Classifier::new().classify("openai", status, None);
    assert_eq!(diagnostic.kind, kind);
    assert_eq!(diagnostic.is_retryable, retryable);
    assert_eq!(diagnostic.status, status);
    assert_eq!(diagnostic.provider, "openai");
    assert!(!diagnostic.message.is_empty());
}

#[test_case(r#"{"error":{"message":"Model overloaded"}}"# ; "nested error object")]
#[test_case(r#"{"error":"Model overloaded"}"# ; "error string")]
#[test_case(r#"{"message":"Model overloaded"}"# ; "top level message")]
#[test_case(r#"{"detail":"Model overloaded"}"# ; "detail field")]
fn test_message_shapes(body: &str) {
    let diagnostic = Classifier::new().classify("acme", Some(503), Some(body));
    assert_eq!(diagnostic.message, "Model overloaded");
    assert!(diagnostic.response_excerpt.is_some());
}

#[test]
fn test_unparseable_body_gets_generic_message() {
    let diagnostic = Classifier::new().classify("acme", Some(500), Some("<html>oops</html>"));
    assert!(diagnostic.message.contains("HTTP 500"));
    assert_eq!(diagnostic.response_excerpt.as_deref(), Some("<html>oops</html>"));
}

#[test]
fn test_secrets_never_stored() {
    let body = r#"{"error":{"message":"Incorrect API key provided: sk-proj-abc123XYZ"}}"#;
    let diagnostic = Classifier::new().classify("openai", Some(401), Some(body));
    assert!(!diagnostic.message.contains("abc123XYZ"));
    assert!(diagnostic.message.contains("[REDACTED]"));
    let excerpt = diagnostic.response_excerpt.unwrap();
    assert!(!excerpt.contains("abc123XYZ"));
}

#[test]
fn test_custom_prefix_redacted() {
    let redactor = Redactor::new().with_prefix("acme_").unwrap();
    let classifier = Classifier::with_redactor(redactor);
    let diagnostic = classifier.classify("acme", Some(401), Some(r#"{"message":"bad key acme_999"}"#));
    assert_eq!(diagnostic.message, "bad key [REDACTED]");
}

#[test]
fn test_long_excerpt_truncated() {
    let body = "x".repeat(5_000);
    let diagnostic = Classifier::new().classify("acme", Some(500), Some(&body));
    let excerpt = diagnostic.response_excerpt.unwrap();
    assert!(excerpt.chars().count() <= unimodel_core::diagnostics::MAX_EXCERPT_CHARS + 3);
    assert!(excerpt.ends_with("..."));
}

#[test]
fn test_retry_after_from_body() {
    let body = r#"{"error":{"message":"slow down","retry_after":12}}"#;
    let diagnostic = Classifier::new().classify("acme", Some(429), Some(body));
    assert_eq!(diagnostic.retry_after, Some(Duration::from_secs(12)));
}

#[tokio::test]
async fn test_classify_live_http_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "3")
                .set_body_string(r#"{"error":{"message":"Rate limit reached for sk-live0123456789"}}"#),
        )
        .mount(&server)
        .await;

    let response = reqwest::Client::new()
        .post(format!("{}/v1/chat/completions", server.uri()))
        .body("{}")
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(unimodel_core::diagnostics::parse_retry_after);
    let body = response.text().await.unwrap();

    let mut diagnostic = Classifier::new().classify("openai", Some(status), Some(&body));
    if let Some(wait) = retry_after {
        diagnostic = diagnostic.with_retry_after(wait);
    }

    assert_eq!(diagnostic.kind, ErrorKind::RateLimit);
    assert!(diagnostic.is_retryable);
    assert_eq!(diagnostic.retry_after, Some(Duration::from_secs(3)));
    assert_eq!(diagnostic.message, "Rate limit reached for [REDACTED]");
}

#[tokio::test]
async fn test_classify_reqwest_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = reqwest::get(server.uri())
        .await
        .unwrap()
        .error_for_status()
        .unwrap_err();
    let diagnostic = Classifier::new().classify_reqwest_error("acme", &err);
    assert_eq!(diagnostic.kind, ErrorKind::Server);
    assert_eq!(diagnostic.status, Some(502));
    assert!(diagnostic.is_retryable);
}

#[tokio::test]
async fn test_classify_connection_failure_as_network() {
    // Port 9 (discard) on localhost is closed in test environments
    let err = reqwest::Client::new()
        .get("http://127.0.0.1:9/")
        .timeout(Duration::from_secs(2))
        .send()
        .await
        .unwrap_err();
    let diagnostic = Classifier::new().classify_reqwest_error("acme", &err);
    assert_eq!(diagnostic.kind, ErrorKind::Network);
    assert_eq!(diagnostic.status, None);
    assert!(diagnostic.is_retryable);
}
