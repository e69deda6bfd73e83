//! HTTP valuation service against a mock server.

use domain_pipeline::resilience::{
    CircuitBreakerConfig, Guarded, RateLimiterConfig, ResilienceConfig, Resilient, RetryPolicy,
};
use domain_pipeline::stages::{HttpValuationService, ValuationService};
use domain_pipeline::Error;
use mockito::{Matcher, Server};
use std::time::Duration;

fn quick_retry() -> ResilienceConfig {
    ResilienceConfig::new()
        .with_rate_limit(RateLimiterConfig::new().with_capacity(100).with_rate(100.0))
        .with_breaker(CircuitBreakerConfig::new().with_max_failures(10))
        .with_retry(RetryPolicy::new(2, Duration::from_millis(5)))
}

#[tokio::test]
async fn test_parses_value_and_sends_domain_query() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/appraise")
        .match_query(Matcher::UrlEncoded("domain".into(), "ai.com".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"value": 1234.5}"#)
        .create_async()
        .await;

    let service = HttpValuationService::new("EstiBot", &format!("{}/appraise", server.url())).unwrap();
    assert_eq!(service.value("ai.com").await.unwrap(), 1234.5);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/appraise")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("maintenance")
        .expect(3)
        .create_async()
        .await;

    let service = HttpValuationService::new("HumbleWorth", &format!("{}/appraise", server.url())).unwrap();
    let guarded = Guarded::new(service, Resilient::new("valuation:HumbleWorth", quick_retry()));
    let err = guarded.value("ai.com").await.unwrap_err();

    assert!(matches!(err, Error::Remote { status: 503, retryable: true, .. }));
    assert!(err.to_string().contains("maintenance"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/appraise")
        .match_query(Matcher::Any)
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let service = HttpValuationService::new("GoDaddy", &format!("{}/appraise", server.url())).unwrap();
    let guarded = Guarded::new(service, Resilient::new("valuation:GoDaddy", quick_retry()));
    let err = guarded.value("ai.com").await.unwrap_err();

    assert!(matches!(err, Error::Remote { status: 404, retryable: false, .. }));
    assert_eq!(guarded.name(), "GoDaddy");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_malformed_body_is_a_serialization_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/appraise")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"price": 3}"#)
        .create_async()
        .await;

    let service = HttpValuationService::new("EstiBot", &format!("{}/appraise", server.url())).unwrap();
    let err = service.value("ai.com").await.unwrap_err();
    assert!(matches!(err, Error::Serialization(_)));
}
