//! Posting to a flaky chat webhook through the retry layer.
//!
//! The fake webhook answers 503, then 429 with `Retry-After: 1`, then 200. Run with
//! `RUST_LOG=debug` to see every attempt and wait.

use http::header::{HeaderValue, RETRY_AFTER};
use http::StatusCode;
use retryhook::{HttpResponse, RetryLayer, RetryPolicy, TracingObserver, TransportError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::{service_fn, ServiceExt};
use tower_layer::Layer;
use tracing_subscriber::EnvFilter;

async fn flaky_webhook(
    calls: Arc<AtomicUsize>,
    payload: String,
) -> Result<HttpResponse, TransportError> {
    let n = calls.fetch_add(1, Ordering::SeqCst);
    println!("   webhook call #{} with {payload}", n + 1);
    let response = match n {
        0 => HttpResponse::new(StatusCode::SERVICE_UNAVAILABLE, "upstream unavailable"),
        1 => HttpResponse::new(StatusCode::TOO_MANY_REQUESTS, "rate limited")
            .with_header(RETRY_AFTER, HeaderValue::from_static("1")),
        _ => HttpResponse::new(StatusCode::OK, "ok"),
    };
    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== retryhook: flaky webhook ===\n");

    let policy = RetryPolicy::builder()
        .name("chat-webhook")
        .max_attempts(4)
        .base_delay(Duration::from_millis(500))
        .max_delay(Duration::from_secs(2))
        .with_observer(TracingObserver)
        .build()?;

    let calls = Arc::new(AtomicUsize::new(0));
    let webhook = service_fn({
        let calls = calls.clone();
        move |payload: String| flaky_webhook(calls.clone(), payload)
    });

    let response = RetryLayer::new(policy)
        .layer(webhook)
        .oneshot(r#"{"text":"deploy finished"}"#.to_string())
        .await?;

    println!(
        "\n   delivered after {} calls: {} {}",
        calls.load(Ordering::SeqCst),
        response.status(),
        response.body()
    );
    Ok(())
}
