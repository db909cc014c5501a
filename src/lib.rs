#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # retryhook
//!
//! Retry policies for outbound HTTP calls such as chat webhooks and REST APIs.
//!
//! ## Features
//!
//! - **Bounded attempts** with an exponential schedule (4s, 8s, capped at 10s by default)
//! - **Outcome classification**: success, retryable, or terminal, pluggable per policy
//! - **Peer backoff hints** from `Retry-After` on 429 responses, used for the next wait only
//! - **Cancellation and deadlines** per call through [`CallContext`]
//! - **Retry observers** notified before every wait, isolated from the retry loop
//! - **Tower integration** via [`RetryLayer`]
//!
//! ## Quick Start
//!
//! ```rust
//! use http::StatusCode;
//! use retryhook::{HttpResponse, RetryError, RetryPolicy, TransportError};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let policy = RetryPolicy::builder()
//!         .name("chat-webhook")
//!         .max_attempts(3)
//!         .base_delay(Duration::from_millis(10))
//!         .max_delay(Duration::from_millis(50))
//!         .build()
//!         .unwrap();
//!
//!     let result = policy
//!         .execute(|| async {
//!             // send the request here
//!             Ok::<_, TransportError>(HttpResponse::new(StatusCode::NOT_FOUND, "no such hook"))
//!         })
//!         .await;
//!
//!     assert!(matches!(result, Err(RetryError::Permanent(_))));
//! }
//! ```

pub mod backoff;
pub mod classify;
#[cfg(feature = "serde")]
pub mod config;
pub mod context;
pub mod error;
pub mod jitter;
pub mod prelude;
pub mod retry;
pub mod sleeper;
pub mod telemetry;

// Re-exports
pub use backoff::{Backoff, BackoffError, BackoffStrategy};
pub use classify::{
    classifier_fn, retry_all, Classifier, ClassifierExt, HttpClassifier, HttpError, HttpResponse,
    Outcome, TransportError, TransportErrorKind,
};
#[cfg(feature = "serde")]
pub use config::RetryConfig;
pub use context::{Attempt, CallContext};
pub use error::{BuildError, CancelReason, RetryError};
pub use jitter::Jitter;
pub use retry::{RetryLayer, RetryPolicy, RetryPolicyBuilder, RetryService};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use telemetry::{
    observer_fn, MemoryObserver, NoopObserver, ObserverError, RetryEvent, RetryObserver,
    TracingObserver,
};
pub use tokio_util::sync::CancellationToken;
