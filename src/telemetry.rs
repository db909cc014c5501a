//! Observation hook for retry waits.
//!
//! The controller emits one [`RetryEvent`] right before it suspends for a retry, carrying the
//! attempt that failed, the attempt about to start, the budget, the chosen delay and the total
//! wait so far. What a hook does with it is up to the caller; the engine only guarantees that a
//! failing hook (an `Err` or a panic) is logged and never aborts the retry loop.
//!
//! ```rust
//! use retryhook::telemetry::{observer_fn, RetryEvent};
//!
//! let hook = observer_fn(|event: &RetryEvent| {
//!     println!("{event}");
//!     Ok(())
//! });
//! # let _ = hook;
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Snapshot passed to observers before each wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryEvent {
    /// Name of the policy running the call.
    pub policy: Arc<str>,
    /// The attempt that just failed (1-indexed).
    pub failed_attempt: usize,
    /// The attempt that will start after the wait.
    pub next_attempt: usize,
    pub max_attempts: usize,
    /// The wait about to happen.
    pub delay: Duration,
    /// Whether `delay` came from a peer hint rather than the schedule.
    pub hinted: bool,
    /// Time already spent waiting in this call, excluding `delay`.
    pub total_wait: Duration,
}

impl fmt::Display for RetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: attempt {}/{} in {:?}{} (waited {:?} so far)",
            self.policy,
            self.next_attempt,
            self.max_attempts,
            self.delay,
            if self.hinted { " (peer hint)" } else { "" },
            self.total_wait
        )
    }
}

/// Error a hook may report. Logged by the controller, never propagated.
#[derive(Debug, thiserror::Error)]
#[error("retry observer failed: {0}")]
pub struct ObserverError(pub Box<dyn std::error::Error + Send + Sync>);

impl ObserverError {
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self(message.into())
    }
}

/// Receives a [`RetryEvent`] before each retry wait.
pub trait RetryObserver: Send + Sync + fmt::Debug {
    fn on_retry(&self, event: &RetryEvent) -> Result<(), ObserverError>;
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RetryObserver for NoopObserver {
    fn on_retry(&self, _event: &RetryEvent) -> Result<(), ObserverError> {
        Ok(())
    }
}

/// Logs each event at DEBUG with structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RetryObserver for TracingObserver {
    fn on_retry(&self, event: &RetryEvent) -> Result<(), ObserverError> {
        tracing::debug!(
            policy = %event.policy,
            attempt = event.next_attempt,
            max_attempts = event.max_attempts,
            delay_ms = event.delay.as_millis() as u64,
            hinted = event.hinted,
            "retrying"
        );
        Ok(())
    }
}

/// Stores events in memory, for tests and debugging.
#[derive(Debug, Clone, Default)]
pub struct MemoryObserver {
    events: Arc<Mutex<Vec<RetryEvent>>>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RetryEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RetryObserver for MemoryObserver {
    fn on_retry(&self, event: &RetryEvent) -> Result<(), ObserverError> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event.clone());
        Ok(())
    }
}

/// Closure-backed observer; see [`observer_fn`].
#[derive(Clone)]
pub struct FnObserver<F>(F);

impl<F> fmt::Debug for FnObserver<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnObserver(<fn>)")
    }
}

/// Use a closure as an observer.
pub fn observer_fn<F>(f: F) -> FnObserver<F>
where
    F: Fn(&RetryEvent) -> Result<(), ObserverError> + Send + Sync,
{
    FnObserver(f)
}

impl<F> RetryObserver for FnObserver<F>
where
    F: Fn(&RetryEvent) -> Result<(), ObserverError> + Send + Sync,
{
    fn on_retry(&self, event: &RetryEvent) -> Result<(), ObserverError> {
        (self.0)(event)
    }
}
