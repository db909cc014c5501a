//! Per-call retry state.
//!
//! Everything that changes while a call sequence runs lives here or in the controller's loop
//! locals, never on the [`RetryPolicy`](crate::RetryPolicy). One policy can therefore serve any
//! number of concurrent calls, each with its own `CallContext`.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One execution of the wrapped operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    index: usize,
    started_at: Instant,
}

impl Attempt {
    /// 1-based attempt number.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}

/// Cancellation, deadline, and statistics for a single call sequence.
///
/// ```rust
/// use retryhook::CallContext;
/// use std::time::Duration;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let ctx = CallContext::new().with_timeout(Duration::from_secs(30));
/// let cancel = ctx.cancellation_token();
/// // hand `cancel` to whoever may abort the call, then `policy.execute_with(&mut ctx, ..)`
/// # drop(cancel);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    attempts: Vec<Attempt>,
    total_wait: Duration,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing token, e.g. a child of a shutdown token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Stop waiting once `deadline` passes.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Stop waiting once `timeout` has elapsed from now.
    ///
    /// A timeout too large to represent as an instant (e.g. `Duration::MAX`) means no deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    /// Token that interrupts this call's waits when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Attempts made so far, in order.
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    /// Sum of the delays waited out so far. Interrupted waits are not counted.
    pub fn total_wait(&self) -> Duration {
        self.total_wait
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Start a new call sequence; cancellation and deadline are kept.
    pub(crate) fn reset(&mut self) {
        self.attempts.clear();
        self.total_wait = Duration::ZERO;
    }

    pub(crate) fn begin_attempt(&mut self) -> Attempt {
        let attempt = Attempt { index: self.attempts.len() + 1, started_at: Instant::now() };
        self.attempts.push(attempt);
        attempt
    }

    pub(crate) fn record_wait(&mut self, delay: Duration) {
        self.total_wait = self.total_wait.saturating_add(delay);
    }
}
