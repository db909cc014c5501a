//! Retry controller.
//!
//! Semantics:
//! - `max_attempts` counts total attempts (initial try + retries).
//! - Each attempt's raw result goes through the policy's [`Classifier`]: `Success` returns,
//!   `Terminal` returns [`RetryError::Permanent`] immediately, `Retryable` waits and tries again.
//! - The wait after attempt `n` is the peer's hint when the classifier attached a sane one,
//!   otherwise the backoff schedule at `n` (jittered if configured). A hint is consumed by the
//!   wait right after the attempt that produced it and never carried further.
//! - The observer sees a [`RetryEvent`] before every wait that starts. A failing observer is
//!   logged, not propagated.
//! - Waits race the call's cancellation token; a wait that would end past the call's deadline is
//!   not started. Either way the call ends with [`RetryError::Cancelled`].
//!
//! Invariants:
//! - The operation runs at most `max_attempts` times, at most once per attempt, and never after
//!   a success or a terminal classification.
//! - The policy is never mutated by a call; per-call state lives in [`CallContext`].
//!
//! Example
//! ```rust
//! use http::StatusCode;
//! use retryhook::{HttpResponse, InstantSleeper, RetryPolicy, TransportError};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let policy = RetryPolicy::builder()
//!     .name("slack-webhook")
//!     .max_attempts(4)
//!     .with_sleeper(InstantSleeper)
//!     .build()
//!     .unwrap();
//!
//! let response = policy
//!     .execute(|| async {
//!         Ok::<_, TransportError>(HttpResponse::new(StatusCode::OK, "ok"))
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(response.body(), "ok");
//! # });
//! ```

use crate::backoff::{accept_hint, Backoff};
use crate::classify::{Classifier, HttpClassifier, Outcome};
use crate::context::CallContext;
use crate::error::{BuildError, CancelReason, RetryError};
use crate::jitter::Jitter;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::telemetry::{NoopObserver, RetryEvent, RetryObserver};
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::Instant;
use tower::ServiceExt;
use tower_layer::Layer;
use tower_service::Service;

pub const DEFAULT_MAX_ATTEMPTS: usize = 4;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(4);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);
pub const DEFAULT_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_POLICY_NAME: &str = "retry";

/// Immutable retry policy: budget, schedule, classifier, observer, and sleeper.
///
/// Cheap to clone and safe to share across concurrent calls.
pub struct RetryPolicy<C = HttpClassifier> {
    name: Arc<str>,
    max_attempts: usize,
    backoff: Backoff,
    jitter: Jitter,
    classifier: Arc<C>,
    observer: Arc<dyn RetryObserver>,
    sleeper: Arc<dyn Sleeper>,
}

impl<C> Clone for RetryPolicy<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            max_attempts: self.max_attempts,
            backoff: self.backoff.clone(),
            jitter: self.jitter,
            classifier: self.classifier.clone(),
            observer: self.observer.clone(),
            sleeper: self.sleeper.clone(),
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for RetryPolicy<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("name", &self.name)
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("jitter", &self.jitter)
            .field("classifier", &self.classifier)
            .field("observer", &self.observer)
            .field("sleeper", &self.sleeper)
            .finish()
    }
}

impl RetryPolicy<HttpClassifier> {
    /// Builder with the defaults: 4 attempts, 4s doubling to at most 10s, HTTP classification.
    pub fn builder() -> RetryPolicyBuilder<HttpClassifier> {
        RetryPolicyBuilder::new()
    }
}

impl<C> RetryPolicy<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Wrap a tower service with this policy.
    pub fn into_layer(self) -> RetryLayer<C> {
        RetryLayer::new(self)
    }

    /// Run `operation` under this policy with a fresh [`CallContext`].
    pub async fn execute<R, Fut, Op>(
        &self,
        operation: Op,
    ) -> Result<C::Output, RetryError<C::Error>>
    where
        C: Classifier<R>,
        C::Error: fmt::Display,
        Fut: Future<Output = R>,
        Op: FnMut() -> Fut,
    {
        let mut ctx = CallContext::new();
        self.execute_with(&mut ctx, operation).await
    }

    /// Run `operation` under this policy using the caller's context.
    ///
    /// The context's attempt log and wait total are reset first; its cancellation token and
    /// deadline apply to every wait. After the call the context holds the attempts made.
    pub async fn execute_with<R, Fut, Op>(
        &self,
        ctx: &mut CallContext,
        mut operation: Op,
    ) -> Result<C::Output, RetryError<C::Error>>
    where
        C: Classifier<R>,
        C::Error: fmt::Display,
        Fut: Future<Output = R>,
        Op: FnMut() -> Fut,
    {
        ctx.reset();
        loop {
            let attempt = ctx.begin_attempt().index();
            tracing::debug!(
                policy = %self.name,
                attempt,
                max_attempts = self.max_attempts,
                "attempt started"
            );

            let (error, hint) = match self.classifier.classify(operation().await) {
                Outcome::Success(value) => return Ok(value),
                Outcome::Terminal(error) => {
                    tracing::warn!(policy = %self.name, attempt, %error, "terminal failure");
                    return Err(RetryError::Permanent(error));
                }
                Outcome::Retryable { error, hint } => (error, hint),
            };

            if attempt >= self.max_attempts {
                tracing::error!(policy = %self.name, attempts = attempt, %error, "retry exhausted");
                return Err(RetryError::Exhausted { attempts: attempt, last: error });
            }
            tracing::warn!(policy = %self.name, attempt, %error, "attempt failed; retrying");

            let (delay, hinted) = self.delay_after(attempt, hint);
            if let Err(reason) = Self::can_wait(ctx, delay) {
                tracing::warn!(policy = %self.name, attempts = attempt, %reason, "retry cancelled");
                return Err(RetryError::Cancelled { attempts: attempt, reason });
            }
            self.notify(&RetryEvent {
                policy: self.name.clone(),
                failed_attempt: attempt,
                next_attempt: attempt + 1,
                max_attempts: self.max_attempts,
                delay,
                hinted,
                total_wait: ctx.total_wait(),
            });

            if let Err(reason) = self.wait(ctx, delay).await {
                tracing::warn!(policy = %self.name, attempts = attempt, %reason, "retry cancelled");
                return Err(RetryError::Cancelled { attempts: attempt, reason });
            }
            ctx.record_wait(delay);
        }
    }

    /// Delay after failed `attempt`, and whether it came from the peer.
    fn delay_after(&self, attempt: usize, hint: Option<Duration>) -> (Duration, bool) {
        match accept_hint(hint) {
            Some(hinted) => (hinted, true),
            None => (self.jitter.apply(self.backoff.delay(attempt)), false),
        }
    }

    fn notify(&self, event: &RetryEvent) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.observer.on_retry(event))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(policy = %self.name, error = %err, "retry observer failed");
            }
            Err(_) => tracing::warn!(policy = %self.name, "retry observer panicked"),
        }
    }

    /// Refuse a wait up front when the call is already cancelled or the wait would outlast the
    /// deadline, so observers never hear about an attempt that cannot start.
    fn can_wait(ctx: &CallContext, delay: Duration) -> Result<(), CancelReason> {
        if ctx.token().is_cancelled() {
            return Err(CancelReason::Signal);
        }
        if let Some(deadline) = ctx.deadline() {
            let past_deadline = Instant::now().checked_add(delay).map_or(true, |end| end > deadline);
            if past_deadline {
                return Err(CancelReason::Deadline);
            }
        }
        Ok(())
    }

    async fn wait(&self, ctx: &CallContext, delay: Duration) -> Result<(), CancelReason> {
        tokio::select! {
            biased;
            _ = ctx.token().cancelled() => Err(CancelReason::Signal),
            _ = self.sleeper.sleep(delay) => Ok(()),
        }
    }
}

/// Builder for [`RetryPolicy`].
pub struct RetryPolicyBuilder<C = HttpClassifier> {
    name: Arc<str>,
    max_attempts: usize,
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    backoff: Option<Backoff>,
    jitter: Jitter,
    classifier: C,
    observer: Arc<dyn RetryObserver>,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryPolicyBuilder<HttpClassifier> {
    pub fn new() -> Self {
        Self {
            name: Arc::from(DEFAULT_POLICY_NAME),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            backoff: None,
            jitter: Jitter::None,
            classifier: HttpClassifier::default(),
            observer: Arc::new(NoopObserver),
            sleeper: Arc::new(TokioSleeper),
        }
    }
}

impl Default for RetryPolicyBuilder<HttpClassifier> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> RetryPolicyBuilder<C> {
    /// Name reported in events and logs.
    pub fn name(mut self, name: impl AsRef<str>) -> Self {
        self.name = Arc::from(name.as_ref());
        self
    }

    /// Total attempts (initial + retries). Must be > 0.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// First scheduled wait of the default exponential schedule.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Cap of the default exponential schedule. Must be >= `base_delay`.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Growth factor of the default exponential schedule. Must be >= 1.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Replace the exponential schedule entirely.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = Some(backoff);
        self
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Swap the classifier, changing the kind of operation the policy can run.
    pub fn classifier<C2>(self, classifier: C2) -> RetryPolicyBuilder<C2> {
        RetryPolicyBuilder {
            name: self.name,
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            multiplier: self.multiplier,
            backoff: self.backoff,
            jitter: self.jitter,
            classifier,
            observer: self.observer,
            sleeper: self.sleeper,
        }
    }

    pub fn with_observer<O>(mut self, observer: O) -> Self
    where
        O: RetryObserver + 'static,
    {
        self.observer = Arc::new(observer);
        self
    }

    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Build the retry policy, validating inputs.
    pub fn build(self) -> Result<RetryPolicy<C>, BuildError> {
        if self.max_attempts == 0 {
            return Err(BuildError::InvalidMaxAttempts(0));
        }
        let backoff = match self.backoff {
            Some(backoff) => backoff,
            None => Backoff::exponential(self.base_delay)
                .with_multiplier(self.multiplier)?
                .with_max(self.max_delay)?,
        };
        Ok(RetryPolicy {
            name: self.name,
            max_attempts: self.max_attempts,
            backoff,
            jitter: self.jitter,
            classifier: Arc::new(self.classifier),
            observer: self.observer,
            sleeper: self.sleeper,
        })
    }
}

/// Tower layer applying a [`RetryPolicy`] to every request.
///
/// Requests must be `Clone`; each attempt calls a fresh clone of the inner service.
pub struct RetryLayer<C = HttpClassifier> {
    policy: RetryPolicy<C>,
}

impl<C> RetryLayer<C> {
    pub fn new(policy: RetryPolicy<C>) -> Self {
        Self { policy }
    }
}

impl<C> Clone for RetryLayer<C> {
    fn clone(&self) -> Self {
        Self { policy: self.policy.clone() }
    }
}

impl<S, C> Layer<S> for RetryLayer<C> {
    type Service = RetryService<S, C>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService { inner, policy: self.policy.clone() }
    }
}

/// Service produced by [`RetryLayer`].
pub struct RetryService<S, C = HttpClassifier> {
    inner: S,
    policy: RetryPolicy<C>,
}

impl<S: Clone, C> Clone for RetryService<S, C> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), policy: self.policy.clone() }
    }
}

impl<S, C, Request> Service<Request> for RetryService<S, C>
where
    Request: Clone + Send + 'static,
    S: Service<Request> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    S::Response: Send + 'static,
    C: Classifier<Result<S::Response, S::Error>> + 'static,
    C::Output: Send + 'static,
    C::Error: fmt::Display + Send + 'static,
{
    type Response = C::Output;
    type Error = RetryError<C::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness is driven per attempt through `oneshot` on a clone.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let policy = self.policy.clone();
        let inner = self.inner.clone();
        Box::pin(async move { policy.execute(move || inner.clone().oneshot(req.clone())).await })
    }
}
