//! Convenient re-exports for common retryhook types.
pub use crate::{
    backoff::{Backoff, BackoffError, BackoffStrategy, MAX_BACKOFF, MAX_HINT},
    classify::{
        classifier_fn, retry_all, Classifier, ClassifierExt, HttpClassifier, HttpError,
        HttpResponse, Outcome, TransportError, TransportErrorKind,
    },
    context::CallContext,
    error::{BuildError, CancelReason, RetryError},
    jitter::Jitter,
    retry::{RetryLayer, RetryPolicy, RetryPolicyBuilder},
    telemetry::{RetryEvent, RetryObserver, TracingObserver},
    CancellationToken,
};
