//! Outcome classification.
//!
//! A [`Classifier`] turns the raw result of one attempt into an [`Outcome`]: success, a
//! retryable failure (optionally carrying a peer-supplied backoff hint), or a terminal failure.
//! Classification is pure; the retry controller never reaches back into caller state to learn
//! how long to wait.
//!
//! [`HttpClassifier`] implements the rules for an HTTP endpoint such as a chat webhook:
//!
//! | raw result                          | outcome                                   |
//! |-------------------------------------|-------------------------------------------|
//! | 2xx                                 | `Success(response)`                       |
//! | 429                                 | `Retryable`, hint from `Retry-After`      |
//! | >= 500                              | `Retryable`, no hint                      |
//! | any other status                    | `Terminal`                                |
//! | transport error                     | `Retryable`, unless marked terminal       |
//! | `TransportErrorKind::MalformedRequest` | `Terminal` (client bug)                |
//!
//! ```rust
//! use http::{header::RETRY_AFTER, HeaderValue, StatusCode};
//! use retryhook::classify::{Classifier, HttpClassifier, HttpResponse, Outcome};
//! use std::time::Duration;
//!
//! let classifier = HttpClassifier::default();
//! let limited = HttpResponse::new(StatusCode::TOO_MANY_REQUESTS, "rate_limited")
//!     .with_header(RETRY_AFTER, HeaderValue::from_static("3"));
//! match classifier.classify(Ok(limited)) {
//!     Outcome::Retryable { error, hint } => {
//!         assert_eq!(error.to_string(), "rate_limited - 429");
//!         assert_eq!(hint, Some(Duration::from_secs(3)));
//!     }
//!     _ => unreachable!(),
//! }
//! ```

use http::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use http::StatusCode;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Classification of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    Success(T),
    /// Worth another attempt. `hint` is a delay requested by the peer for the next wait only.
    Retryable {
        error: E,
        hint: Option<Duration>,
    },
    /// Must not be retried regardless of remaining budget.
    Terminal(E),
}

impl<T, E> Outcome<T, E> {
    /// Retryable failure without a hint.
    pub fn retryable(error: E) -> Self {
        Outcome::Retryable { error, hint: None }
    }

    /// Map a plain `Result`: `Ok` succeeds, errors matching `is_terminal` stop, the rest retry.
    pub fn from_result(result: Result<T, E>, is_terminal: impl FnOnce(&E) -> bool) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(error) => {
                if is_terminal(&error) {
                    Outcome::Terminal(error)
                } else {
                    Outcome::retryable(error)
                }
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Outcome::Retryable { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Outcome::Terminal(_))
    }

    /// The backoff hint, if this is a retryable failure carrying one.
    pub fn hint(&self) -> Option<Duration> {
        match self {
            Outcome::Retryable { hint, .. } => *hint,
            _ => None,
        }
    }
}

/// Maps the raw result of an attempt to an [`Outcome`].
pub trait Classifier<R>: Send + Sync {
    type Output;
    type Error;

    fn classify(&self, raw: R) -> Outcome<Self::Output, Self::Error>;
}

/// Closure-backed classifier; see [`classifier_fn`].
#[derive(Clone, Copy)]
pub struct FnClassifier<F>(F);

impl<F> fmt::Debug for FnClassifier<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnClassifier(<fn>)")
    }
}

/// Use a closure as a classifier.
pub fn classifier_fn<F>(f: F) -> FnClassifier<F> {
    FnClassifier(f)
}

impl<R, T, E, F> Classifier<R> for FnClassifier<F>
where
    F: Fn(R) -> Outcome<T, E> + Send + Sync,
{
    type Output = T;
    type Error = E;

    fn classify(&self, raw: R) -> Outcome<T, E> {
        (self.0)(raw)
    }
}

/// Classifier for plain `Result`s that retries every error.
pub fn retry_all<T, E>() -> FnClassifier<fn(Result<T, E>) -> Outcome<T, E>> {
    let classify: fn(Result<T, E>) -> Outcome<T, E> = |raw| Outcome::from_result(raw, |_| false);
    FnClassifier(classify)
}

/// Classifier wrapper that fills in a missing hint from the error itself.
///
/// Built with [`ClassifierExt::hint_from`]. Only retryable outcomes without a hint are touched.
#[derive(Clone)]
pub struct HintFrom<C, F> {
    inner: C,
    source: F,
}

impl<C: fmt::Debug, F> fmt::Debug for HintFrom<C, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HintFrom").field("inner", &self.inner).field("source", &"<fn>").finish()
    }
}

impl<R, C, F> Classifier<R> for HintFrom<C, F>
where
    C: Classifier<R>,
    F: Fn(&C::Error) -> Option<Duration> + Send + Sync,
{
    type Output = C::Output;
    type Error = C::Error;

    fn classify(&self, raw: R) -> Outcome<Self::Output, Self::Error> {
        match self.inner.classify(raw) {
            Outcome::Retryable { error, hint: None } => {
                let hint = (self.source)(&error);
                Outcome::Retryable { error, hint }
            }
            other => other,
        }
    }
}

/// Combinators available on every classifier.
pub trait ClassifierExt: Sized {
    /// Extract a backoff hint from retryable errors the classifier left unhinted.
    fn hint_from<F>(self, source: F) -> HintFrom<Self, F> {
        HintFrom { inner: self, source }
    }
}

impl<C: Sized> ClassifierExt for C {}

/// Response handed over by the transport collaborator.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self { status, headers: HeaderMap::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Headers; lookups are case-insensitive.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_body(self) -> String {
        self.body
    }
}

impl From<http::Response<String>> for HttpResponse {
    fn from(response: http::Response<String>) -> Self {
        let (parts, body) = response.into_parts();
        Self { status: parts.status, headers: parts.headers, body }
    }
}

/// Broad category of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Connect,
    Timeout,
    Io,
    /// The request could not be built or sent as given. A client bug; never transient.
    MalformedRequest,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Io => "io",
            TransportErrorKind::MalformedRequest => "malformed request",
        };
        f.write_str(name)
    }
}

/// Failure below the HTTP layer: no response was received.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::MalformedRequest, message)
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Error side of an HTTP attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpError {
    /// Non-success status. Displays as `"<body> - <status>"`.
    #[error("{body} - {}", .status.as_u16())]
    Status { status: StatusCode, body: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl HttpError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            HttpError::Transport(_) => None,
        }
    }
}

impl From<HttpResponse> for HttpError {
    fn from(response: HttpResponse) -> Self {
        HttpError::Status { status: response.status, body: response.body }
    }
}

type StatusPredicate = Arc<dyn Fn(StatusCode) -> bool + Send + Sync>;
type TransportPredicate = Arc<dyn Fn(&TransportError) -> bool + Send + Sync>;

/// Classifier for `Result<HttpResponse, TransportError>`.
#[derive(Clone)]
pub struct HttpClassifier {
    hint_header: HeaderName,
    retryable_status: StatusPredicate,
    terminal_transport: TransportPredicate,
}

impl fmt::Debug for HttpClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClassifier")
            .field("hint_header", &self.hint_header)
            .field("retryable_status", &"<predicate>")
            .field("terminal_transport", &"<predicate>")
            .finish()
    }
}

impl Default for HttpClassifier {
    fn default() -> Self {
        Self {
            hint_header: RETRY_AFTER,
            retryable_status: Arc::new(default_retryable_status),
            terminal_transport: Arc::new(|e: &TransportError| {
                e.kind() == TransportErrorKind::MalformedRequest
            }),
        }
    }
}

/// 429 or any 5xx.
pub fn default_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500
}

impl HttpClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Header carrying the peer's backoff hint on a 429 (default `Retry-After`).
    pub fn with_hint_header(mut self, name: HeaderName) -> Self {
        self.hint_header = name;
        self
    }

    /// Which non-success statuses are worth retrying.
    pub fn retryable_status<F>(mut self, predicate: F) -> Self
    where
        F: Fn(StatusCode) -> bool + Send + Sync + 'static,
    {
        self.retryable_status = Arc::new(predicate);
        self
    }

    /// Which transport errors must not be retried.
    pub fn terminal_transport<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&TransportError) -> bool + Send + Sync + 'static,
    {
        self.terminal_transport = Arc::new(predicate);
        self
    }

    pub fn hint_header(&self) -> &HeaderName {
        &self.hint_header
    }

    /// Whole seconds from the hint header; anything else (HTTP-date, negative, junk) is absent.
    fn parse_hint(&self, headers: &HeaderMap) -> Option<Duration> {
        let raw = headers.get(&self.hint_header)?.to_str().ok()?;
        raw.trim().parse::<u64>().ok().map(Duration::from_secs)
    }
}

impl Classifier<Result<HttpResponse, TransportError>> for HttpClassifier {
    type Output = HttpResponse;
    type Error = HttpError;

    fn classify(
        &self,
        raw: Result<HttpResponse, TransportError>,
    ) -> Outcome<HttpResponse, HttpError> {
        let response = match raw {
            Ok(response) => response,
            Err(err) if (self.terminal_transport)(&err) => return Outcome::Terminal(err.into()),
            Err(err) => return Outcome::retryable(err.into()),
        };

        let status = response.status();
        if status.is_success() {
            return Outcome::Success(response);
        }
        if !(self.retryable_status)(status) {
            return Outcome::Terminal(response.into());
        }
        let hint = if status == StatusCode::TOO_MANY_REQUESTS {
            self.parse_hint(response.headers())
        } else {
            None
        };
        Outcome::Retryable { error: response.into(), hint }
    }
}
