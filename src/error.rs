//! Error types returned by the retry controller and policy builders.
//!
//! A caller of [`RetryPolicy::execute`](crate::RetryPolicy::execute) sees exactly one of:
//! the success value, [`RetryError::Exhausted`], [`RetryError::Permanent`], or
//! [`RetryError::Cancelled`]. Transient failures never escape on their own.

use crate::backoff::BackoffError;
use std::fmt;

/// Why a call sequence stopped waiting before its budget ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The call's cancellation token fired.
    Signal,
    /// The call's deadline passed.
    Deadline,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Signal => f.write_str("cancellation signal"),
            CancelReason::Deadline => f.write_str("deadline"),
        }
    }
}

/// Terminal error of one retried call sequence.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error and the budget is spent.
    #[error("retry exhausted after {attempts} attempts; last error: {last}")]
    Exhausted {
        attempts: usize,
        #[source]
        last: E,
    },
    /// The failure was classified terminal; no further attempts were made.
    #[error(transparent)]
    Permanent(E),
    /// The wait before the next attempt was interrupted.
    #[error("retry cancelled by {reason} after {attempts} attempts")]
    Cancelled { attempts: usize, reason: CancelReason },
}

impl<E> RetryError<E> {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Attempts made before giving up. `None` for a permanent failure, which is reported as-is.
    pub fn attempts(&self) -> Option<usize> {
        match self {
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts, .. } => Some(*attempts),
            Self::Permanent(_) => None,
        }
    }

    /// The underlying failure, if this error carries one.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            Self::Exhausted { last, .. } | Self::Permanent(last) => Some(last),
            Self::Cancelled { .. } => None,
        }
    }

    /// Consume the error, yielding the underlying failure if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Exhausted { last, .. } | Self::Permanent(last) => Some(last),
            Self::Cancelled { .. } => None,
        }
    }
}

/// Errors produced while building a retry policy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("max_attempts must be > 0 (got {0})")]
    InvalidMaxAttempts(usize),
    #[error("invalid backoff: {0}")]
    Backoff(#[from] BackoffError),
    #[error("invalid hint header name: {0:?}")]
    InvalidHintHeader(String),
}
