//! Backoff strategies for retry policies.
//!
//! Provides exponential, constant, and chained schedules. Attempt semantics: `attempt` is the
//! 1-based index of the attempt that just failed, so the first retry wait uses `delay(1)`.
//! Index `0` represents the initial call and always yields zero.
//!
//! A peer may also supply a delay (for example a `Retry-After` header on a 429). Such a hint
//! overrides the schedule for the very next wait only; see [`BackoffStrategy::next_delay`].
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use retryhook::backoff::{Backoff, BackoffStrategy};
//!
//! let backoff = Backoff::exponential(Duration::from_secs(4))
//!     .with_max(Duration::from_secs(10))
//!     .unwrap();
//! assert_eq!(backoff.delay(1), Duration::from_secs(4));
//! assert_eq!(backoff.delay(2), Duration::from_secs(8));
//! assert_eq!(backoff.delay(3), Duration::from_secs(10)); // capped
//! assert_eq!(backoff.next_delay(3, Some(Duration::from_secs(3))), Duration::from_secs(3));
//! ```
//!
//! Overflow behavior: computations that would overflow saturate to the configured max, or to
//! `MAX_BACKOFF` (1 day) when no max is set.

use std::fmt;
use std::time::Duration;

/// Maximum delay used when calculations overflow (1 day).
pub const MAX_BACKOFF: Duration = Duration::from_secs(24 * 60 * 60);

/// Largest peer-supplied hint that is honored. Anything above is treated as absent.
pub const MAX_HINT: Duration = MAX_BACKOFF;

/// Errors returned by backoff configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackoffError {
    #[error("with_max is only valid for exponential backoff")]
    MaxNotSupported,
    #[error("max must be greater than zero")]
    MaxMustBePositive,
    #[error("max ({max:?}) must be >= base ({base:?})")]
    MaxLessThanBase { base: Duration, max: Duration },
    #[error("multiplier must be finite and >= 1 (got {0})")]
    InvalidMultiplier(f64),
}

/// Trait implemented by all backoff strategies.
pub trait BackoffStrategy: Send + Sync + fmt::Debug {
    /// Scheduled delay after the given failed attempt (1-based; `0` yields zero).
    fn delay(&self, attempt: usize) -> Duration;

    /// Delay before the next attempt, preferring a sane peer hint over the schedule.
    ///
    /// The hint is taken by value: it applies to this wait only.
    fn next_delay(&self, attempt: usize, hint: Option<Duration>) -> Duration {
        accept_hint(hint).unwrap_or_else(|| self.delay(attempt))
    }
}

/// Filter a peer-supplied hint, dropping values too large to be meaningful.
pub fn accept_hint(hint: Option<Duration>) -> Option<Duration> {
    hint.filter(|h| *h <= MAX_HINT)
}

#[derive(Debug, Clone, PartialEq)]
struct ExponentialBackoff {
    base: Duration,
    multiplier: f64,
    max: Option<Duration>,
}

impl BackoffStrategy for ExponentialBackoff {
    fn delay(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let ceiling = self.max.unwrap_or(MAX_BACKOFF).min(MAX_BACKOFF);
        let exponent = attempt.saturating_sub(1).min(i32::MAX as usize) as i32;
        let nanos = (self.base.as_nanos() as f64 * self.multiplier.powi(exponent)).round();
        // Clamp in f64 space so the cast back to integer nanos cannot overflow.
        if !nanos.is_finite() || nanos >= ceiling.as_nanos() as f64 {
            return ceiling;
        }
        Duration::from_nanos(nanos as u64).max(self.base).min(ceiling)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ChainBackoff {
    delays: Vec<Duration>,
}

impl BackoffStrategy for ChainBackoff {
    fn delay(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let idx = (attempt - 1).min(self.delays.len().saturating_sub(1));
        self.delays.get(idx).copied().unwrap_or(Duration::ZERO).min(MAX_BACKOFF)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum BackoffKind {
    Constant(Duration),
    Exponential(ExponentialBackoff),
    Chain(ChainBackoff),
}

/// Backoff schedule used by [`RetryPolicy`](crate::RetryPolicy).
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    kind: BackoffKind,
}

impl Backoff {
    /// Same delay before every retry.
    pub fn constant(delay: Duration) -> Self {
        Self { kind: BackoffKind::Constant(delay) }
    }

    /// Doubling delay starting at `base`, uncapped until `with_max` is applied.
    pub fn exponential(base: Duration) -> Self {
        Self {
            kind: BackoffKind::Exponential(ExponentialBackoff { base, multiplier: 2.0, max: None }),
        }
    }

    /// Fixed per-retry schedule; the last entry repeats for later retries.
    ///
    /// `chain([1s, 1s, 3s, 3s, 6s])` waits 1s, 1s, 3s, 3s, then 6s from then on.
    pub fn chain<I>(delays: I) -> Self
    where
        I: IntoIterator<Item = Duration>,
    {
        Self { kind: BackoffKind::Chain(ChainBackoff { delays: delays.into_iter().collect() }) }
    }

    /// Change the growth factor of an exponential schedule. Must be finite and `>= 1`.
    pub fn with_multiplier(mut self, multiplier: f64) -> Result<Self, BackoffError> {
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(BackoffError::InvalidMultiplier(multiplier));
        }
        match &mut self.kind {
            BackoffKind::Exponential(exp) => {
                exp.multiplier = multiplier;
                Ok(self)
            }
            _ => Ok(self),
        }
    }

    /// Set a maximum delay for an exponential schedule.
    /// Returns an error for other schedules, if `max < base`, or if `max` is zero with a
    /// non-zero base. A zero base with a zero max retries immediately.
    pub fn with_max(mut self, max: Duration) -> Result<Self, BackoffError> {
        match &mut self.kind {
            BackoffKind::Exponential(ExponentialBackoff { base, max: existing, .. }) => {
                if max.is_zero() && !base.is_zero() {
                    return Err(BackoffError::MaxMustBePositive);
                }
                if max < *base {
                    return Err(BackoffError::MaxLessThanBase { base: *base, max });
                }
                *existing = Some(max);
                Ok(self)
            }
            _ => Err(BackoffError::MaxNotSupported),
        }
    }

    /// Calculate the scheduled delay for a failed attempt (1-based; 0 = initial call).
    pub fn delay(&self, attempt: usize) -> Duration {
        match &self.kind {
            _ if attempt == 0 => Duration::ZERO,
            BackoffKind::Constant(d) => (*d).min(MAX_BACKOFF),
            BackoffKind::Exponential(e) => e.delay(attempt),
            BackoffKind::Chain(c) => c.delay(attempt),
        }
    }
}

impl Default for Backoff {
    /// 4s base, doubling, capped at 10s.
    fn default() -> Self {
        Self {
            kind: BackoffKind::Exponential(ExponentialBackoff {
                base: Duration::from_secs(4),
                multiplier: 2.0,
                max: Some(Duration::from_secs(10)),
            }),
        }
    }
}

impl BackoffStrategy for Backoff {
    fn delay(&self, attempt: usize) -> Duration {
        Backoff::delay(self, attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn default_schedule_is_4_8_10() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(1), secs(4));
        assert_eq!(backoff.delay(2), secs(8));
        assert_eq!(backoff.delay(3), secs(10));
        assert_eq!(backoff.delay(4), secs(10));
    }

    #[test]
    fn exponential_is_monotonic_until_capped() {
        let backoff = Backoff::exponential(Duration::from_millis(100))
            .with_multiplier(3.0)
            .unwrap()
            .with_max(secs(5))
            .unwrap();
        let mut prev = Duration::ZERO;
        for attempt in 1..40 {
            let d = backoff.delay(attempt);
            assert!(d >= prev, "delay({attempt}) = {d:?} < {prev:?}");
            assert!(d <= secs(5));
            prev = d;
        }
        assert_eq!(backoff.delay(39), secs(5));
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(300));
    }

    #[test]
    fn multiplier_of_one_is_flat() {
        let backoff = Backoff::exponential(secs(2)).with_multiplier(1.0).unwrap();
        assert_eq!(backoff.delay(1), secs(2));
        assert_eq!(backoff.delay(50), secs(2));
    }

    #[test]
    fn zero_attempt_has_no_delay() {
        assert_eq!(Backoff::constant(secs(1)).delay(0), Duration::ZERO);
        assert_eq!(Backoff::default().delay(0), Duration::ZERO);
        assert_eq!(Backoff::chain([secs(1)]).delay(0), Duration::ZERO);
    }

    #[test]
    fn huge_attempt_saturates_without_panicking() {
        let uncapped = Backoff::exponential(secs(1));
        assert_eq!(uncapped.delay(usize::MAX), MAX_BACKOFF);
        let capped = Backoff::default();
        assert_eq!(capped.delay(1_000_000_000), secs(10));
    }

    #[test]
    fn chain_repeats_last_entry() {
        let backoff = Backoff::chain([secs(1), secs(1), secs(3), secs(3), secs(6)]);
        let waits: Vec<_> = (1..=7).map(|a| backoff.delay(a)).collect();
        assert_eq!(waits, vec![secs(1), secs(1), secs(3), secs(3), secs(6), secs(6), secs(6)]);
        assert_eq!(Backoff::chain(Vec::new()).delay(3), Duration::ZERO);
    }

    #[test]
    fn hint_overrides_once() {
        let backoff = Backoff::default();
        assert_eq!(backoff.next_delay(1, Some(secs(3))), secs(3));
        // Without a hint the schedule resumes at the caller's own index.
        assert_eq!(backoff.next_delay(2, None), secs(8));
    }

    #[test]
    fn hint_may_exceed_max_delay() {
        let backoff = Backoff::default();
        assert_eq!(backoff.next_delay(1, Some(secs(30))), secs(30));
        assert_eq!(backoff.next_delay(1, Some(Duration::ZERO)), Duration::ZERO);
    }

    #[test]
    fn absurd_hint_is_ignored() {
        let backoff = Backoff::default();
        assert_eq!(backoff.next_delay(2, Some(MAX_HINT + secs(1))), secs(8));
    }

    #[test]
    fn zero_base_and_zero_max_retry_immediately() {
        let backoff = Backoff::exponential(Duration::ZERO).with_max(Duration::ZERO).unwrap();
        assert_eq!(backoff.delay(1), Duration::ZERO);
        assert_eq!(backoff.delay(5), Duration::ZERO);
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        assert_eq!(
            Backoff::exponential(secs(10)).with_max(secs(5)).unwrap_err(),
            BackoffError::MaxLessThanBase { base: secs(10), max: secs(5) }
        );
        assert_eq!(
            Backoff::exponential(secs(1)).with_max(Duration::ZERO).unwrap_err(),
            BackoffError::MaxMustBePositive
        );
        assert_eq!(
            Backoff::constant(secs(1)).with_max(secs(5)).unwrap_err(),
            BackoffError::MaxNotSupported
        );
        assert!(matches!(
            Backoff::exponential(secs(1)).with_multiplier(0.5),
            Err(BackoffError::InvalidMultiplier(_))
        ));
        assert!(matches!(
            Backoff::exponential(secs(1)).with_multiplier(f64::NAN),
            Err(BackoffError::InvalidMultiplier(_))
        ));
    }
}
