//! Declarative retry configuration.
//!
//! `RetryConfig` mirrors the builder knobs in a serde-friendly shape so policies can be loaded
//! from JSON, YAML or TOML alongside the rest of an application's settings. Missing fields fall
//! back to the defaults.
//!
//! ```rust
//! use retryhook::config::RetryConfig;
//!
//! let cfg: RetryConfig = serde_json::from_str(r#"{ "name": "slack", "max_attempts": 6 }"#).unwrap();
//! let policy = cfg.build_policy().unwrap();
//! assert_eq!(policy.max_attempts(), 6);
//! ```

use crate::classify::HttpClassifier;
use crate::error::BuildError;
use crate::retry::{
    RetryPolicy, RetryPolicyBuilder, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY,
    DEFAULT_MULTIPLIER, DEFAULT_POLICY_NAME,
};
use http::header::HeaderName;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry settings for one HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub name: String,
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Statuses worth retrying. `None` keeps the default: 429 or any 5xx.
    pub retryable_statuses: Option<Vec<u16>>,
    /// Header carrying the peer's backoff hint on a 429.
    pub hint_header: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_POLICY_NAME.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
            max_delay_ms: DEFAULT_MAX_DELAY.as_millis() as u64,
            multiplier: DEFAULT_MULTIPLIER,
            retryable_statuses: None,
            hint_header: "Retry-After".to_string(),
        }
    }
}

impl RetryConfig {
    /// HTTP classifier described by this config.
    pub fn classifier(&self) -> Result<HttpClassifier, BuildError> {
        let header = HeaderName::from_bytes(self.hint_header.as_bytes())
            .map_err(|_| BuildError::InvalidHintHeader(self.hint_header.clone()))?;
        let mut classifier = HttpClassifier::new().with_hint_header(header);
        if let Some(statuses) = &self.retryable_statuses {
            let statuses = statuses.clone();
            classifier = classifier
                .retryable_status(move |status: StatusCode| statuses.contains(&status.as_u16()));
        }
        Ok(classifier)
    }

    /// Builder pre-filled from this config, for adding an observer or sleeper before `build`.
    pub fn builder(&self) -> Result<RetryPolicyBuilder<HttpClassifier>, BuildError> {
        Ok(RetryPolicy::builder()
            .name(&self.name)
            .max_attempts(self.max_attempts)
            .base_delay(Duration::from_millis(self.base_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .multiplier(self.multiplier)
            .classifier(self.classifier()?))
    }

    /// Validate and build the policy.
    pub fn build_policy(&self) -> Result<RetryPolicy<HttpClassifier>, BuildError> {
        self.builder()?.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffError;
    use crate::classify::{Classifier, HttpResponse};

    #[test]
    fn defaults_match_builder_defaults() {
        let policy = RetryConfig::default().build_policy().unwrap();
        assert_eq!(policy.name(), "retry");
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.backoff().delay(1), Duration::from_secs(4));
        assert_eq!(policy.backoff().delay(3), Duration::from_secs(10));
        assert_eq!(policy.classifier().hint_header(), "retry-after");
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: RetryConfig =
            serde_json::from_str(r#"{"base_delay_ms": 500, "multiplier": 3.0}"#).unwrap();
        let policy = cfg.build_policy().unwrap();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.backoff().delay(2), Duration::from_millis(1500));
    }

    #[test]
    fn zero_delays_build_an_immediate_policy() {
        let cfg: RetryConfig =
            serde_json::from_str(r#"{"base_delay_ms": 0, "max_delay_ms": 0}"#).unwrap();
        let policy = cfg.build_policy().unwrap();
        assert_eq!(policy.backoff().delay(2), Duration::ZERO);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = serde_json::from_str::<RetryConfig>(r#"{"max_retries": 3}"#).unwrap_err();
        assert!(err.to_string().contains("max_retries"));
    }

    #[test]
    fn retryable_statuses_override_predicate() {
        let cfg = RetryConfig { retryable_statuses: Some(vec![503]), ..RetryConfig::default() };
        let classifier = cfg.classifier().unwrap();
        let unavailable = HttpResponse::new(StatusCode::SERVICE_UNAVAILABLE, "down");
        let internal = HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(classifier.classify(Ok(unavailable)).is_retryable());
        assert!(classifier.classify(Ok(internal)).is_terminal());
    }

    #[test]
    fn invalid_values_fail_to_build() {
        let zero = RetryConfig { max_attempts: 0, ..RetryConfig::default() };
        assert!(matches!(zero.build_policy(), Err(BuildError::InvalidMaxAttempts(0))));

        let header = RetryConfig { hint_header: "not a header".into(), ..RetryConfig::default() };
        assert!(matches!(header.build_policy(), Err(BuildError::InvalidHintHeader(_))));

        let shrinking = RetryConfig { multiplier: 0.5, ..RetryConfig::default() };
        assert!(matches!(
            shrinking.build_policy(),
            Err(BuildError::Backoff(BackoffError::InvalidMultiplier(_)))
        ));
    }
}
