use std::env;
use std::str::FromStr;
use std::time::Duration;

use quiz_core::selection::SelectionPolicy;

/// Tunables shared by the engine services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Questions per practice batch.
    pub batch_size: usize,
    pub selection_policy: SelectionPolicy,
    /// Attempts at a rating transaction before giving up with a conflict.
    pub rating_attempts: u32,
    /// Attempts at a fire-and-forget answer commit.
    pub answer_attempts: u32,
    pub answer_retry_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            selection_policy: SelectionPolicy::RatingDescending,
            rating_attempts: 3,
            answer_attempts: 3,
            answer_retry_delay: Duration::from_millis(250),
        }
    }
}

impl EngineConfig {
    /// Read overrides from `QUIZ_*` environment variables.
    ///
    /// Missing or unparsable values keep their defaults. Attempt counts are
    /// clamped to at least one.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let batch_size = parse_or(read("QUIZ_BATCH_SIZE"), defaults.batch_size, "QUIZ_BATCH_SIZE");
        let selection_policy = parse_or(
            read("QUIZ_SELECTION"),
            defaults.selection_policy,
            "QUIZ_SELECTION",
        );
        let rating_attempts = parse_or(
            read("QUIZ_RATING_ATTEMPTS"),
            defaults.rating_attempts,
            "QUIZ_RATING_ATTEMPTS",
        );
        let answer_attempts = parse_or(
            read("QUIZ_ANSWER_ATTEMPTS"),
            defaults.answer_attempts,
            "QUIZ_ANSWER_ATTEMPTS",
        );
        let retry_ms = parse_or(
            read("QUIZ_ANSWER_RETRY_MS"),
            u64::try_from(defaults.answer_retry_delay.as_millis()).unwrap_or(250),
            "QUIZ_ANSWER_RETRY_MS",
        );

        Self {
            batch_size,
            selection_policy,
            rating_attempts: rating_attempts.max(1),
            answer_attempts: answer_attempts.max(1),
            answer_retry_delay: Duration::from_millis(retry_ms),
        }
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, default: T, key: &str) -> T {
    match raw {
        None => default,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %value, "ignoring invalid configuration value");
            default
        }),
    }
}
