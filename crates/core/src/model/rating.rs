use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors that can occur when building a rating.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RatingError {
    #[error("rating must be between 1 and 5, got {0}")]
    OutOfRange(i64),
}

//
// ─── RATING ───────────────────────────────────────────────────────────────────
//

/// A peer quality rating on the 1-5 star scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Creates a rating from a star count.
    ///
    /// # Errors
    ///
    /// Returns `RatingError::OutOfRange` if the value is outside 1-5.
    pub fn new(value: i64) -> Result<Self, RatingError> {
        match u8::try_from(value) {
            Ok(v) if (Self::MIN..=Self::MAX).contains(&v) => Ok(Self(v)),
            _ => Err(RatingError::OutOfRange(value)),
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = RatingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(i64::from(value))
    }
}

impl From<Rating> for u8 {
    fn from(value: Rating) -> Self {
        value.0
    }
}

//
// ─── AVERAGE ──────────────────────────────────────────────────────────────────
//

/// Average shown for a question nobody has rated yet.
///
/// Fresh questions start at the top of the scale.
pub const UNRATED_AVERAGE: f64 = 5.0;

/// Mean of `ratings` rounded half-up to one decimal place.
///
/// Works in integer tenths so that e.g. `[5, 5, 4]` gives exactly `4.7`
/// and `[2, 2, 2]` gives exactly `2.0`. Returns [`UNRATED_AVERAGE`] for an
/// empty slice.
#[must_use]
pub fn average_rating(ratings: &[Rating]) -> f64 {
    if ratings.is_empty() {
        return UNRATED_AVERAGE;
    }
    let sum: u64 = ratings.iter().map(|r| u64::from(r.value())).sum();
    let len = ratings.len() as u64;
    // round(10 * sum / len) with halves going up
    let tenths = (20 * sum + len) / (2 * len);

    #[allow(clippy::cast_precision_loss)]
    let tenths_f = tenths as f64;

    tenths_f / 10.0
}

/// Count and average of a question's ratings after an update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub count: usize,
    pub average: f64,
}

impl RatingSummary {
    #[must_use]
    pub fn of(ratings: &[Rating]) -> Self {
        Self {
            count: ratings.len(),
            average: average_rating(ratings),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
