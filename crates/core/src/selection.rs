//! Practice batch planning.
//!
//! Given the visible corpus and the set of questions a learner already
//! answered, decide what they see next. Pure and synchronous; the services
//! layer feeds it from storage.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::model::{Question, QuestionId};

/// How questions are ordered inside the unanswered and answered partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// Best-rated first, ties by ascending id. Deterministic.
    #[default]
    RatingDescending,
    /// Uniform random order within each partition.
    Shuffled,
}

impl SelectionPolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionPolicy::RatingDescending => "rating",
            SelectionPolicy::Shuffled => "shuffle",
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePolicyError(String);

impl fmt::Display for ParsePolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown selection policy: {}", self.0)
    }
}

impl std::error::Error for ParsePolicyError {}

impl FromStr for SelectionPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rating" | "rating-desc" => Ok(Self::RatingDescending),
            "shuffle" | "shuffled" | "random" => Ok(Self::Shuffled),
            other => Err(ParsePolicyError(other.to_string())),
        }
    }
}

/// Higher average first; equal averages fall back to ascending id.
fn by_rating_then_id(a: &Question, b: &Question) -> Ordering {
    b.avg_rating()
        .total_cmp(&a.avg_rating())
        .then_with(|| a.id().cmp(&b.id()))
}

/// Build the next practice batch.
///
/// Unanswered questions always come before answered ones, so a learner only
/// sees repeats once the unseen material would not fill the batch. Hidden
/// questions are dropped even if the caller passed them in. The result holds
/// at most `batch_size` questions and is empty only when nothing visible is left.
#[must_use]
pub fn plan_batch<R: Rng + ?Sized>(
    questions: Vec<Question>,
    answered: &HashSet<QuestionId>,
    batch_size: usize,
    policy: SelectionPolicy,
    rng: &mut R,
) -> Vec<Question> {
    if batch_size == 0 {
        return Vec::new();
    }

    let (mut answered_qs, mut unanswered_qs): (Vec<Question>, Vec<Question>) = questions
        .into_iter()
        .filter(|q| !q.is_hidden())
        .partition(|q| answered.contains(&q.id()));

    match policy {
        SelectionPolicy::RatingDescending => {
            unanswered_qs.sort_by(by_rating_then_id);
            answered_qs.sort_by(by_rating_then_id);
        }
        SelectionPolicy::Shuffled => {
            unanswered_qs.shuffle(rng);
            answered_qs.shuffle(rng);
        }
    }

    unanswered_qs.extend(answered_qs);
    unanswered_qs.truncate(batch_size);
    unanswered_qs
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
