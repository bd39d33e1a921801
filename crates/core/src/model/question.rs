use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{QuestionId, UserId};
use crate::model::rating::{Rating, RatingSummary, average_rating};

/// Minimum number of options a question must offer.
pub const MIN_OPTIONS: usize = 2;

/// A question is hidden once its average drops to this value or below...
pub const HIDDEN_MAX_AVERAGE: f64 = 3.0;

/// ...and at least this many ratings back that average up.
pub const HIDDEN_MIN_RATINGS: usize = 3;

/// Returns true when a question with this rating profile is suppressed from practice.
#[must_use]
pub fn is_hidden(avg_rating: f64, rating_count: usize) -> bool {
    avg_rating <= HIDDEN_MAX_AVERAGE && rating_count >= HIDDEN_MIN_RATINGS
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("a question needs at least {MIN_OPTIONS} options, got {0}")]
    TooFewOptions(usize),

    #[error("option {0} is empty")]
    EmptyOption(usize),

    #[error("correct option index {index} is out of range for {len} options")]
    CorrectIndexOutOfRange { index: usize, len: usize },
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

/// Unvalidated question as typed by a learner or returned by the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub text: String,
    pub options: Vec<String>,
    pub correct_option_index: usize,
}

impl QuestionDraft {
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        options: Vec<String>,
        correct_option_index: usize,
    ) -> Self {
        Self {
            text: text.into(),
            options,
            correct_option_index,
        }
    }

    /// Check the structural invariants without consuming the draft.
    ///
    /// # Errors
    ///
    /// Returns the first `QuestionError` found.
    pub fn check(&self) -> Result<(), QuestionError> {
        if self.text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if self.options.len() < MIN_OPTIONS {
            return Err(QuestionError::TooFewOptions(self.options.len()));
        }
        if let Some(index) = self.options.iter().position(|o| o.trim().is_empty()) {
            return Err(QuestionError::EmptyOption(index));
        }
        if self.correct_option_index >= self.options.len() {
            return Err(QuestionError::CorrectIndexOutOfRange {
                index: self.correct_option_index,
                len: self.options.len(),
            });
        }
        Ok(())
    }

    /// Validate and normalize the draft into a question ready to be stored.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the text is blank, there are fewer than two
    /// options, an option is blank, or the correct index is out of range.
    pub fn validate(
        self,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<NewQuestion, QuestionError> {
        self.check()?;
        Ok(NewQuestion {
            text: self.text.trim().to_string(),
            options: self
                .options
                .into_iter()
                .map(|o| o.trim().to_string())
                .collect(),
            correct_option_index: self.correct_option_index,
            created_by,
            created_at: now,
        })
    }
}

/// A validated question that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
    pub text: String,
    pub options: Vec<String>,
    pub correct_option_index: usize,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl NewQuestion {
    /// Attach a store-assigned id; statistics start empty.
    #[must_use]
    pub fn assign_id(self, id: QuestionId) -> Question {
        Question {
            id,
            text: self.text,
            options: self.options,
            correct_option_index: self.correct_option_index,
            created_at: self.created_at,
            created_by: self.created_by,
            times_answered: 0,
            ratings: Vec::new(),
            avg_rating: average_rating(&[]),
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A stored multiple-choice question together with its rollup statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    id: QuestionId,
    text: String,
    options: Vec<String>,
    correct_option_index: usize,
    created_at: DateTime<Utc>,
    created_by: UserId,
    times_answered: u32,
    ratings: Vec<Rating>,
    avg_rating: f64,
}

impl Question {
    /// Rehydrate a question from storage.
    ///
    /// The average is recomputed from `ratings` so a stale persisted value can
    /// never leak out.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the persisted options or index are malformed.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: QuestionId,
        text: String,
        options: Vec<String>,
        correct_option_index: usize,
        created_at: DateTime<Utc>,
        created_by: UserId,
        times_answered: u32,
        ratings: Vec<Rating>,
    ) -> Result<Self, QuestionError> {
        if options.len() < MIN_OPTIONS {
            return Err(QuestionError::TooFewOptions(options.len()));
        }
        if correct_option_index >= options.len() {
            return Err(QuestionError::CorrectIndexOutOfRange {
                index: correct_option_index,
                len: options.len(),
            });
        }
        let avg_rating = average_rating(&ratings);
        Ok(Self {
            id,
            text,
            options,
            correct_option_index,
            created_at,
            created_by,
            times_answered,
            ratings,
            avg_rating,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_option_index(&self) -> usize {
        self.correct_option_index
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn created_by(&self) -> &UserId {
        &self.created_by
    }

    #[must_use]
    pub fn times_answered(&self) -> u32 {
        self.times_answered
    }

    #[must_use]
    pub fn ratings(&self) -> &[Rating] {
        &self.ratings
    }

    #[must_use]
    pub fn avg_rating(&self) -> f64 {
        self.avg_rating
    }

    /// True when peers have rated this question low often enough to suppress it.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        is_hidden(self.avg_rating, self.ratings.len())
    }

    /// Whether `chosen_option_index` is the correct answer.
    #[must_use]
    pub fn grade(&self, chosen_option_index: usize) -> bool {
        chosen_option_index == self.correct_option_index
    }

    /// Append a rating and recompute the rolling average.
    pub fn push_rating(&mut self, rating: Rating) -> RatingSummary {
        self.ratings.push(rating);
        self.avg_rating = average_rating(&self.ratings);
        RatingSummary::of(&self.ratings)
    }

    /// Swap in a whole new ratings list, as produced by a store transaction.
    pub fn replace_ratings(&mut self, ratings: Vec<Rating>) -> RatingSummary {
        self.ratings = ratings;
        self.avg_rating = average_rating(&self.ratings);
        RatingSummary::of(&self.ratings)
    }

    pub fn record_answered(&mut self) {
        self.times_answered = self.times_answered.saturating_add(1);
    }

    /// Clear answer count and ratings, returning to the unrated prior.
    pub fn reset_statistics(&mut self) {
        self.times_answered = 0;
        self.ratings.clear();
        self.avg_rating = average_rating(&self.ratings);
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn creator() -> UserId {
        UserId::new("author").unwrap()
    }

    fn options(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    fn sample() -> Question {
        QuestionDraft::new("Pick C", options(&["A", "B", "C", "D"]), 2)
            .validate(creator(), fixed_now())
            .unwrap()
            .assign_id(QuestionId::new(1))
    }

    #[test]
    fn draft_requires_two_options() {
        let err = QuestionDraft::new("Q", options(&["only"]), 0)
            .validate(creator(), fixed_now())
            .unwrap_err();
        assert_eq!(err, QuestionError::TooFewOptions(1));
    }

    #[test]
    fn draft_rejects_out_of_range_index() {
        let err = QuestionDraft::new("Q", options(&["A", "B"]), 2)
            .validate(creator(), fixed_now())
            .unwrap_err();
        assert_eq!(err, QuestionError::CorrectIndexOutOfRange { index: 2, len: 2 });
    }

    #[test]
    fn draft_rejects_blank_text_and_options() {
        let err = QuestionDraft::new("   ", options(&["A", "B"]), 0)
            .check()
            .unwrap_err();
        assert_eq!(err, QuestionError::EmptyText);

        let err = QuestionDraft::new("Q", options(&["A", " "]), 0)
            .check()
            .unwrap_err();
        assert_eq!(err, QuestionError::EmptyOption(1));
    }

    #[test]
    fn validated_question_starts_unrated() {
        let q = sample();
        assert_eq!(q.times_answered(), 0);
        assert!(q.ratings().is_empty());
        assert_eq!(q.avg_rating(), 5.0);
        assert!(!q.is_hidden());
    }

    #[test]
    fn validation_trims_text() {
        let q = QuestionDraft::new("  Why? ", options(&[" yes", "no "]), 1)
            .validate(creator(), fixed_now())
            .unwrap();
        assert_eq!(q.text, "Why?");
        assert_eq!(q.options, options(&["yes", "no"]));
    }

    #[test]
    fn grade_compares_with_correct_index() {
        let q = sample();
        assert!(q.grade(2));
        assert!(!q.grade(1));
    }

    #[test]
    fn ratings_update_average_and_visibility() {
        let mut q = sample();
        for v in [5, 5, 4] {
            q.push_rating(Rating::new(v).unwrap());
        }
        assert_eq!(q.avg_rating(), 4.7);

        let summary = q.push_rating(Rating::new(2).unwrap());
        assert_eq!(summary.count, 4);
        assert_eq!(summary.average, 4.0);
        assert!(!q.is_hidden());
    }

    #[test]
    fn three_low_ratings_hide_question() {
        let mut q = sample();
        q.push_rating(Rating::new(2).unwrap());
        q.push_rating(Rating::new(2).unwrap());
        assert!(!q.is_hidden(), "two ratings are not enough evidence");
        q.push_rating(Rating::new(2).unwrap());
        assert_eq!(q.avg_rating(), 2.0);
        assert!(q.is_hidden());
    }

    #[test]
    fn average_of_exactly_three_is_hidden() {
        assert!(is_hidden(3.0, 3));
        assert!(!is_hidden(3.1, 3));
        assert!(!is_hidden(1.0, 2));
    }

    #[test]
    fn reset_returns_to_prior() {
        let mut q = sample();
        q.record_answered();
        q.push_rating(Rating::new(1).unwrap());
        q.reset_statistics();
        assert_eq!(q.times_answered(), 0);
        assert!(q.ratings().is_empty());
        assert_eq!(q.avg_rating(), 5.0);
    }

    #[test]
    fn from_persisted_recomputes_average() {
        let ratings = vec![Rating::new(1).unwrap(), Rating::new(2).unwrap()];
        let q = Question::from_persisted(
            QuestionId::new(9),
            "Q".into(),
            options(&["A", "B"]),
            0,
            fixed_now(),
            creator(),
            3,
            ratings,
        )
        .unwrap();
        assert_eq!(q.avg_rating(), 1.5);
        assert_eq!(q.times_answered(), 3);
    }
}
