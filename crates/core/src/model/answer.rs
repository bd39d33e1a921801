use chrono::{DateTime, Duration, Utc};

use crate::model::ids::QuestionId;
use crate::model::question::Question;
use crate::model::rating::Rating;

/// One answer attempt by a learner.
///
/// Attempts are append-only; answering the same question twice yields two records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    pub chosen_option_index: usize,
    pub is_correct: bool,
    pub start_time: DateTime<Utc>,
    pub submit_time: DateTime<Utc>,
    pub rating: Option<Rating>,
}

impl AnswerRecord {
    /// Grade `chosen_option_index` against `question` and build the record.
    #[must_use]
    pub fn for_question(
        question: &Question,
        chosen_option_index: usize,
        start_time: DateTime<Utc>,
        submit_time: DateTime<Utc>,
    ) -> Self {
        Self {
            question_id: question.id(),
            chosen_option_index,
            is_correct: question.grade(chosen_option_index),
            start_time,
            submit_time,
            rating: None,
        }
    }

    #[must_use]
    pub fn with_rating(mut self, rating: Rating) -> Self {
        self.rating = Some(rating);
        self
    }

    /// Time spent on the question. Clamped at zero for clock skew.
    #[must_use]
    pub fn time_taken(&self) -> Duration {
        let d = self.submit_time.signed_duration_since(self.start_time);
        if d < Duration::zero() { Duration::zero() } else { d }
    }
}
