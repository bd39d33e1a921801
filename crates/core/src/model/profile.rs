use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("display name cannot be empty")]
    EmptyDisplayName,

    #[error("total correct ({correct}) exceeds total answered ({answered})")]
    CorrectExceedsAnswered { correct: u32, answered: u32 },
}

/// Per-learner participation counters, created on first sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    uid: UserId,
    display_name: String,
    email: String,
    created_at: DateTime<Utc>,
    total_answered: u32,
    total_correct: u32,
    total_questions_added: u32,
}

impl UserProfile {
    /// Create a fresh profile with zeroed counters.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::EmptyDisplayName` if the name is blank.
    pub fn new(
        uid: UserId,
        display_name: impl Into<String>,
        email: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ProfileError> {
        let display_name = display_name.into().trim().to_string();
        if display_name.is_empty() {
            return Err(ProfileError::EmptyDisplayName);
        }
        Ok(Self {
            uid,
            display_name,
            email: email.into().trim().to_string(),
            created_at,
            total_answered: 0,
            total_correct: 0,
            total_questions_added: 0,
        })
    }

    /// Rehydrate a profile from storage.
    ///
    /// Display names are not re-validated here; legacy rows may carry an empty one.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::CorrectExceedsAnswered` if the counters are inconsistent.
    pub fn from_persisted(
        uid: UserId,
        display_name: String,
        email: String,
        created_at: DateTime<Utc>,
        total_answered: u32,
        total_correct: u32,
        total_questions_added: u32,
    ) -> Result<Self, ProfileError> {
        if total_correct > total_answered {
            return Err(ProfileError::CorrectExceedsAnswered {
                correct: total_correct,
                answered: total_answered,
            });
        }
        Ok(Self {
            uid,
            display_name,
            email,
            created_at,
            total_answered,
            total_correct,
            total_questions_added,
        })
    }

    #[must_use]
    pub fn uid(&self) -> &UserId {
        &self.uid
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn total_answered(&self) -> u32 {
        self.total_answered
    }

    #[must_use]
    pub fn total_correct(&self) -> u32 {
        self.total_correct
    }

    #[must_use]
    pub fn total_questions_added(&self) -> u32 {
        self.total_questions_added
    }

    pub fn record_answer(&mut self, is_correct: bool) {
        self.total_answered = self.total_answered.saturating_add(1);
        if is_correct {
            self.total_correct = self.total_correct.saturating_add(1);
        }
    }

    pub fn add_questions(&mut self, count: u32) {
        self.total_questions_added = self.total_questions_added.saturating_add(count);
    }

    /// Zero the answer counters. Authored-question count is kept.
    pub fn reset_statistics(&mut self) {
        self.total_answered = 0;
        self.total_correct = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn uid() -> UserId {
        UserId::new("u1").unwrap()
    }

    #[test]
    fn new_profile_has_zero_counters() {
        let p = UserProfile::new(uid(), " Dana ", "dana@example.com", fixed_now()).unwrap();
        assert_eq!(p.display_name(), "Dana");
        assert_eq!(p.total_answered(), 0);
        assert_eq!(p.total_correct(), 0);
        assert_eq!(p.total_questions_added(), 0);
    }

    #[test]
    fn blank_display_name_is_rejected() {
        let err = UserProfile::new(uid(), "  ", "", fixed_now()).unwrap_err();
        assert_eq!(err, ProfileError::EmptyDisplayName);
    }

    #[test]
    fn record_answer_counts_correct_only_when_correct() {
        let mut p = UserProfile::new(uid(), "Dana", "", fixed_now()).unwrap();
        p.record_answer(false);
        p.record_answer(true);
        assert_eq!(p.total_answered(), 2);
        assert_eq!(p.total_correct(), 1);
    }

    #[test]
    fn reset_keeps_authored_count() {
        let mut p = UserProfile::new(uid(), "Dana", "", fixed_now()).unwrap();
        p.record_answer(true);
        p.add_questions(4);
        p.reset_statistics();
        assert_eq!(p.total_answered(), 0);
        assert_eq!(p.total_correct(), 0);
        assert_eq!(p.total_questions_added(), 4);
    }

    #[test]
    fn persisted_counters_must_be_consistent() {
        let err = UserProfile::from_persisted(uid(), "x".into(), String::new(), fixed_now(), 1, 2, 0)
            .unwrap_err();
        assert!(matches!(err, ProfileError::CorrectExceedsAnswered { .. }));
    }
}
