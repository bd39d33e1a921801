use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use quiz_core::model::{AnswerId, AnswerRecord, Question, UserId};
use storage::repository::{AnswerRepository, StorageError, StoredAnswer};
use tokio::task::JoinHandle;

use crate::Clock;
use crate::config::EngineConfig;
use crate::error::AnswerServiceError;

/// Records answer attempts together with their rollup counters.
#[derive(Clone)]
pub struct AnswerService {
    clock: Clock,
    answers: Arc<dyn AnswerRepository>,
    attempts: u32,
    retry_delay: Duration,
}

impl AnswerService {
    #[must_use]
    pub fn new(clock: Clock, answers: Arc<dyn AnswerRepository>, config: &EngineConfig) -> Self {
        Self {
            clock,
            answers,
            attempts: config.answer_attempts.max(1),
            retry_delay: config.answer_retry_delay,
        }
    }

    /// Grade a choice against `question`, stamping the submit time now.
    #[must_use]
    pub fn grade(
        &self,
        question: &Question,
        chosen_option_index: usize,
        start_time: DateTime<Utc>,
    ) -> AnswerRecord {
        AnswerRecord::for_question(question, chosen_option_index, start_time, self.clock.now())
    }

    /// Persist an attempt, the question's answer count and the learner's
    /// totals as one atomic commit.
    ///
    /// Submitting the same attempt twice counts twice.
    ///
    /// # Errors
    ///
    /// Returns `AnswerServiceError::Storage` if the question or learner is
    /// missing or the commit fails. No partial effect is left behind.
    pub async fn record_answer(
        &self,
        uid: &UserId,
        answer: &AnswerRecord,
    ) -> Result<AnswerId, AnswerServiceError> {
        let id = self.answers.commit_answer(uid, answer).await?;
        tracing::debug!(
            user = %uid,
            question_id = %answer.question_id,
            answer_id = %id,
            correct = answer.is_correct,
            "answer recorded"
        );
        Ok(id)
    }

    /// Fire-and-forget variant of [`record_answer`](Self::record_answer).
    ///
    /// The commit runs on the tokio runtime and is retried with a fixed delay.
    /// Failures are logged, never returned; the handle yields the answer id
    /// on success and can simply be dropped.
    pub fn submit(&self, uid: UserId, answer: AnswerRecord) -> JoinHandle<Option<AnswerId>> {
        let service = self.clone();
        tokio::spawn(async move { service.commit_with_retry(&uid, &answer).await })
    }

    async fn commit_with_retry(&self, uid: &UserId, answer: &AnswerRecord) -> Option<AnswerId> {
        let mut attempt = 1;
        loop {
            match self.record_answer(uid, answer).await {
                Ok(id) => return Some(id),
                Err(AnswerServiceError::Storage(
                    err @ (StorageError::Conflict | StorageError::Unavailable(_)),
                )) if attempt < self.attempts => {
                    tracing::warn!(
                        user = %uid,
                        question_id = %answer.question_id,
                        attempt,
                        error = %err,
                        "answer commit failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(err) => {
                    tracing::error!(
                        user = %uid,
                        question_id = %answer.question_id,
                        attempt,
                        error = %err,
                        "dropping answer after failed commit"
                    );
                    return None;
                }
            }
        }
    }

    /// A learner's attempts in submission order.
    ///
    /// # Errors
    ///
    /// Returns `AnswerServiceError::Storage` if the history cannot be read.
    pub async fn answer_history(
        &self,
        uid: &UserId,
    ) -> Result<Vec<StoredAnswer>, AnswerServiceError> {
        Ok(self.answers.answers_for_user(uid).await?)
    }
}
