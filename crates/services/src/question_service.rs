use std::sync::Arc;

use quiz_core::model::{NewQuestion, Question, QuestionDraft, QuestionId, UserId};
use storage::repository::{QuestionRepository, StorageError};

use crate::Clock;
use crate::error::QuestionServiceError;
use crate::extraction::QuestionExtractor;

/// Authoring and listing of questions.
#[derive(Clone)]
pub struct QuestionService {
    clock: Clock,
    questions: Arc<dyn QuestionRepository>,
}

impl QuestionService {
    #[must_use]
    pub fn new(clock: Clock, questions: Arc<dyn QuestionRepository>) -> Self {
        Self { clock, questions }
    }

    /// Validate and store a single question, crediting its author.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::InvalidQuestion` before any write if the
    /// draft is malformed, and `QuestionServiceError::Storage` if the author
    /// has no profile or the write fails.
    pub async fn create_question(
        &self,
        draft: QuestionDraft,
        creator: &UserId,
    ) -> Result<QuestionId, QuestionServiceError> {
        let question = draft.validate(creator.clone(), self.clock.now())?;
        let ids = self.questions.insert_questions(&[question]).await?;
        let id = ids
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::Unavailable("no id assigned".into()))?;
        tracing::info!(question_id = %id, creator = %creator, "question created");
        Ok(id)
    }

    /// Store a batch of questions all-or-nothing.
    ///
    /// Every draft is validated first; one bad draft rejects the batch.
    /// Returns the number of questions written.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::InvalidDraft` naming the first bad draft,
    /// or `QuestionServiceError::Storage` if the write fails.
    pub async fn create_batch(
        &self,
        drafts: Vec<QuestionDraft>,
        creator: &UserId,
    ) -> Result<usize, QuestionServiceError> {
        if drafts.is_empty() {
            return Ok(0);
        }

        let now = self.clock.now();
        let validated = drafts
            .into_iter()
            .enumerate()
            .map(|(index, draft)| {
                draft
                    .validate(creator.clone(), now)
                    .map_err(|source| QuestionServiceError::InvalidDraft { index, source })
            })
            .collect::<Result<Vec<NewQuestion>, _>>()?;

        let ids = self.questions.insert_questions(&validated).await?;
        tracing::info!(count = ids.len(), creator = %creator, "question batch created");
        Ok(ids.len())
    }

    /// Remove a question. Deleting an unknown id is not an error.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::Storage` if the delete fails.
    pub async fn delete_question(&self, id: QuestionId) -> Result<(), QuestionServiceError> {
        if self.questions.delete_question(id).await? {
            tracing::info!(question_id = %id, "question deleted");
        } else {
            tracing::debug!(question_id = %id, "delete of missing question ignored");
        }
        Ok(())
    }

    /// Questions eligible for practice.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::Storage` if the read fails.
    pub async fn list_visible(&self) -> Result<Vec<Question>, QuestionServiceError> {
        Ok(self.questions.list_visible_questions().await?)
    }

    /// Every question, hidden ones included.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::Storage` if the read fails.
    pub async fn list_all(&self) -> Result<Vec<Question>, QuestionServiceError> {
        Ok(self.questions.list_questions().await?)
    }

    /// # Errors
    ///
    /// Returns `QuestionServiceError::Storage` if the count cannot be read.
    pub async fn count(&self) -> Result<u64, QuestionServiceError> {
        Ok(self.questions.count_questions().await?)
    }

    /// Extract questions from free text and store the well-formed ones.
    ///
    /// Drafts that fail validation are logged and dropped. Returns the number
    /// of questions written.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::Extraction` if the extractor fails and
    /// `QuestionServiceError::Storage` if the batch write fails.
    pub async fn import_from_text(
        &self,
        extractor: &dyn QuestionExtractor,
        text: &str,
        creator: &UserId,
    ) -> Result<usize, QuestionServiceError> {
        let drafts = extractor.extract(text).await?;
        let extracted = drafts.len();

        let valid: Vec<QuestionDraft> = drafts
            .into_iter()
            .enumerate()
            .filter_map(|(index, draft)| match draft.check() {
                Ok(()) => Some(draft),
                Err(err) => {
                    tracing::warn!(index, error = %err, "dropping invalid extracted question");
                    None
                }
            })
            .collect();

        if valid.is_empty() {
            tracing::info!(extracted, "no usable questions extracted");
            return Ok(0);
        }
        self.create_batch(valid, creator).await
    }
}
