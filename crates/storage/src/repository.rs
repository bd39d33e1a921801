use async_trait::async_trait;
use quiz_core::model::{
    AnswerId, AnswerRecord, NewQuestion, Question, QuestionId, Rating, RatingSummary, UserId,
    UserProfile,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::watch;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// A concurrent writer got there first; the operation may be retried.
    #[error("conflict")]
    Conflict,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// An answer attempt as persisted under its user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAnswer {
    pub id: AnswerId,
    pub user_id: UserId,
    pub answer: AnswerRecord,
}

/// What a statistics reset touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub users: u64,
    pub answers_deleted: u64,
    pub questions: u64,
}

/// Transform applied to a question's current ratings inside a store transaction.
pub type RatingUpdate<'a> = &'a (dyn Fn(&[Rating]) -> Vec<Rating> + Send + Sync);

//
// ─── CHANGE FEED ───────────────────────────────────────────────────────────────
//

/// Revision counter for the users collection.
///
/// Bumped after every commit that changes a user's counters. Receivers only
/// ever see the latest revision, so bursts of writes coalesce.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: Arc<watch::Sender<u64>>,
}

impl ChangeFeed {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn notify(&self) {
        self.tx.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Repository contract for question documents.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Every stored question, hidden ones included, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the read fails; no partial list is returned.
    async fn list_questions(&self) -> Result<Vec<Question>, StorageError>;

    /// Questions not suppressed by the low-rating rule, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the read fails; no partial list is returned.
    async fn list_visible_questions(&self) -> Result<Vec<Question>, StorageError>;

    /// Fetch a question by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures. A missing question is `Ok(None)`.
    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError>;

    /// Insert questions in one atomic write and credit each author's
    /// `total_questions_added`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if an author has no profile; nothing is written.
    async fn insert_questions(
        &self,
        questions: &[NewQuestion],
    ) -> Result<Vec<QuestionId>, StorageError>;

    /// Delete a question. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete cannot be issued.
    async fn delete_question(&self, id: QuestionId) -> Result<bool, StorageError>;

    /// Number of stored questions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the count cannot be read.
    async fn count_questions(&self) -> Result<u64, StorageError>;
}

/// Repository contract for user profiles.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on read failures. A missing profile is `Ok(None)`.
    async fn get_profile(&self, uid: &UserId) -> Result<Option<UserProfile>, StorageError>;

    /// Insert a profile unless one already exists for its uid.
    ///
    /// Returns `true` when the profile was created.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn insert_profile(&self, profile: &UserProfile) -> Result<bool, StorageError>;

    /// All profiles, ordered by uid.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the read fails.
    async fn list_profiles(&self) -> Result<Vec<UserProfile>, StorageError>;

    /// Live revision of the users collection.
    fn watch_profiles(&self) -> watch::Receiver<u64>;
}

/// Repository contract for the per-user answer log.
#[async_trait]
pub trait AnswerRepository: Send + Sync {
    /// A user's attempts in submission order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the read fails.
    async fn answers_for_user(&self, uid: &UserId) -> Result<Vec<StoredAnswer>, StorageError>;

    /// Distinct question ids the user has answered at least once.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the read fails.
    async fn answered_question_ids(
        &self,
        uid: &UserId,
    ) -> Result<HashSet<QuestionId>, StorageError>;

    /// Append the attempt, bump the question's `times_answered` and the user's
    /// totals as one atomic commit.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the question or user is missing and
    /// `StorageError::Unavailable` if the commit fails. Either way nothing is applied.
    async fn commit_answer(
        &self,
        uid: &UserId,
        answer: &AnswerRecord,
    ) -> Result<AnswerId, StorageError>;
}

/// Transactional read-modify-write over a question's ratings.
#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// Replace the ratings of `id` with `update(current)` and store the
    /// recomputed average, all inside one transaction.
    ///
    /// Returns `Ok(None)` if the question does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a concurrent writer prevented the
    /// transaction from committing; the caller may retry.
    async fn update_ratings(
        &self,
        id: QuestionId,
        update: RatingUpdate<'_>,
    ) -> Result<Option<RatingSummary>, StorageError>;
}

/// Bulk maintenance over all collections.
#[async_trait]
pub trait StatisticsMaintenance: Send + Sync {
    /// Zero user counters, delete all answers and clear question statistics in
    /// one atomic operation.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the operation fails; nothing is applied.
    async fn reset_statistics(&self) -> Result<ResetReport, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    questions: BTreeMap<QuestionId, Question>,
    profiles: BTreeMap<UserId, UserProfile>,
    answers: Vec<StoredAnswer>,
    next_question_id: u64,
    next_answer_id: u64,
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// All collections sit behind one lock, so multi-document writes are atomic.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
    changes: ChangeFeed,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn list_questions(&self) -> Result<Vec<Question>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.questions.values().cloned().collect())
    }

    async fn list_visible_questions(&self) -> Result<Vec<Question>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .questions
            .values()
            .filter(|q| !q.is_hidden())
            .cloned()
            .collect())
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.questions.get(&id).cloned())
    }

    async fn insert_questions(
        &self,
        questions: &[NewQuestion],
    ) -> Result<Vec<QuestionId>, StorageError> {
        let mut guard = self.lock()?;

        let mut per_author: HashMap<&UserId, u32> = HashMap::new();
        for q in questions {
            *per_author.entry(&q.created_by).or_default() += 1;
        }
        if per_author.keys().any(|uid| !guard.profiles.contains_key(*uid)) {
            return Err(StorageError::NotFound);
        }

        for (uid, count) in per_author {
            if let Some(profile) = guard.profiles.get_mut(uid) {
                profile.add_questions(count);
            }
        }

        let mut ids = Vec::with_capacity(questions.len());
        for q in questions {
            guard.next_question_id += 1;
            let id = QuestionId::new(guard.next_question_id);
            guard.questions.insert(id, q.clone().assign_id(id));
            ids.push(id);
        }
        Ok(ids)
    }

    async fn delete_question(&self, id: QuestionId) -> Result<bool, StorageError> {
        let mut guard = self.lock()?;
        Ok(guard.questions.remove(&id).is_some())
    }

    async fn count_questions(&self) -> Result<u64, StorageError> {
        let guard = self.lock()?;
        Ok(guard.questions.len() as u64)
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn get_profile(&self, uid: &UserId) -> Result<Option<UserProfile>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.profiles.get(uid).cloned())
    }

    async fn insert_profile(&self, profile: &UserProfile) -> Result<bool, StorageError> {
        let mut guard = self.lock()?;
        if guard.profiles.contains_key(profile.uid()) {
            return Ok(false);
        }
        guard.profiles.insert(profile.uid().clone(), profile.clone());
        Ok(true)
    }

    async fn list_profiles(&self) -> Result<Vec<UserProfile>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.profiles.values().cloned().collect())
    }

    fn watch_profiles(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

#[async_trait]
impl AnswerRepository for InMemoryRepository {
    async fn answers_for_user(&self, uid: &UserId) -> Result<Vec<StoredAnswer>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .answers
            .iter()
            .filter(|a| &a.user_id == uid)
            .cloned()
            .collect())
    }

    async fn answered_question_ids(
        &self,
        uid: &UserId,
    ) -> Result<HashSet<QuestionId>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .answers
            .iter()
            .filter(|a| &a.user_id == uid)
            .map(|a| a.answer.question_id)
            .collect())
    }

    async fn commit_answer(
        &self,
        uid: &UserId,
        answer: &AnswerRecord,
    ) -> Result<AnswerId, StorageError> {
        let id = {
            let mut guard = self.lock()?;
            let state = &mut *guard;

            // Stage all three writes before touching shared state.
            let mut question = state
                .questions
                .get(&answer.question_id)
                .cloned()
                .ok_or(StorageError::NotFound)?;
            let mut profile = state
                .profiles
                .get(uid)
                .cloned()
                .ok_or(StorageError::NotFound)?;
            question.record_answered();
            profile.record_answer(answer.is_correct);
            let id = AnswerId::new(state.next_answer_id + 1);

            state.next_answer_id += 1;
            state.answers.push(StoredAnswer {
                id,
                user_id: uid.clone(),
                answer: answer.clone(),
            });
            state.questions.insert(question.id(), question);
            state.profiles.insert(uid.clone(), profile);
            id
        };
        self.changes.notify();
        Ok(id)
    }
}

#[async_trait]
impl RatingRepository for InMemoryRepository {
    async fn update_ratings(
        &self,
        id: QuestionId,
        update: RatingUpdate<'_>,
    ) -> Result<Option<RatingSummary>, StorageError> {
        let mut guard = self.lock()?;
        let Some(question) = guard.questions.get_mut(&id) else {
            return Ok(None);
        };

        let next = update(question.ratings());
        let summary = question.replace_ratings(next);
        Ok(Some(summary))
    }
}

#[async_trait]
impl StatisticsMaintenance for InMemoryRepository {
    async fn reset_statistics(&self) -> Result<ResetReport, StorageError> {
        let report = {
            let mut guard = self.lock()?;
            let state = &mut *guard;
            for profile in state.profiles.values_mut() {
                profile.reset_statistics();
            }
            for question in state.questions.values_mut() {
                question.reset_statistics();
            }
            let answers_deleted = state.answers.len() as u64;
            state.answers.clear();
            ResetReport {
                users: state.profiles.len() as u64,
                answers_deleted,
                questions: state.questions.len() as u64,
            }
        };
        self.changes.notify();
        Ok(report)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub answers: Arc<dyn AnswerRepository>,
    pub ratings: Arc<dyn RatingRepository>,
    pub maintenance: Arc<dyn StatisticsMaintenance>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repo(InMemoryRepository::new())
    }

    pub(crate) fn from_repo<R>(repo: R) -> Self
    where
        R: QuestionRepository
            + ProfileRepository
            + AnswerRepository
            + RatingRepository
            + StatisticsMaintenance
            + Clone
            + 'static,
    {
        Self {
            questions: Arc::new(repo.clone()),
            profiles: Arc::new(repo.clone()),
            answers: Arc::new(repo.clone()),
            ratings: Arc::new(repo.clone()),
            maintenance: Arc::new(repo),
        }
    }
}
