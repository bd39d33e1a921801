use std::sync::{Arc, Mutex, PoisonError};

use quiz_core::model::{Question, UserId};
use quiz_core::selection::{SelectionPolicy, plan_batch};
use rand::SeedableRng;
use rand::rngs::StdRng;
use storage::repository::{AnswerRepository, QuestionRepository};

use crate::config::EngineConfig;
use crate::error::SelectionError;

/// Decides which questions a learner practices next.
#[derive(Clone)]
pub struct SelectionService {
    questions: Arc<dyn QuestionRepository>,
    answers: Arc<dyn AnswerRepository>,
    policy: SelectionPolicy,
    batch_size: usize,
    rng: Arc<Mutex<StdRng>>,
}

impl SelectionService {
    #[must_use]
    pub fn new(
        questions: Arc<dyn QuestionRepository>,
        answers: Arc<dyn AnswerRepository>,
        policy: SelectionPolicy,
    ) -> Self {
        Self {
            questions,
            answers,
            policy,
            batch_size: EngineConfig::default().batch_size,
            rng: Arc::new(Mutex::new(StdRng::from_rng(&mut rand::rng()))),
        }
    }

    /// Pin the shuffle seed so shuffled batches are reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Arc::new(Mutex::new(StdRng::seed_from_u64(seed)));
        self
    }

    /// Size used by [`Self::next_default_batch`].
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// [`Self::next_batch`] with the configured batch size.
    ///
    /// # Errors
    ///
    /// Same as [`Self::next_batch`].
    pub async fn next_default_batch(
        &self,
        uid: &UserId,
    ) -> Result<Vec<Question>, SelectionError> {
        self.next_batch(uid, self.batch_size).await
    }

    /// Next practice batch for `uid`, unanswered questions first.
    ///
    /// An empty result means no visible questions exist.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::Storage` if the corpus or the learner's
    /// history cannot be read.
    pub async fn next_batch(
        &self,
        uid: &UserId,
        batch_size: usize,
    ) -> Result<Vec<Question>, SelectionError> {
        if batch_size == 0 {
            return Ok(Vec::new());
        }

        let visible = self.questions.list_visible_questions().await?;
        if visible.is_empty() {
            tracing::debug!(user = %uid, "no questions available");
            return Ok(Vec::new());
        }
        let answered = self.answers.answered_question_ids(uid).await?;

        let batch = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            plan_batch(visible, &answered, batch_size, self.policy, &mut *rng)
        };
        tracing::debug!(
            user = %uid,
            size = batch.len(),
            answered = answered.len(),
            policy = %self.policy,
            "planned batch"
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{AnswerRecord, QuestionDraft, QuestionId, Rating, UserProfile};
    use quiz_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, ProfileRepository, RatingRepository};

    fn uid(raw: &str) -> UserId {
        UserId::new(raw).unwrap()
    }

    async fn seeded(ratings: &[&[i64]]) -> (InMemoryRepository, Vec<QuestionId>) {
        let repo = InMemoryRepository::new();
        for name in ["author", "learner"] {
            let profile = UserProfile::new(uid(name), name, "", fixed_now()).unwrap();
            repo.insert_profile(&profile).await.unwrap();
        }
        let drafts: Vec<_> = (0..ratings.len())
            .map(|i| {
                QuestionDraft::new(format!("Q{i}"), vec!["A".into(), "B".into()], 0)
                    .validate(uid("author"), fixed_now())
                    .unwrap()
            })
            .collect();
        let ids = repo.insert_questions(&drafts).await.unwrap();
        for (id, values) in ids.iter().zip(ratings) {
            let add: Vec<Rating> = values.iter().map(|v| Rating::new(*v).unwrap()).collect();
            let update = move |current: &[Rating]| {
                let mut next = current.to_vec();
                next.extend(add.iter().copied());
                next
            };
            repo.update_ratings(*id, &update).await.unwrap();
        }
        (repo, ids)
    }

    fn service(repo: &InMemoryRepository, policy: SelectionPolicy) -> SelectionService {
        SelectionService::new(Arc::new(repo.clone()), Arc::new(repo.clone()), policy)
            .with_seed(11)
    }

    async fn answer(repo: &InMemoryRepository, id: QuestionId) {
        let record = AnswerRecord {
            question_id: id,
            chosen_option_index: 0,
            is_correct: true,
            start_time: fixed_now(),
            submit_time: fixed_now(),
            rating: None,
        };
        repo.commit_answer(&uid("learner"), &record).await.unwrap();
    }

    #[tokio::test]
    async fn unanswered_come_first_in_rating_order() {
        // averages: 5.0 (unrated), 4.0, 4.5, 5.0
        let (repo, ids) = seeded(&[&[], &[4], &[4, 5], &[5]]).await;
        answer(&repo, ids[0]).await;

        let batch = service(&repo, SelectionPolicy::RatingDescending)
            .next_batch(&uid("learner"), 10)
            .await
            .unwrap();
        let got: Vec<_> = batch.iter().map(Question::id).collect();
        assert_eq!(got, [ids[3], ids[2], ids[1], ids[0]]);
    }

    #[tokio::test]
    async fn batch_is_truncated_and_skips_hidden() {
        let (repo, ids) = seeded(&[&[2, 2, 2], &[], &[], &[]]).await;
        let batch = service(&repo, SelectionPolicy::RatingDescending)
            .next_batch(&uid("learner"), 2)
            .await
            .unwrap();
        let got: Vec<_> = batch.iter().map(Question::id).collect();
        assert_eq!(got, [ids[1], ids[2]]);
    }

    #[tokio::test]
    async fn empty_corpus_or_zero_size_gives_empty_batch() {
        let (repo, _ids) = seeded(&[]).await;
        let svc = service(&repo, SelectionPolicy::RatingDescending);
        assert!(svc.next_batch(&uid("learner"), 5).await.unwrap().is_empty());

        let (repo, _ids) = seeded(&[&[]]).await;
        let svc = service(&repo, SelectionPolicy::RatingDescending);
        assert!(svc.next_batch(&uid("learner"), 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn default_batch_uses_configured_size() {
        let (repo, ids) = seeded(&[&[], &[], &[]]).await;
        let svc = service(&repo, SelectionPolicy::RatingDescending).with_batch_size(2);
        assert_eq!(svc.batch_size(), 2);

        let batch = svc.next_default_batch(&uid("learner")).await.unwrap();
        let got: Vec<_> = batch.iter().map(Question::id).collect();
        assert_eq!(got, [ids[0], ids[1]]);

        let svc = service(&repo, SelectionPolicy::RatingDescending);
        assert_eq!(svc.batch_size(), 20);
        assert_eq!(svc.next_default_batch(&uid("learner")).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn repeated_answers_count_once() {
        let (repo, ids) = seeded(&[&[], &[]]).await;
        answer(&repo, ids[0]).await;
        answer(&repo, ids[0]).await;

        let batch = service(&repo, SelectionPolicy::RatingDescending)
            .next_batch(&uid("learner"), 1)
            .await
            .unwrap();
        assert_eq!(batch[0].id(), ids[1]);
    }

    #[tokio::test]
    async fn shuffled_policy_still_puts_unanswered_first() {
        let (repo, ids) = seeded(&[&[], &[], &[], &[], &[]]).await;
        answer(&repo, ids[0]).await;
        answer(&repo, ids[1]).await;

        let batch = service(&repo, SelectionPolicy::Shuffled)
            .next_batch(&uid("learner"), 5)
            .await
            .unwrap();
        assert_eq!(batch.len(), 5);
        let tail: Vec<_> = batch[3..].iter().map(Question::id).collect();
        assert!(tail.contains(&ids[0]) && tail.contains(&ids[1]));
    }
}
