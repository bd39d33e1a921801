use std::sync::Arc;

use quiz_core::model::{QuestionId, Rating, RatingSummary};
use storage::repository::{RatingRepository, StorageError};

use crate::error::RatingServiceError;

/// Appends peer ratings and keeps each question's average current.
#[derive(Clone)]
pub struct RatingService {
    ratings: Arc<dyn RatingRepository>,
    attempts: u32,
}

impl RatingService {
    #[must_use]
    pub fn new(ratings: Arc<dyn RatingRepository>, attempts: u32) -> Self {
        Self {
            ratings,
            attempts: attempts.max(1),
        }
    }

    /// Append `rating` (1-5) to a question and recompute its average.
    ///
    /// The whole ratings list is rewritten inside one store transaction, so
    /// concurrent raters never lose each other's ratings. Returns `None` when
    /// the question does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RatingServiceError::InvalidRating` before touching the store
    /// if the value is out of range, and
    /// `RatingServiceError::ConcurrentUpdateConflict` once every attempt
    /// has hit a conflict.
    pub async fn rate_question(
        &self,
        id: QuestionId,
        rating: i64,
    ) -> Result<Option<RatingSummary>, RatingServiceError> {
        let rating = Rating::new(rating)?;
        let append = move |current: &[Rating]| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend_from_slice(current);
            next.push(rating);
            next
        };

        for attempt in 1..=self.attempts {
            match self.ratings.update_ratings(id, &append).await {
                Ok(Some(summary)) => {
                    tracing::debug!(
                        question_id = %id,
                        rating = rating.value(),
                        count = summary.count,
                        average = summary.average,
                        "rating applied"
                    );
                    return Ok(Some(summary));
                }
                Ok(None) => {
                    tracing::debug!(question_id = %id, "rating for missing question ignored");
                    return Ok(None);
                }
                Err(StorageError::Conflict) => {
                    tracing::warn!(question_id = %id, attempt, "rating transaction conflicted");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(RatingServiceError::ConcurrentUpdateConflict {
            attempts: self.attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quiz_core::model::{QuestionDraft, RatingError, UserId, UserProfile};
    use quiz_core::time::fixed_now;
    use std::sync::atomic::{AtomicU32, Ordering};
    use storage::repository::{
        InMemoryRepository, ProfileRepository, QuestionRepository, RatingUpdate,
    };

    async fn setup() -> (InMemoryRepository, QuestionId) {
        let repo = InMemoryRepository::new();
        let author = UserId::new("ann").unwrap();
        let profile = UserProfile::new(author.clone(), "Ann", "", fixed_now()).unwrap();
        repo.insert_profile(&profile).await.unwrap();
        let draft = QuestionDraft::new("Q", vec!["A".into(), "B".into()], 0)
            .validate(author, fixed_now())
            .unwrap();
        let ids = repo.insert_questions(&[draft]).await.unwrap();
        (repo, ids[0])
    }

    /// Reports a conflict for the first `conflicts` calls.
    struct Contended {
        inner: InMemoryRepository,
        conflicts: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl RatingRepository for Contended {
        async fn update_ratings(
            &self,
            id: QuestionId,
            update: RatingUpdate<'_>,
        ) -> Result<Option<RatingSummary>, StorageError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.conflicts {
                return Err(StorageError::Conflict);
            }
            self.inner.update_ratings(id, update).await
        }
    }

    #[tokio::test]
    async fn ratings_roll_into_average() {
        let (repo, id) = setup().await;
        let service = RatingService::new(Arc::new(repo.clone()), 3);
        for v in [5, 5, 4] {
            service.rate_question(id, v).await.unwrap();
        }
        let q = repo.get_question(id).await.unwrap().unwrap();
        assert_eq!(q.avg_rating(), 4.7);

        let summary = service.rate_question(id, 2).await.unwrap().unwrap();
        assert_eq!(summary.average, 4.0);
        assert_eq!(summary.count, 4);
        let q = repo.get_question(id).await.unwrap().unwrap();
        assert!(!q.is_hidden());
    }

    #[tokio::test]
    async fn three_twos_hide_the_question() {
        let (repo, id) = setup().await;
        let service = RatingService::new(Arc::new(repo.clone()), 3);
        for _ in 0..3 {
            service.rate_question(id, 2).await.unwrap();
        }
        assert!(repo.list_visible_questions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn out_of_range_rating_is_rejected_without_store_access() {
        let (repo, id) = setup().await;
        let contended = Arc::new(Contended {
            inner: repo,
            conflicts: 0,
            calls: AtomicU32::new(0),
        });
        let service = RatingService::new(contended.clone(), 3);

        for bad in [0, 6, -1] {
            let err = service.rate_question(id, bad).await.unwrap_err();
            assert!(matches!(
                err,
                RatingServiceError::InvalidRating(RatingError::OutOfRange(_))
            ));
        }
        assert_eq!(contended.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_question_is_a_no_op() {
        let (repo, _id) = setup().await;
        let service = RatingService::new(Arc::new(repo), 3);
        let res = service.rate_question(QuestionId::new(404), 3).await.unwrap();
        assert!(res.is_none());
    }

    #[tokio::test]
    async fn conflicts_are_retried() {
        let (repo, id) = setup().await;
        let contended = Arc::new(Contended {
            inner: repo.clone(),
            conflicts: 2,
            calls: AtomicU32::new(0),
        });
        let service = RatingService::new(contended.clone(), 3);

        let summary = service.rate_question(id, 4).await.unwrap().unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(contended.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_conflict() {
        let (repo, id) = setup().await;
        let contended = Arc::new(Contended {
            inner: repo.clone(),
            conflicts: 3,
            calls: AtomicU32::new(0),
        });
        let service = RatingService::new(contended, 3);

        let err = service.rate_question(id, 4).await.unwrap_err();
        assert!(matches!(
            err,
            RatingServiceError::ConcurrentUpdateConflict { attempts: 3 }
        ));
        let q = repo.get_question(id).await.unwrap().unwrap();
        assert!(q.ratings().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_raters_are_all_kept() {
        let (repo, id) = setup().await;
        let service = RatingService::new(Arc::new(repo.clone()), 3);

        let mut handles = Vec::new();
        for i in 0..32_i64 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.rate_question(id, i % 5 + 1).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let q = repo.get_question(id).await.unwrap().unwrap();
        assert_eq!(q.ratings().len(), 32);
        assert_eq!(q.avg_rating(), quiz_core::model::average_rating(q.ratings()));
    }
}
