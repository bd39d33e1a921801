use quiz_core::model::{QuestionId, RatingSummary};
use sqlx::Row;
use sqlx::sqlite::SqliteConnection;

use super::{
    SqliteRepository,
    mapping::{classify, id_to_i64, index_to_i64, ratings_from_json, ratings_to_json},
};
use crate::repository::{RatingRepository, RatingUpdate, StorageError};

impl SqliteRepository {
    async fn update_ratings_in(
        conn: &mut SqliteConnection,
        id: i64,
        update: RatingUpdate<'_>,
    ) -> Result<Option<RatingSummary>, StorageError> {
        let row = sqlx::query("SELECT ratings FROM questions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(classify)?;
        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row
            .try_get("ratings")
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let next = update(&ratings_from_json(&raw)?);
        let summary = RatingSummary::of(&next);

        sqlx::query(
            r"
                UPDATE questions
                SET ratings = ?2, rating_count = ?3, avg_rating = ?4
                WHERE id = ?1
            ",
        )
        .bind(id)
        .bind(ratings_to_json(&next)?)
        .bind(index_to_i64(summary.count)?)
        .bind(summary.average)
        .execute(&mut *conn)
        .await
        .map_err(classify)?;

        Ok(Some(summary))
    }
}

#[async_trait::async_trait]
impl RatingRepository for SqliteRepository {
    async fn update_ratings(
        &self,
        id: QuestionId,
        update: RatingUpdate<'_>,
    ) -> Result<Option<RatingSummary>, StorageError> {
        let id = id_to_i64("question_id", id.value())?;
        // IMMEDIATE takes the write lock up front so two writers can never
        // both read the same ratings list. Dropping `tx` before commit rolls back.
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(classify)?;

        match Self::update_ratings_in(&mut *tx, id, update).await {
            Ok(summary) => {
                tx.commit().await.map_err(classify)?;
                Ok(summary)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rating rollback failed");
                }
                Err(err)
            }
        }
    }
}
