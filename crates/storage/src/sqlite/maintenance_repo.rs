use super::{SqliteRepository, mapping::classify};
use crate::repository::{ResetReport, StatisticsMaintenance, StorageError};

#[async_trait::async_trait]
impl StatisticsMaintenance for SqliteRepository {
    async fn reset_statistics(&self) -> Result<ResetReport, StorageError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let users = sqlx::query(
            r"
                UPDATE users
                SET total_answered = 0, total_correct = 0
            ",
        )
        .execute(&mut *tx)
        .await
        .map_err(classify)?
        .rows_affected();

        let answers_deleted = sqlx::query("DELETE FROM answers")
            .execute(&mut *tx)
            .await
            .map_err(classify)?
            .rows_affected();

        let questions = sqlx::query(
            r"
                UPDATE questions
                SET times_answered = 0, ratings = '[]', rating_count = 0, avg_rating = 5.0
            ",
        )
        .execute(&mut *tx)
        .await
        .map_err(classify)?
        .rows_affected();

        tx.commit().await.map_err(classify)?;
        self.changes.notify();

        Ok(ResetReport {
            users,
            answers_deleted,
            questions,
        })
    }
}
