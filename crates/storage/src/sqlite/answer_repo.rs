use std::collections::HashSet;

use quiz_core::model::{AnswerId, AnswerRecord, QuestionId, UserId};

use super::{
    SqliteRepository,
    mapping::{classify, id_to_i64, index_to_i64, map_answer_row},
};
use crate::repository::{AnswerRepository, StorageError, StoredAnswer};

#[async_trait::async_trait]
impl AnswerRepository for SqliteRepository {
    async fn answers_for_user(&self, uid: &UserId) -> Result<Vec<StoredAnswer>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, uid, question_id, chosen_option_index, is_correct,
                    start_time, submit_time, rating
                FROM answers
                WHERE uid = ?1
                ORDER BY id ASC
            ",
        )
        .bind(uid.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        rows.iter().map(map_answer_row).collect()
    }

    async fn answered_question_ids(
        &self,
        uid: &UserId,
    ) -> Result<HashSet<QuestionId>, StorageError> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT DISTINCT question_id FROM answers WHERE uid = ?1")
                .bind(uid.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(classify)?;

        ids.into_iter()
            .map(|id| {
                u64::try_from(id)
                    .map(QuestionId::new)
                    .map_err(|_| StorageError::Serialization("question_id sign overflow".into()))
            })
            .collect()
    }

    async fn commit_answer(
        &self,
        uid: &UserId,
        answer: &AnswerRecord,
    ) -> Result<AnswerId, StorageError> {
        let question_id = id_to_i64("question_id", answer.question_id.value())?;

        let mut tx = self.pool.begin().await.map_err(classify)?;

        let bumped = sqlx::query(
            "UPDATE questions SET times_answered = times_answered + 1 WHERE id = ?1",
        )
        .bind(question_id)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;
        if bumped.rows_affected() == 0 {
            tx.rollback().await.map_err(classify)?;
            return Err(StorageError::NotFound);
        }

        let credited = sqlx::query(
            r"
                UPDATE users
                SET total_answered = total_answered + 1,
                    total_correct = total_correct + ?2
                WHERE uid = ?1
            ",
        )
        .bind(uid.as_str())
        .bind(i64::from(answer.is_correct))
        .execute(&mut *tx)
        .await
        .map_err(classify)?;
        if credited.rows_affected() == 0 {
            tx.rollback().await.map_err(classify)?;
            return Err(StorageError::NotFound);
        }

        let res = sqlx::query(
            r"
                INSERT INTO answers (
                    uid, question_id, chosen_option_index, is_correct,
                    start_time, submit_time, rating
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(uid.as_str())
        .bind(question_id)
        .bind(index_to_i64(answer.chosen_option_index)?)
        .bind(answer.is_correct)
        .bind(answer.start_time)
        .bind(answer.submit_time)
        .bind(answer.rating.map(|r| i64::from(r.value())))
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        tx.commit().await.map_err(classify)?;
        self.changes.notify();

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("answer id sign overflow".into()))?;
        Ok(AnswerId::new(id))
    }
}
