use std::collections::BTreeMap;

use quiz_core::model::{
    HIDDEN_MAX_AVERAGE, HIDDEN_MIN_RATINGS, NewQuestion, Question, QuestionId, UserId,
    average_rating,
};

use super::{
    SqliteRepository,
    mapping::{classify, id_to_i64, index_to_i64, map_question_row, options_to_json},
};
use crate::repository::{QuestionRepository, StorageError};

const SELECT_QUESTION: &str = r"
    SELECT
        id, text, options, correct_option_index, created_at, created_by,
        times_answered, ratings
    FROM questions
";

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn list_questions(&self) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(&format!("{SELECT_QUESTION} ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        rows.iter().map(map_question_row).collect()
    }

    async fn list_visible_questions(&self) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(&format!(
            "{SELECT_QUESTION} WHERE NOT (avg_rating <= ?1 AND rating_count >= ?2) ORDER BY id ASC"
        ))
        .bind(HIDDEN_MAX_AVERAGE)
        .bind(index_to_i64(HIDDEN_MIN_RATINGS)?)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        rows.iter().map(map_question_row).collect()
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError> {
        let row = sqlx::query(&format!("{SELECT_QUESTION} WHERE id = ?1"))
            .bind(id_to_i64("question_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        row.as_ref().map(map_question_row).transpose()
    }

    async fn insert_questions(
        &self,
        questions: &[NewQuestion],
    ) -> Result<Vec<QuestionId>, StorageError> {
        let mut per_author: BTreeMap<&UserId, i64> = BTreeMap::new();
        for q in questions {
            *per_author.entry(&q.created_by).or_default() += 1;
        }

        let mut tx = self.pool.begin().await.map_err(classify)?;

        for (uid, count) in per_author {
            let res = sqlx::query(
                r"
                    UPDATE users
                    SET total_questions_added = total_questions_added + ?2
                    WHERE uid = ?1
                ",
            )
            .bind(uid.as_str())
            .bind(count)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

            if res.rows_affected() == 0 {
                tx.rollback().await.map_err(classify)?;
                return Err(StorageError::NotFound);
            }
        }

        let mut ids = Vec::with_capacity(questions.len());
        for q in questions {
            let res = sqlx::query(
                r"
                    INSERT INTO questions (
                        text, options, correct_option_index, created_at, created_by,
                        times_answered, ratings, rating_count, avg_rating
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, 0, '[]', 0, ?6)
                ",
            )
            .bind(&q.text)
            .bind(options_to_json(&q.options)?)
            .bind(index_to_i64(q.correct_option_index)?)
            .bind(q.created_at)
            .bind(q.created_by.as_str())
            .bind(average_rating(&[]))
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

            let id = u64::try_from(res.last_insert_rowid())
                .map_err(|_| StorageError::Serialization("question id sign overflow".into()))?;
            ids.push(QuestionId::new(id));
        }

        tx.commit().await.map_err(classify)?;
        Ok(ids)
    }

    async fn delete_question(&self, id: QuestionId) -> Result<bool, StorageError> {
        let res = sqlx::query("DELETE FROM questions WHERE id = ?1")
            .bind(id_to_i64("question_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        Ok(res.rows_affected() > 0)
    }

    async fn count_questions(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;

        u64::try_from(count).map_err(|_| StorageError::Serialization("negative count".into()))
    }
}
