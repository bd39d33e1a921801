use quiz_core::model::{UserId, UserProfile};
use tokio::sync::watch;

use super::{
    SqliteRepository,
    mapping::{classify, map_profile_row},
};
use crate::repository::{ProfileRepository, StorageError};

#[async_trait::async_trait]
impl ProfileRepository for SqliteRepository {
    async fn get_profile(&self, uid: &UserId) -> Result<Option<UserProfile>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    uid, display_name, email, created_at,
                    total_answered, total_correct, total_questions_added
                FROM users
                WHERE uid = ?1
            ",
        )
        .bind(uid.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;

        row.as_ref().map(map_profile_row).transpose()
    }

    async fn insert_profile(&self, profile: &UserProfile) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO users (
                    uid, display_name, email, created_at,
                    total_answered, total_correct, total_questions_added
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(uid) DO NOTHING
            ",
        )
        .bind(profile.uid().as_str())
        .bind(profile.display_name())
        .bind(profile.email())
        .bind(profile.created_at())
        .bind(i64::from(profile.total_answered()))
        .bind(i64::from(profile.total_correct()))
        .bind(i64::from(profile.total_questions_added()))
        .execute(&self.pool)
        .await
        .map_err(classify)?;

        Ok(res.rows_affected() > 0)
    }

    async fn list_profiles(&self) -> Result<Vec<UserProfile>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    uid, display_name, email, created_at,
                    total_answered, total_correct, total_questions_added
                FROM users
                ORDER BY uid ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        rows.iter().map(map_profile_row).collect()
    }

    fn watch_profiles(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}
