use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned schema migrations.
///
/// Version 1 creates users, questions and answers plus their indexes.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS users (
                    uid TEXT PRIMARY KEY,
                    display_name TEXT NOT NULL,
                    email TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    total_answered INTEGER NOT NULL DEFAULT 0 CHECK (total_answered >= 0),
                    total_correct INTEGER NOT NULL DEFAULT 0
                        CHECK (total_correct >= 0 AND total_correct <= total_answered),
                    total_questions_added INTEGER NOT NULL DEFAULT 0
                        CHECK (total_questions_added >= 0)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS questions (
                    id INTEGER PRIMARY KEY,
                    text TEXT NOT NULL,
                    options TEXT NOT NULL,
                    correct_option_index INTEGER NOT NULL CHECK (correct_option_index >= 0),
                    created_at TEXT NOT NULL,
                    created_by TEXT NOT NULL,
                    times_answered INTEGER NOT NULL DEFAULT 0 CHECK (times_answered >= 0),
                    ratings TEXT NOT NULL DEFAULT '[]',
                    rating_count INTEGER NOT NULL DEFAULT 0 CHECK (rating_count >= 0),
                    avg_rating REAL NOT NULL DEFAULT 5.0
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        // No foreign key on question_id: answers outlive deleted questions.
        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS answers (
                    id INTEGER PRIMARY KEY,
                    uid TEXT NOT NULL,
                    question_id INTEGER NOT NULL,
                    chosen_option_index INTEGER NOT NULL CHECK (chosen_option_index >= 0),
                    is_correct INTEGER NOT NULL,
                    start_time TEXT NOT NULL,
                    submit_time TEXT NOT NULL,
                    rating INTEGER CHECK (rating IS NULL OR rating BETWEEN 1 AND 5),
                    FOREIGN KEY (uid) REFERENCES users(uid) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_answers_uid_id
                    ON answers (uid, id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_users_total_answered
                    ON users (total_answered DESC, uid);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    Ok(())
}
