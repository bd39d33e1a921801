use quiz_core::model::{
    AnswerId, AnswerRecord, Question, QuestionId, Rating, UserId, UserProfile,
};
use sqlx::Row;

use crate::repository::{StorageError, StoredAnswer};

// SQLite primary result codes that mean another connection holds the lock.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Map a driver error onto the storage taxonomy.
///
/// Lock contention becomes `Conflict` so callers can retry; everything else
/// is treated as the store being unavailable.
pub(crate) fn classify(err: sqlx::Error) -> StorageError {
    match &err {
        sqlx::Error::RowNotFound => StorageError::NotFound,
        sqlx::Error::Database(db) => {
            let primary = db
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| code & 0xff);
            match primary {
                Some(SQLITE_BUSY | SQLITE_LOCKED) => StorageError::Conflict,
                _ => StorageError::Unavailable(err.to_string()),
            }
        }
        _ => StorageError::Unavailable(err.to_string()),
    }
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn count_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn index_to_i64(v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization("option index overflow".into()))
}

fn index_from_i64(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn options_to_json(options: &[String]) -> Result<String, StorageError> {
    serde_json::to_string(options).map_err(ser)
}

pub(crate) fn ratings_to_json(ratings: &[Rating]) -> Result<String, StorageError> {
    serde_json::to_string(ratings).map_err(ser)
}

pub(crate) fn ratings_from_json(raw: &str) -> Result<Vec<Rating>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let options_raw: String = row.try_get("options").map_err(ser)?;
    let options: Vec<String> = serde_json::from_str(&options_raw).map_err(ser)?;
    let ratings_raw: String = row.try_get("ratings").map_err(ser)?;
    let created_by: String = row.try_get("created_by").map_err(ser)?;

    Question::from_persisted(
        QuestionId::new(i64_to_u64("id", row.try_get::<i64, _>("id").map_err(ser)?)?),
        row.try_get("text").map_err(ser)?,
        options,
        index_from_i64(
            "correct_option_index",
            row.try_get::<i64, _>("correct_option_index").map_err(ser)?,
        )?,
        row.try_get("created_at").map_err(ser)?,
        UserId::new(created_by).map_err(ser)?,
        count_from_i64(
            "times_answered",
            row.try_get::<i64, _>("times_answered").map_err(ser)?,
        )?,
        ratings_from_json(&ratings_raw)?,
    )
    .map_err(ser)
}

pub(crate) fn map_profile_row(row: &sqlx::sqlite::SqliteRow) -> Result<UserProfile, StorageError> {
    let uid: String = row.try_get("uid").map_err(ser)?;
    UserProfile::from_persisted(
        UserId::new(uid).map_err(ser)?,
        row.try_get("display_name").map_err(ser)?,
        row.try_get("email").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
        count_from_i64(
            "total_answered",
            row.try_get::<i64, _>("total_answered").map_err(ser)?,
        )?,
        count_from_i64(
            "total_correct",
            row.try_get::<i64, _>("total_correct").map_err(ser)?,
        )?,
        count_from_i64(
            "total_questions_added",
            row.try_get::<i64, _>("total_questions_added").map_err(ser)?,
        )?,
    )
    .map_err(ser)
}

pub(crate) fn map_answer_row(row: &sqlx::sqlite::SqliteRow) -> Result<StoredAnswer, StorageError> {
    let uid: String = row.try_get("uid").map_err(ser)?;
    let rating = row
        .try_get::<Option<i64>, _>("rating")
        .map_err(ser)?
        .map(Rating::new)
        .transpose()
        .map_err(ser)?;

    Ok(StoredAnswer {
        id: AnswerId::new(i64_to_u64("id", row.try_get::<i64, _>("id").map_err(ser)?)?),
        user_id: UserId::new(uid).map_err(ser)?,
        answer: AnswerRecord {
            question_id: QuestionId::new(i64_to_u64(
                "question_id",
                row.try_get::<i64, _>("question_id").map_err(ser)?,
            )?),
            chosen_option_index: index_from_i64(
                "chosen_option_index",
                row.try_get::<i64, _>("chosen_option_index").map_err(ser)?,
            )?,
            is_correct: row.try_get("is_correct").map_err(ser)?,
            start_time: row.try_get("start_time").map_err(ser)?,
            submit_time: row.try_get("submit_time").map_err(ser)?,
            rating,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratings_json_round_trip_rejects_bad_values() {
        let ratings = vec![Rating::new(4).unwrap(), Rating::new(1).unwrap()];
        let raw = ratings_to_json(&ratings).unwrap();
        assert_eq!(raw, "[4,1]");
        assert_eq!(ratings_from_json(&raw).unwrap(), ratings);
        assert!(ratings_from_json("[0]").is_err());
    }

    #[test]
    fn non_database_errors_are_unavailable() {
        let err = classify(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StorageError::Unavailable(_)));
        assert!(matches!(classify(sqlx::Error::RowNotFound), StorageError::NotFound));
    }
}
