use chrono::{DateTime, Utc};
use lesson_core::model::{
    AttemptOrigin, AttemptRecord, AttemptTarget, CheckpointId, ItemId, LearnerId,
    LearningSessionRecord, ReviewState, SessionId, SessionKind, TopicId, UrgencyStatus,
};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn usize_i64(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn usize_from_i64(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn learner_id_from_i64(v: i64) -> Result<LearnerId, StorageError> {
    Ok(LearnerId::new(u64_from_i64("learner_id", v)?))
}

pub(crate) fn topic_id_from_i64(v: i64) -> Result<TopicId, StorageError> {
    Ok(TopicId::new(u64_from_i64("topic_id", v)?))
}

pub(crate) fn item_id_from_i64(v: i64) -> Result<ItemId, StorageError> {
    Ok(ItemId::new(u64_from_i64("item_id", v)?))
}

pub(crate) fn checkpoint_id_from_i64(v: i64) -> Result<CheckpointId, StorageError> {
    Ok(CheckpointId::new(u64_from_i64("checkpoint_id", v)?))
}

/// Choice lists are stored as a JSON array of strings.
pub(crate) fn choices_to_json(choices: &[String]) -> Result<String, StorageError> {
    serde_json::to_string(choices).map_err(ser)
}

pub(crate) fn choices_from_json(raw: &str) -> Result<Vec<String>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

/// `(target_kind, target_id)` column pair for an attempt target.
pub(crate) fn target_columns(target: AttemptTarget) -> Result<(&'static str, i64), StorageError> {
    match target {
        AttemptTarget::Quiz(id) => Ok(("quiz", id_i64("item_id", id.value())?)),
        AttemptTarget::Checkpoint(id) => Ok(("checkpoint", id_i64("checkpoint_id", id.value())?)),
    }
}

fn target_from_columns(kind: &str, id: i64) -> Result<AttemptTarget, StorageError> {
    match kind {
        "quiz" => Ok(AttemptTarget::Quiz(item_id_from_i64(id)?)),
        "checkpoint" => Ok(AttemptTarget::Checkpoint(checkpoint_id_from_i64(id)?)),
        other => Err(StorageError::Serialization(format!(
            "invalid target kind: {other}"
        ))),
    }
}

fn session_id_from_str(raw: &str) -> Result<SessionId, StorageError> {
    raw.parse::<SessionId>().map_err(ser)
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<AttemptRecord, StorageError> {
    let target_kind: String = row.try_get("target_kind").map_err(ser)?;
    let kind: String = row.try_get("session_kind").map_err(ser)?;
    let origin: String = row.try_get("origin").map_err(ser)?;
    let session_id: String = row.try_get("session_id").map_err(ser)?;

    Ok(AttemptRecord {
        learner_id: learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?,
        session_id: session_id_from_str(&session_id)?,
        target: target_from_columns(
            &target_kind,
            row.try_get::<i64, _>("target_id").map_err(ser)?,
        )?,
        selected: usize_from_i64("selected", row.try_get::<i64, _>("selected").map_err(ser)?)?,
        correct: row.try_get("correct").map_err(ser)?,
        latency_ms: u64_from_i64(
            "latency_ms",
            row.try_get::<i64, _>("latency_ms").map_err(ser)?,
        )?,
        kind: kind.parse::<SessionKind>().map_err(ser)?,
        origin: origin.parse::<AttemptOrigin>().map_err(ser)?,
        recorded_at: row.try_get("recorded_at").map_err(ser)?,
    })
}

pub(crate) fn map_session_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<LearningSessionRecord, StorageError> {
    let session_id: String = row.try_get("session_id").map_err(ser)?;
    let kind: String = row.try_get("kind").map_err(ser)?;

    LearningSessionRecord {
        session_id: session_id_from_str(&session_id)?,
        learner_id: learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?,
        topic_id: topic_id_from_i64(row.try_get::<i64, _>("topic_id").map_err(ser)?)?,
        kind: kind.parse::<SessionKind>().map_err(ser)?,
        started_at: row.try_get("started_at").map_err(ser)?,
        ended_at: row.try_get("ended_at").map_err(ser)?,
        completed: row.try_get("completed").map_err(ser)?,
        review_number: u32_from_i64(
            "review_number",
            row.try_get::<i64, _>("review_number").map_err(ser)?,
        )?,
        final_score: u32_from_i64(
            "final_score",
            row.try_get::<i64, _>("final_score").map_err(ser)?,
        )?,
        grade_fallback: row.try_get("grade_fallback").map_err(ser)?,
        overridden: row.try_get("overridden").map_err(ser)?,
    }
    .validate()
    .map_err(ser)
}

pub(crate) fn map_review_state_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ReviewState, StorageError> {
    let urgency: String = row.try_get("urgency_status").map_err(ser)?;
    let next_review_date: Option<DateTime<Utc>> = row.try_get("next_review_date").map_err(ser)?;

    Ok(ReviewState {
        learner_id: learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?,
        topic_id: topic_id_from_i64(row.try_get::<i64, _>("topic_id").map_err(ser)?)?,
        review_count: u32_from_i64(
            "review_count",
            row.try_get::<i64, _>("review_count").map_err(ser)?,
        )?,
        last_review_score: row
            .try_get::<Option<i64>, _>("last_review_score")
            .map_err(ser)?
            .map(|v| u32_from_i64("last_review_score", v))
            .transpose()?,
        next_review_date,
        urgency_status: urgency.parse::<UrgencyStatus>().map_err(ser)?,
        new_session_completed: row.try_get("new_session_completed").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_columns_round_trip() {
        for target in [
            AttemptTarget::Quiz(ItemId::new(4)),
            AttemptTarget::Checkpoint(CheckpointId::new(9)),
        ] {
            let (kind, id) = target_columns(target).unwrap();
            assert_eq!(target_from_columns(kind, id).unwrap(), target);
        }
        assert!(target_from_columns("essay", 1).is_err());
    }

    #[test]
    fn choices_json_round_trip() {
        let choices = vec!["a \"quoted\" one".to_string(), "b".to_string()];
        let raw = choices_to_json(&choices).unwrap();
        assert_eq!(choices_from_json(&raw).unwrap(), choices);
    }

    #[test]
    fn negative_ids_are_rejected() {
        assert!(topic_id_from_i64(-1).is_err());
        assert!(id_i64("topic_id", u64::MAX).is_err());
    }
}
