use chrono::{DateTime, Utc};
use lesson_core::model::{LearnerId, ReviewState, TopicId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_review_state_row};
use crate::repository::{ReviewStateRepository, StorageError};

#[async_trait::async_trait]
impl ReviewStateRepository for SqliteRepository {
    async fn get_review_state(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
    ) -> Result<Option<ReviewState>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    learner_id, topic_id, review_count, last_review_score,
                    next_review_date, urgency_status, new_session_completed, updated_at
                FROM review_states
                WHERE learner_id = ?1 AND topic_id = ?2
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("topic_id", topic_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_review_state_row).transpose()
    }

    async fn upsert_review_state(&self, state: &ReviewState) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO review_states (
                    learner_id, topic_id, review_count, last_review_score,
                    next_review_date, urgency_status, new_session_completed, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(learner_id, topic_id) DO UPDATE SET
                    review_count = excluded.review_count,
                    last_review_score = excluded.last_review_score,
                    next_review_date = excluded.next_review_date,
                    urgency_status = excluded.urgency_status,
                    new_session_completed = excluded.new_session_completed,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(id_i64("learner_id", state.learner_id.value())?)
        .bind(id_i64("topic_id", state.topic_id.value())?)
        .bind(i64::from(state.review_count))
        .bind(state.last_review_score.map(i64::from))
        .bind(state.next_review_date)
        .bind(state.urgency_status.as_str())
        .bind(state.new_session_completed)
        .bind(state.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn due_reviews(
        &self,
        learner_id: LearnerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReviewState>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    learner_id, topic_id, review_count, last_review_score,
                    next_review_date, urgency_status, new_session_completed, updated_at
                FROM review_states
                WHERE learner_id = ?1
                  AND new_session_completed = 1
                  AND next_review_date IS NOT NULL
                  AND next_review_date <= ?2
                ORDER BY next_review_date ASC, topic_id ASC
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_review_state_row).collect()
    }
}
