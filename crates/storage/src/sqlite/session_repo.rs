use lesson_core::model::{LearnerId, LearningSessionRecord, TopicId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_session_row};
use crate::repository::{LearningSessionRepository, StorageError};

#[async_trait::async_trait]
impl LearningSessionRepository for SqliteRepository {
    async fn append_session(&self, record: &LearningSessionRecord) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO learning_sessions (
                    session_id, learner_id, topic_id, kind, started_at, ended_at,
                    completed, review_number, final_score, grade_fallback, overridden
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(record.session_id.to_string())
        .bind(id_i64("learner_id", record.learner_id.value())?)
        .bind(id_i64("topic_id", record.topic_id.value())?)
        .bind(record.kind.as_str())
        .bind(record.started_at)
        .bind(record.ended_at)
        .bind(record.completed)
        .bind(i64::from(record.review_number))
        .bind(i64::from(record.final_score))
        .bind(record.grade_fallback)
        .bind(record.overridden)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
            other => conn(other),
        })?;

        Ok(res.last_insert_rowid())
    }

    async fn sessions_for(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
    ) -> Result<Vec<LearningSessionRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    session_id, learner_id, topic_id, kind, started_at, ended_at,
                    completed, review_number, final_score, grade_fallback, overridden
                FROM learning_sessions
                WHERE learner_id = ?1 AND topic_id = ?2
                ORDER BY started_at ASC, id ASC
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("topic_id", topic_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_session_row).collect()
    }
}
