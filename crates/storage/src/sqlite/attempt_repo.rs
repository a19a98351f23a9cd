use lesson_core::model::{AttemptRecord, SessionId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_attempt_row, target_columns, usize_i64};
use crate::repository::{AttemptRepository, StorageError};

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn append_attempt(&self, attempt: &AttemptRecord) -> Result<i64, StorageError> {
        let (target_kind, target_id) = target_columns(attempt.target)?;

        let res = sqlx::query(
            r"
                INSERT INTO attempts (
                    learner_id, session_id, target_kind, target_id, selected,
                    correct, latency_ms, session_kind, origin, recorded_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(id_i64("learner_id", attempt.learner_id.value())?)
        .bind(attempt.session_id.to_string())
        .bind(target_kind)
        .bind(target_id)
        .bind(usize_i64("selected", attempt.selected)?)
        .bind(attempt.correct)
        .bind(id_i64("latency_ms", attempt.latency_ms)?)
        .bind(attempt.kind.as_str())
        .bind(attempt.origin.as_str())
        .bind(attempt.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn attempts_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<AttemptRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    learner_id, session_id, target_kind, target_id, selected,
                    correct, latency_ms, session_kind, origin, recorded_at
                FROM attempts
                WHERE session_id = ?1
                ORDER BY id ASC
            ",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_attempt_row).collect()
    }
}
