use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Applies versioned migrations tracked in `schema_migrations`.
///
/// Version 1 creates authored content (topics, checkpoints, quiz items, case
/// study questions) and learner progress (attempts, learning sessions,
/// review states).
#[allow(clippy::too_many_lines)]
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
                CREATE TABLE IF NOT EXISTS topics (
                    id INTEGER PRIMARY KEY,
                    inquiry_prompt TEXT,
                    video_uri TEXT,
                    video_duration_secs REAL CHECK (video_duration_secs > 0),
                    case_scenario TEXT,
                    CHECK ((video_uri IS NULL) = (video_duration_secs IS NULL))
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS checkpoints (
                    id INTEGER NOT NULL,
                    topic_id INTEGER NOT NULL,
                    timestamp_secs REAL NOT NULL CHECK (timestamp_secs >= 0),
                    prompt TEXT NOT NULL,
                    choices TEXT NOT NULL,
                    correct_index INTEGER NOT NULL CHECK (correct_index >= 0),
                    PRIMARY KEY (id, topic_id),
                    FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS quiz_items (
                    id INTEGER NOT NULL,
                    topic_id INTEGER NOT NULL,
                    prompt TEXT NOT NULL,
                    choices TEXT NOT NULL,
                    correct_index INTEGER NOT NULL CHECK (correct_index >= 0),
                    difficulty TEXT NOT NULL CHECK (difficulty IN ('easy', 'medium', 'hard')),
                    PRIMARY KEY (id, topic_id),
                    FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS case_study_questions (
                    topic_id INTEGER NOT NULL,
                    position INTEGER NOT NULL CHECK (position BETWEEN 0 AND 3),
                    question TEXT NOT NULL,
                    expected_answer TEXT NOT NULL,
                    PRIMARY KEY (topic_id, position),
                    FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS attempts (
                    id INTEGER PRIMARY KEY,
                    learner_id INTEGER NOT NULL,
                    session_id TEXT NOT NULL,
                    target_kind TEXT NOT NULL CHECK (target_kind IN ('quiz', 'checkpoint')),
                    target_id INTEGER NOT NULL,
                    selected INTEGER NOT NULL CHECK (selected >= 0),
                    correct INTEGER NOT NULL CHECK (correct IN (0, 1)),
                    latency_ms INTEGER NOT NULL CHECK (latency_ms >= 0),
                    session_kind TEXT NOT NULL CHECK (session_kind IN ('new_topic', 'review')),
                    origin TEXT NOT NULL CHECK (origin IN ('learner', 'override')),
                    recorded_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS learning_sessions (
                    id INTEGER PRIMARY KEY,
                    session_id TEXT NOT NULL UNIQUE,
                    learner_id INTEGER NOT NULL,
                    topic_id INTEGER NOT NULL,
                    kind TEXT NOT NULL CHECK (kind IN ('new_topic', 'review')),
                    started_at TEXT NOT NULL,
                    ended_at TEXT NOT NULL,
                    completed INTEGER NOT NULL CHECK (completed IN (0, 1)),
                    review_number INTEGER NOT NULL CHECK (review_number >= 0),
                    final_score INTEGER NOT NULL CHECK (final_score BETWEEN 0 AND 100),
                    grade_fallback INTEGER NOT NULL CHECK (grade_fallback IN (0, 1)),
                    overridden INTEGER NOT NULL CHECK (overridden IN (0, 1)),
                    FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS review_states (
                    learner_id INTEGER NOT NULL,
                    topic_id INTEGER NOT NULL,
                    review_count INTEGER NOT NULL CHECK (review_count >= 0),
                    last_review_score INTEGER CHECK (last_review_score BETWEEN 0 AND 100),
                    next_review_date TEXT,
                    urgency_status TEXT NOT NULL
                        CHECK (urgency_status IN ('Low', 'Medium', 'Critical')),
                    new_session_completed INTEGER NOT NULL
                        CHECK (new_session_completed IN (0, 1)),
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (learner_id, topic_id),
                    FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_attempts_session
                    ON attempts (session_id, id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_learning_sessions_learner_topic_started
                    ON learning_sessions (learner_id, topic_id, started_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_review_states_learner_next
                    ON review_states (learner_id, next_review_date);
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
    }

    Ok(())
}
