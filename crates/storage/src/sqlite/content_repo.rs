use lesson_core::model::{
    CaseStudy, CheckpointChallenge, ContentItem, Difficulty, MediaUri, PromptText, TopicContent,
    TopicId, VideoAsset,
};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    checkpoint_id_from_i64, choices_from_json, choices_to_json, conn, id_i64, item_id_from_i64,
    ser, topic_id_from_i64, usize_from_i64, usize_i64,
};
use crate::repository::{ContentRepository, StorageError};

#[async_trait::async_trait]
impl ContentRepository for SqliteRepository {
    async fn load_topic(&self, topic_id: TopicId) -> Result<TopicContent, StorageError> {
        let topic = id_i64("topic_id", topic_id.value())?;

        let topic_row = sqlx::query(
            r"
                SELECT inquiry_prompt, video_uri, video_duration_secs, case_scenario
                FROM topics
                WHERE id = ?1
            ",
        )
        .bind(topic)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        let inquiry_prompt = topic_row
            .try_get::<Option<String>, _>("inquiry_prompt")
            .map_err(ser)?
            .map(PromptText::parse)
            .transpose()
            .map_err(ser)?;

        let video_uri: Option<String> = topic_row.try_get("video_uri").map_err(ser)?;
        let video_duration: Option<f64> = topic_row.try_get("video_duration_secs").map_err(ser)?;
        let video = match (video_uri, video_duration) {
            (Some(uri), Some(duration)) => {
                let uri = MediaUri::parse(&uri).map_err(ser)?;
                Some(VideoAsset::new(uri, duration).map_err(ser)?)
            }
            _ => None,
        };

        let checkpoint_rows = sqlx::query(
            r"
                SELECT id, timestamp_secs, prompt, choices, correct_index
                FROM checkpoints
                WHERE topic_id = ?1
                ORDER BY timestamp_secs ASC, id ASC
            ",
        )
        .bind(topic)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut checkpoints = Vec::with_capacity(checkpoint_rows.len());
        for row in checkpoint_rows {
            let choices: String = row.try_get("choices").map_err(ser)?;
            checkpoints.push(
                CheckpointChallenge::new(
                    checkpoint_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
                    row.try_get("timestamp_secs").map_err(ser)?,
                    row.try_get::<String, _>("prompt").map_err(ser)?,
                    choices_from_json(&choices)?,
                    usize_from_i64(
                        "correct_index",
                        row.try_get::<i64, _>("correct_index").map_err(ser)?,
                    )?,
                )
                .map_err(ser)?,
            );
        }

        let item_rows = sqlx::query(
            r"
                SELECT id, prompt, choices, correct_index, difficulty
                FROM quiz_items
                WHERE topic_id = ?1
                ORDER BY id ASC
            ",
        )
        .bind(topic)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut quiz_pool = Vec::with_capacity(item_rows.len());
        for row in item_rows {
            let choices: String = row.try_get("choices").map_err(ser)?;
            let difficulty: String = row.try_get("difficulty").map_err(ser)?;
            quiz_pool.push(
                ContentItem::new(
                    item_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
                    row.try_get::<String, _>("prompt").map_err(ser)?,
                    choices_from_json(&choices)?,
                    usize_from_i64(
                        "correct_index",
                        row.try_get::<i64, _>("correct_index").map_err(ser)?,
                    )?,
                    difficulty.parse::<Difficulty>().map_err(ser)?,
                )
                .map_err(ser)?,
            );
        }

        let scenario: Option<String> = topic_row.try_get("case_scenario").map_err(ser)?;
        let case_study = match scenario {
            Some(scenario) => {
                let question_rows = sqlx::query(
                    r"
                        SELECT question, expected_answer
                        FROM case_study_questions
                        WHERE topic_id = ?1
                        ORDER BY position ASC
                    ",
                )
                .bind(topic)
                .fetch_all(&self.pool)
                .await
                .map_err(conn)?;

                let questions = question_rows
                    .iter()
                    .map(|r| {
                        Ok((
                            r.try_get::<String, _>("question").map_err(ser)?,
                            r.try_get::<String, _>("expected_answer").map_err(ser)?,
                        ))
                    })
                    .collect::<Result<Vec<_>, StorageError>>()?;
                Some(CaseStudy::new(scenario, questions).map_err(ser)?)
            }
            None => None,
        };

        Ok(TopicContent {
            topic_id,
            inquiry_prompt,
            video,
            checkpoints,
            quiz_pool,
            case_study,
        })
    }

    async fn insert_topic_content(&self, content: &TopicContent) -> Result<(), StorageError> {
        let topic = id_i64("topic_id", content.topic_id.value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
                INSERT INTO topics (id, inquiry_prompt, video_uri, video_duration_secs, case_scenario)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    inquiry_prompt = excluded.inquiry_prompt,
                    video_uri = excluded.video_uri,
                    video_duration_secs = excluded.video_duration_secs,
                    case_scenario = excluded.case_scenario
            ",
        )
        .bind(topic)
        .bind(content.inquiry_prompt.as_ref().map(|p| p.as_str().to_owned()))
        .bind(content.video.as_ref().map(|v| v.uri().to_storage_string()))
        .bind(content.video.as_ref().map(VideoAsset::duration_secs))
        .bind(content.case_study.as_ref().map(|c| c.scenario().to_owned()))
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        // children are replaced wholesale
        for table in ["checkpoints", "quiz_items", "case_study_questions"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE topic_id = ?1"))
                .bind(topic)
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
        }

        for checkpoint in &content.checkpoints {
            sqlx::query(
                r"
                    INSERT INTO checkpoints (id, topic_id, timestamp_secs, prompt, choices, correct_index)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .bind(id_i64("checkpoint_id", checkpoint.id().value())?)
            .bind(topic)
            .bind(checkpoint.timestamp_secs())
            .bind(checkpoint.prompt().to_owned())
            .bind(choices_to_json(checkpoint.choices().choices())?)
            .bind(usize_i64("correct_index", checkpoint.choices().correct_index())?)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        for item in &content.quiz_pool {
            sqlx::query(
                r"
                    INSERT INTO quiz_items (id, topic_id, prompt, choices, correct_index, difficulty)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .bind(id_i64("item_id", item.id().value())?)
            .bind(topic)
            .bind(item.prompt().to_owned())
            .bind(choices_to_json(item.choices().choices())?)
            .bind(usize_i64("correct_index", item.choices().correct_index())?)
            .bind(item.difficulty().as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        if let Some(case_study) = &content.case_study {
            for (position, question) in case_study.questions().iter().enumerate() {
                sqlx::query(
                    r"
                        INSERT INTO case_study_questions (topic_id, position, question, expected_answer)
                        VALUES (?1, ?2, ?3, ?4)
                    ",
                )
                .bind(topic)
                .bind(usize_i64("position", position)?)
                .bind(question.question().to_owned())
                .bind(question.expected_answer().to_owned())
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
            }
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn topic_ids(&self) -> Result<Vec<TopicId>, StorageError> {
        let rows = sqlx::query("SELECT id FROM topics ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter()
            .map(|row| topic_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?))
            .collect()
    }
}
