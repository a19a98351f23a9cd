use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lesson_core::model::{
    AttemptRecord, LearnerId, LearningSessionRecord, ReviewState, SessionId, TopicContent,
    TopicId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Read access to authored topic content, plus seeding.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Load everything authored for a topic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown topic, or
    /// `Serialization` when stored content no longer validates.
    async fn load_topic(&self, topic_id: TopicId) -> Result<TopicContent, StorageError>;

    /// Insert or replace a topic's content.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the content cannot be stored.
    async fn insert_topic_content(&self, content: &TopicContent) -> Result<(), StorageError>;

    /// Ids of every stored topic, ascending.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn topic_ids(&self) -> Result<Vec<TopicId>, StorageError>;
}

/// Append-only log of learner responses.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Append one attempt and return its row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn append_attempt(&self, attempt: &AttemptRecord) -> Result<i64, StorageError>;

    /// Attempts of one session in the order they were appended.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn attempts_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<AttemptRecord>, StorageError>;
}

#[async_trait]
pub trait LearningSessionRepository: Send + Sync {
    /// Append a finished session and return its row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the session id was already written.
    async fn append_session(&self, record: &LearningSessionRecord) -> Result<i64, StorageError>;

    /// Sessions for a learner and topic, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn sessions_for(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
    ) -> Result<Vec<LearningSessionRecord>, StorageError>;
}

#[async_trait]
pub trait ReviewStateRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_review_state(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
    ) -> Result<Option<ReviewState>, StorageError>;

    /// Insert or replace the state for its (learner, topic) pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the state cannot be stored.
    async fn upsert_review_state(&self, state: &ReviewState) -> Result<(), StorageError>;

    /// States with a completed first pass whose review date is at or before
    /// `now`, earliest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn due_reviews(
        &self,
        learner_id: LearnerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReviewState>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    topics: Arc<Mutex<HashMap<TopicId, TopicContent>>>,
    attempts: Arc<Mutex<Vec<(i64, AttemptRecord)>>>,
    sessions: Arc<Mutex<Vec<(i64, LearningSessionRecord)>>>,
    review_states: Arc<Mutex<HashMap<(LearnerId, TopicId), ReviewState>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn next_row_id<T>(rows: &[(i64, T)]) -> i64 {
    rows.last().map_or(1, |(id, _)| id + 1)
}

#[async_trait]
impl ContentRepository for InMemoryRepository {
    async fn load_topic(&self, topic_id: TopicId) -> Result<TopicContent, StorageError> {
        let guard = self
            .topics
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(&topic_id).cloned().ok_or(StorageError::NotFound)
    }

    async fn insert_topic_content(&self, content: &TopicContent) -> Result<(), StorageError> {
        let mut guard = self
            .topics
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(content.topic_id, content.clone());
        Ok(())
    }

    async fn topic_ids(&self) -> Result<Vec<TopicId>, StorageError> {
        let guard = self
            .topics
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut ids: Vec<TopicId> = guard.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn append_attempt(&self, attempt: &AttemptRecord) -> Result<i64, StorageError> {
        let mut guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let id = next_row_id(&guard);
        guard.push((id, attempt.clone()));
        Ok(id)
    }

    async fn attempts_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<AttemptRecord>, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .iter()
            .filter(|(_, a)| a.session_id == session_id)
            .map(|(_, a)| a.clone())
            .collect())
    }
}

#[async_trait]
impl LearningSessionRepository for InMemoryRepository {
    async fn append_session(&self, record: &LearningSessionRecord) -> Result<i64, StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.iter().any(|(_, s)| s.session_id == record.session_id) {
            return Err(StorageError::Conflict);
        }
        let id = next_row_id(&guard);
        guard.push((id, record.clone()));
        Ok(id)
    }

    async fn sessions_for(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
    ) -> Result<Vec<LearningSessionRecord>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found: Vec<(i64, LearningSessionRecord)> = guard
            .iter()
            .filter(|(_, s)| s.learner_id == learner_id && s.topic_id == topic_id)
            .cloned()
            .collect();
        found.sort_by_key(|(id, s)| (s.started_at, *id));
        Ok(found.into_iter().map(|(_, s)| s).collect())
    }
}

#[async_trait]
impl ReviewStateRepository for InMemoryRepository {
    async fn get_review_state(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
    ) -> Result<Option<ReviewState>, StorageError> {
        let guard = self
            .review_states
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(learner_id, topic_id)).cloned())
    }

    async fn upsert_review_state(&self, state: &ReviewState) -> Result<(), StorageError> {
        let mut guard = self
            .review_states
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert((state.learner_id, state.topic_id), state.clone());
        Ok(())
    }

    async fn due_reviews(
        &self,
        learner_id: LearnerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReviewState>, StorageError> {
        let guard = self
            .review_states
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut due: Vec<ReviewState> = guard
            .values()
            .filter(|s| {
                s.learner_id == learner_id
                    && s.new_session_completed
                    && s.next_review_date.is_some_and(|at| at <= now)
            })
            .cloned()
            .collect();
        due.sort_by_key(|s| (s.next_review_date, s.topic_id));
        Ok(due)
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub content: Arc<dyn ContentRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub sessions: Arc<dyn LearningSessionRepository>,
    pub review_states: Arc<dyn ReviewStateRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Use one repository value for every concern.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: ContentRepository
            + AttemptRepository
            + LearningSessionRepository
            + ReviewStateRepository
            + Clone
            + 'static,
    {
        let content: Arc<dyn ContentRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptRepository> = Arc::new(repo.clone());
        let sessions: Arc<dyn LearningSessionRepository> = Arc::new(repo.clone());
        let review_states: Arc<dyn ReviewStateRepository> = Arc::new(repo);
        Self {
            content,
            attempts,
            sessions,
            review_states,
        }
    }
}
