use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{LearnerId, ReviewState, SessionKind, TopicId, UrgencyStatus};
use crate::policy::SessionPolicy;
use crate::scoring::ScoreBreakdown;
use crate::time::days_after;

/// Interval used past the end of the table when the table itself is empty.
pub const FALLBACK_INTERVAL_DAYS: u32 = 30;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchedulerError {
    #[error("review session for learner {learner}, topic {topic} has no completed first pass")]
    NoPriorState { learner: LearnerId, topic: TopicId },

    #[error("review state belongs to learner {found_learner}, topic {found_topic}")]
    StateMismatch {
        found_learner: LearnerId,
        found_topic: TopicId,
    },
}

//
// ─── OUTCOME ───────────────────────────────────────────────────────────────────
//

/// What the scheduler decided for one finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Persist this state (insert or replace).
    Update(ReviewState),
    /// Failed first pass: nothing is written and the topic stays new.
    Unchanged,
}

impl ScheduleOutcome {
    #[must_use]
    pub fn review_state(&self) -> Option<&ReviewState> {
        match self {
            ScheduleOutcome::Update(state) => Some(state),
            ScheduleOutcome::Unchanged => None,
        }
    }

    #[must_use]
    pub fn new_session_completed(&self) -> bool {
        self.review_state()
            .is_some_and(|state| state.new_session_completed)
    }

    #[must_use]
    pub fn next_review_date(&self) -> Option<DateTime<Utc>> {
        self.review_state().and_then(|state| state.next_review_date)
    }
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// Fixed-interval spaced-repetition scheduler.
///
/// A pass after the first-pass lesson schedules the first review one
/// interval out. Each passed review advances `review_count` and picks the
/// interval at that index; past the end of the table the last interval
/// repeats. A failed review keeps the count, marks the topic `Critical`
/// and retries after the retry window.
///
/// # Examples
///
/// ```
/// # use lesson_core::scheduler::ReviewScheduler;
/// let scheduler = ReviewScheduler::default();
/// assert_eq!(scheduler.interval_for(3), 14);
/// assert_eq!(scheduler.interval_for(40), 30);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewScheduler {
    intervals_days: Vec<u32>,
    retry_days: u32,
}

impl ReviewScheduler {
    #[must_use]
    pub fn new(intervals_days: Vec<u32>, retry_days: u32) -> Self {
        Self {
            intervals_days,
            retry_days,
        }
    }

    #[must_use]
    pub fn from_policy(policy: &SessionPolicy) -> Self {
        Self::new(
            policy.review_intervals_days.clone(),
            policy.failed_review_retry_days,
        )
    }

    /// Days until the next review after reaching `review_count`.
    #[must_use]
    pub fn interval_for(&self, review_count: u32) -> u32 {
        usize::try_from(review_count)
            .ok()
            .and_then(|i| self.intervals_days.get(i))
            .or(self.intervals_days.last())
            .copied()
            .unwrap_or(FALLBACK_INTERVAL_DAYS)
    }

    /// Next review state from the previous one and the session verdict.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::NoPriorState` for a review with no completed
    /// first pass, or `StateMismatch` when `prior` belongs to another pair.
    pub fn schedule(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
        prior: Option<&ReviewState>,
        score: &ScoreBreakdown,
        now: DateTime<Utc>,
    ) -> Result<ScheduleOutcome, SchedulerError> {
        if let Some(state) =
            prior.filter(|s| s.learner_id != learner_id || s.topic_id != topic_id)
        {
            return Err(SchedulerError::StateMismatch {
                found_learner: state.learner_id,
                found_topic: state.topic_id,
            });
        }

        match score.kind {
            SessionKind::NewTopic if !score.passed => Ok(ScheduleOutcome::Unchanged),
            SessionKind::NewTopic => Ok(ScheduleOutcome::Update(ReviewState {
                learner_id,
                topic_id,
                review_count: 0,
                last_review_score: Some(score.final_score),
                next_review_date: Some(days_after(now, self.interval_for(0))),
                urgency_status: UrgencyStatus::Low,
                new_session_completed: true,
                updated_at: now,
            })),
            SessionKind::Review => {
                let prior = prior
                    .filter(|state| state.new_session_completed)
                    .ok_or(SchedulerError::NoPriorState {
                        learner: learner_id,
                        topic: topic_id,
                    })?;

                let (review_count, wait_days, urgency_status) = if score.passed {
                    let count = prior.review_count.saturating_add(1);
                    (count, self.interval_for(count), UrgencyStatus::Low)
                } else {
                    (prior.review_count, self.retry_days, UrgencyStatus::Critical)
                };

                Ok(ScheduleOutcome::Update(ReviewState {
                    learner_id,
                    topic_id,
                    review_count,
                    last_review_score: Some(score.final_score),
                    next_review_date: Some(days_after(now, wait_days)),
                    urgency_status,
                    new_session_completed: true,
                    updated_at: now,
                }))
            }
        }
    }
}

impl Default for ReviewScheduler {
    fn default() -> Self {
        Self::from_policy(&SessionPolicy::default())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
