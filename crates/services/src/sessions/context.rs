use chrono::{DateTime, Utc};
use lesson_core::model::{
    AttemptOrigin, AttemptRecord, AttemptTarget, ContentItem, GradeReport, LearnerId,
    LearningSessionRecord, ReviewState, SessionId, SessionKind, TopicContent, TopicId,
};
use lesson_core::{Phase, PlaybackGuard, ScheduleOutcome, ScoreBreakdown, SessionFlow};

use super::playback_task::PlaybackSupervisor;

/// Which parts of a finished session have reached storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistProgress {
    pub attempts_written: usize,
    pub session_written: bool,
    pub review_state_written: bool,
}

/// All mutable state of one session attempt.
///
/// Created by the orchestrator's `start_*` operations and driven only
/// through it. Dropping the context stops any playback task it owns.
pub struct SessionContext {
    pub(crate) session_id: SessionId,
    pub(crate) learner_id: LearnerId,
    pub(crate) topic_id: TopicId,
    pub(crate) flow: SessionFlow,
    pub(crate) phase: Phase,
    pub(crate) content: TopicContent,
    pub(crate) prior_state: Option<ReviewState>,
    pub(crate) inquiry_response: Option<String>,
    pub(crate) quiz: Vec<ContentItem>,
    pub(crate) quiz_cursor: usize,
    pub(crate) attempts: Vec<AttemptRecord>,
    pub(crate) guard: Option<PlaybackGuard>,
    pub(crate) playback: Option<PlaybackSupervisor>,
    pub(crate) grade: Option<GradeReport>,
    pub(crate) score: Option<ScoreBreakdown>,
    pub(crate) schedule: Option<ScheduleOutcome>,
    pub(crate) progress: PersistProgress,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) ended_at: Option<DateTime<Utc>>,
    pub(crate) overridden: bool,
}

impl SessionContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        flow: SessionFlow,
        learner_id: LearnerId,
        topic_id: TopicId,
        content: TopicContent,
        prior_state: Option<ReviewState>,
        quiz: Vec<ContentItem>,
        guard: Option<PlaybackGuard>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: SessionId::generate(),
            learner_id,
            topic_id,
            flow,
            phase: flow.initial_phase(),
            content,
            prior_state,
            inquiry_response: None,
            quiz,
            quiz_cursor: 0,
            attempts: Vec::new(),
            guard,
            playback: None,
            grade: None,
            score: None,
            schedule: None,
            progress: PersistProgress::default(),
            started_at,
            ended_at: None,
            overridden: false,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    #[must_use]
    pub fn flow(&self) -> SessionFlow {
        self.flow
    }

    #[must_use]
    pub fn kind(&self) -> SessionKind {
        self.flow.kind()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Authored content the session was started with.
    #[must_use]
    pub fn content(&self) -> &TopicContent {
        &self.content
    }

    #[must_use]
    pub fn inquiry_response(&self) -> Option<&str> {
        self.inquiry_response.as_deref()
    }

    /// Quiz drawn for this attempt, in presentation order.
    #[must_use]
    pub fn quiz(&self) -> &[ContentItem] {
        &self.quiz
    }

    #[must_use]
    pub fn quiz_answered(&self) -> usize {
        self.quiz_cursor
    }

    /// Attempts recorded so far, including ones already persisted.
    #[must_use]
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    #[must_use]
    pub fn playback(&self) -> Option<&PlaybackSupervisor> {
        self.playback.as_ref()
    }

    #[must_use]
    pub fn grade(&self) -> Option<&GradeReport> {
        self.grade.as_ref()
    }

    #[must_use]
    pub fn score(&self) -> Option<&ScoreBreakdown> {
        self.score.as_ref()
    }

    #[must_use]
    pub fn schedule(&self) -> Option<&ScheduleOutcome> {
        self.schedule.as_ref()
    }

    #[must_use]
    pub fn progress(&self) -> PersistProgress {
        self.progress
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    #[must_use]
    pub fn overridden(&self) -> bool {
        self.overridden
    }

    /// Review count the session runs at; 0 for a first pass.
    #[must_use]
    pub fn review_number(&self) -> u32 {
        match self.flow {
            SessionFlow::FirstPass => 0,
            SessionFlow::Review => self.prior_state.as_ref().map_or(0, |s| s.review_count),
        }
    }

    /// `true` once scored results, every attempt and any review-state
    /// update have been written.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        let Some(schedule) = &self.schedule else {
            return false;
        };
        self.score.is_some()
            && self.progress.attempts_written == self.attempts.len()
            && self.progress.session_written
            && (self.progress.review_state_written || schedule.review_state().is_none())
    }

    pub(crate) fn record_attempt(
        &mut self,
        target: AttemptTarget,
        selected: usize,
        correct: bool,
        latency_ms: u64,
        origin: AttemptOrigin,
        recorded_at: DateTime<Utc>,
    ) {
        self.attempts.push(AttemptRecord {
            learner_id: self.learner_id,
            session_id: self.session_id,
            target,
            selected,
            correct,
            latency_ms,
            kind: self.kind(),
            origin,
            recorded_at,
        });
    }

    /// Summary row for the scored session, if it has been scored.
    pub(crate) fn session_record(&self) -> Option<LearningSessionRecord> {
        let score = self.score.as_ref()?;
        Some(LearningSessionRecord {
            session_id: self.session_id,
            learner_id: self.learner_id,
            topic_id: self.topic_id,
            kind: self.kind(),
            started_at: self.started_at,
            ended_at: self.ended_at?,
            completed: score.passed,
            review_number: self.review_number(),
            final_score: score.final_score,
            grade_fallback: self.grade.as_ref().is_some_and(GradeReport::is_fallback),
            overridden: self.overridden,
        })
    }

    /// Reset to a fresh attempt at `phase` under a new session id. The
    /// inquiry response is kept.
    pub(crate) fn reset_for_restart(
        &mut self,
        phase: Phase,
        quiz: Vec<ContentItem>,
        guard: Option<PlaybackGuard>,
        started_at: DateTime<Utc>,
    ) {
        if let Some(state) = self.schedule.take().and_then(|s| match s {
            ScheduleOutcome::Update(state) => Some(state),
            ScheduleOutcome::Unchanged => None,
        }) {
            self.prior_state = Some(state);
        }
        self.session_id = SessionId::generate();
        self.phase = phase;
        self.quiz = quiz;
        self.quiz_cursor = 0;
        self.attempts.clear();
        self.guard = guard;
        self.playback = None;
        self.grade = None;
        self.score = None;
        self.progress = PersistProgress::default();
        self.started_at = started_at;
        self.ended_at = None;
        self.overridden = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::{Difficulty, ItemId, UrgencyStatus};
    use lesson_core::time::fixed_now;

    fn item(id: u64) -> ContentItem {
        ContentItem::new(
            ItemId::new(id),
            format!("Question {id}"),
            vec!["yes".into(), "no".into()],
            0,
            Difficulty::Easy,
        )
        .unwrap()
    }

    fn review_context() -> SessionContext {
        let prior = ReviewState {
            learner_id: LearnerId::new(1),
            topic_id: TopicId::new(2),
            review_count: 3,
            last_review_score: Some(90),
            next_review_date: Some(fixed_now()),
            urgency_status: UrgencyStatus::Low,
            new_session_completed: true,
            updated_at: fixed_now(),
        };
        SessionContext::new(
            SessionFlow::Review,
            LearnerId::new(1),
            TopicId::new(2),
            TopicContent::empty(TopicId::new(2)),
            Some(prior),
            vec![item(1), item(2)],
            None,
            fixed_now(),
        )
    }

    #[test]
    fn new_context_starts_at_flow_entry() {
        let ctx = review_context();
        assert_eq!(ctx.phase(), Phase::Quiz);
        assert_eq!(ctx.kind(), SessionKind::Review);
        assert_eq!(ctx.review_number(), 3);
        assert!(!ctx.is_persisted());
        assert!(ctx.session_record().is_none());
    }

    #[test]
    fn attempts_carry_session_identity() {
        let mut ctx = review_context();
        ctx.record_attempt(
            AttemptTarget::Quiz(ItemId::new(1)),
            0,
            true,
            1_200,
            AttemptOrigin::Learner,
            fixed_now(),
        );
        let attempt = &ctx.attempts()[0];
        assert_eq!(attempt.session_id, ctx.session_id());
        assert_eq!(attempt.kind, SessionKind::Review);
        assert_eq!(attempt.learner_id, LearnerId::new(1));
    }

    #[test]
    fn restart_keeps_inquiry_and_takes_new_id() {
        let mut ctx = review_context();
        ctx.inquiry_response = Some("kept across attempts".into());
        ctx.record_attempt(
            AttemptTarget::Quiz(ItemId::new(1)),
            1,
            false,
            900,
            AttemptOrigin::Learner,
            fixed_now(),
        );
        ctx.progress.attempts_written = 1;
        let old_id = ctx.session_id();

        ctx.reset_for_restart(Phase::Quiz, vec![item(3)], None, fixed_now());

        assert_ne!(ctx.session_id(), old_id);
        assert_eq!(ctx.inquiry_response(), Some("kept across attempts"));
        assert!(ctx.attempts().is_empty());
        assert_eq!(ctx.progress(), PersistProgress::default());
        assert_eq!(ctx.quiz().len(), 1);
    }
}
