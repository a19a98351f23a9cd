use std::sync::{Arc, Mutex};

use lesson_core::model::{
    AttemptOrigin, AttemptTarget, CASE_STUDY_PARTS, CheckpointId, ContentItem, Eligibility,
    GradeReport, ItemId, LearnerId, SessionId, SessionKind, TopicContent, TopicId,
};
use lesson_core::phase::{force_transition, inquiry_len, restart_phase, transition};
use lesson_core::{
    CheckpointOutcome, Clock, ContentSelector, OverrideAuthorizer, OverrideGrant, Phase,
    PhaseGates, PlaybackGuard, ReviewScheduler, ScheduleOutcome, ScoreBreakdown, ScoringEngine,
    SessionFlow, SessionPolicy,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use storage::repository::{Storage, StorageError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::context::SessionContext;
use super::playback_task::{MediaPlayer, PlaybackEvent, PlaybackSupervisor};
use crate::error::{ContentArtifact, SessionError};
use crate::grading::{CaseStudyGrader, GradingRequest, grade_with_fallback};

/// Result of answering one quiz item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizAnswer {
    pub item: ItemId,
    pub correct: bool,
    /// Items still to answer in this quiz.
    pub remaining: usize,
    /// Phase after the answer was recorded.
    pub phase: Phase,
}

/// Scored and persisted outcome of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    pub score: ScoreBreakdown,
    pub schedule: ScheduleOutcome,
}

/// Drives sessions through their phases and persists results.
///
/// Holds no per-session state; everything for one attempt lives in the
/// [`SessionContext`] passed to each operation.
pub struct SessionOrchestrator {
    clock: Clock,
    storage: Storage,
    grader: Arc<dyn CaseStudyGrader>,
    policy: SessionPolicy,
    selector: ContentSelector,
    scoring: ScoringEngine,
    scheduler: ReviewScheduler,
    authorizer: OverrideAuthorizer,
    rng: Mutex<StdRng>,
}

impl SessionOrchestrator {
    #[must_use]
    pub fn new(
        clock: Clock,
        storage: Storage,
        grader: Arc<dyn CaseStudyGrader>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            clock,
            storage,
            grader,
            selector: ContentSelector::from_policy(&policy),
            scoring: ScoringEngine::from_policy(&policy),
            scheduler: ReviewScheduler::from_policy(&policy),
            policy,
            authorizer: OverrideAuthorizer::disabled(),
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    #[must_use]
    pub fn with_authorizer(mut self, authorizer: OverrideAuthorizer) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// Seed quiz selection, for reproducible draws.
    #[must_use]
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    #[must_use]
    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Exchange an override token for a grant.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Unauthorized` when overrides are disabled or
    /// the token does not match.
    pub fn authorize_override(&self, token: &str) -> Result<OverrideGrant, SessionError> {
        self.authorizer.authorize(token).map_err(|denied| {
            warn!(reason = %denied, "override request denied");
            SessionError::Unauthorized
        })
    }

    //
    // ─── START ─────────────────────────────────────────────────────────────────
    //

    /// Which session the learner may start for a topic right now.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the review state cannot be read.
    pub async fn plan_session(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
    ) -> Result<Eligibility, SessionError> {
        let state = self
            .storage
            .review_states
            .get_review_state(learner_id, topic_id)
            .await?;
        Ok(Eligibility::of(state.as_ref(), self.clock.now()))
    }

    /// Start the full first-pass lesson for a topic the learner has not
    /// completed yet.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotEligible` once a first pass was completed,
    /// `UnknownTopic` or `MissingContent` for incomplete authoring, and
    /// `Selection` when the quiz pool cannot fill the strata.
    pub async fn start_first_pass(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
    ) -> Result<SessionContext, SessionError> {
        let now = self.clock.now();
        let prior = self
            .storage
            .review_states
            .get_review_state(learner_id, topic_id)
            .await?;
        let eligibility = Eligibility::of(prior.as_ref(), now);
        if eligibility != Eligibility::NewTopic {
            return Err(SessionError::NotEligible { eligibility });
        }

        let content = self.load_content(topic_id).await?;
        require(content.inquiry_prompt.is_some(), ContentArtifact::InquiryPrompt)?;
        require(content.case_study.is_some(), ContentArtifact::CaseStudy)?;
        let guard = self.build_guard(&content)?;
        let quiz = self.draw_quiz(SessionKind::NewTopic, &content.quiz_pool)?;

        let ctx = SessionContext::new(
            SessionFlow::FirstPass,
            learner_id,
            topic_id,
            content,
            prior,
            quiz,
            Some(guard),
            now,
        );
        info!(
            session_id = %ctx.session_id(),
            learner = %learner_id,
            topic = %topic_id,
            quiz_items = ctx.quiz().len(),
            "first-pass session started"
        );
        Ok(ctx)
    }

    /// Start a quiz-only review of a topic whose review date has arrived.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotEligible` unless a review is due,
    /// `UnknownTopic` or `MissingContent` when there is no quiz pool.
    pub async fn start_review(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
    ) -> Result<SessionContext, SessionError> {
        let now = self.clock.now();
        let prior = self
            .storage
            .review_states
            .get_review_state(learner_id, topic_id)
            .await?;
        let eligibility = Eligibility::of(prior.as_ref(), now);
        if !matches!(eligibility, Eligibility::ReviewDue { .. }) {
            return Err(SessionError::NotEligible { eligibility });
        }

        let content = self.load_content(topic_id).await?;
        require(!content.quiz_pool.is_empty(), ContentArtifact::QuizPool)?;
        let quiz = self.draw_quiz(SessionKind::Review, &content.quiz_pool)?;

        let ctx = SessionContext::new(
            SessionFlow::Review,
            learner_id,
            topic_id,
            content,
            prior,
            quiz,
            None,
            now,
        );
        info!(
            session_id = %ctx.session_id(),
            learner = %learner_id,
            topic = %topic_id,
            review_number = ctx.review_number(),
            ?eligibility,
            "review session started"
        );
        Ok(ctx)
    }

    //
    // ─── INQUIRY & VIDEO ───────────────────────────────────────────────────────
    //

    /// Submit the inquiry discussion response and move on to the video.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Rejected` when the response is too short.
    pub fn submit_inquiry(
        &self,
        ctx: &mut SessionContext,
        response: &str,
    ) -> Result<Phase, SessionError> {
        expect_phase(ctx, Phase::Inquiry)?;
        let gates = PhaseGates {
            inquiry_len: inquiry_len(response),
            min_inquiry_chars: self.policy.min_inquiry_chars,
            ..PhaseGates::default()
        };
        let next = transition(ctx.flow, ctx.phase, &gates)?;
        ctx.inquiry_response = Some(response.trim().to_string());
        ctx.phase = next;
        info!(session_id = %ctx.session_id, phase = %next, "inquiry accepted");
        Ok(next)
    }

    /// Start supervising `player` for the video phase.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::PlaybackRunning` if supervision already runs.
    pub fn begin_playback(
        &self,
        ctx: &mut SessionContext,
        player: Arc<dyn MediaPlayer>,
    ) -> Result<mpsc::UnboundedReceiver<PlaybackEvent>, SessionError> {
        expect_phase(ctx, Phase::Video)?;
        if ctx.playback.is_some() {
            return Err(SessionError::PlaybackRunning);
        }
        let guard = ctx
            .guard
            .take()
            .ok_or(SessionError::MissingContent(ContentArtifact::Video))?;
        let (supervisor, events) = PlaybackSupervisor::spawn(guard, player);
        ctx.playback = Some(supervisor);
        info!(session_id = %ctx.session_id, "playback started");
        Ok(events)
    }

    /// Answer the checkpoint playback is paused on.
    ///
    /// A correct answer resumes from the pause point; a wrong one rewinds by
    /// the look-back window. Either way the attempt is recorded.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::PlaybackNotStarted` before `begin_playback`,
    /// `InvalidChoice` for an out-of-range choice, and `Playback` when a
    /// different checkpoint (or none) is pending.
    pub async fn answer_checkpoint(
        &self,
        ctx: &mut SessionContext,
        checkpoint: CheckpointId,
        selected: usize,
        latency_ms: u64,
    ) -> Result<CheckpointOutcome, SessionError> {
        expect_phase(ctx, Phase::Video)?;
        let supervisor = ctx
            .playback
            .as_ref()
            .ok_or(SessionError::PlaybackNotStarted)?;
        if let Some(pending) = supervisor.pending_checkpoint()? {
            let len = pending.choices().len();
            if pending.id() == checkpoint && selected >= len {
                return Err(SessionError::InvalidChoice { selected, len });
            }
        }
        let outcome = supervisor.answer_checkpoint(checkpoint, selected).await?;

        ctx.record_attempt(
            AttemptTarget::Checkpoint(checkpoint),
            selected,
            outcome.correct,
            latency_ms,
            AttemptOrigin::Learner,
            self.clock.now(),
        );
        debug!(
            session_id = %ctx.session_id,
            %checkpoint,
            correct = outcome.correct,
            resume_at = outcome.resume_at,
            "checkpoint answered"
        );
        Ok(outcome)
    }

    /// Leave the video once it was watched to the end with every checkpoint
    /// passed. Stops the playback task.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Rejected` while playback is incomplete.
    pub async fn finish_video(&self, ctx: &mut SessionContext) -> Result<Phase, SessionError> {
        expect_phase(ctx, Phase::Video)?;
        let playback_complete = match &ctx.playback {
            Some(supervisor) => supervisor.is_complete()?,
            None => false,
        };
        let gates = PhaseGates {
            playback_complete,
            ..PhaseGates::default()
        };
        let next = transition(ctx.flow, ctx.phase, &gates)?;
        if let Some(mut supervisor) = ctx.playback.take() {
            supervisor.stop().await;
        }
        ctx.phase = next;
        info!(session_id = %ctx.session_id, phase = %next, "video completed");
        Ok(next)
    }

    //
    // ─── QUIZ & CASE STUDY ─────────────────────────────────────────────────────
    //

    /// The quiz item awaiting an answer, if the session is in its quiz.
    #[must_use]
    pub fn current_item<'a>(&self, ctx: &'a SessionContext) -> Option<&'a ContentItem> {
        if ctx.phase != Phase::Quiz {
            return None;
        }
        ctx.quiz.get(ctx.quiz_cursor)
    }

    /// Record an answer to the current quiz item and advance.
    ///
    /// The last answer moves the session on: to the case study in a first
    /// pass, straight to results in a review.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidChoice` for an out-of-range choice and
    /// `QuizFinished` when nothing is left to answer. When results are
    /// reached but cannot be written, returns `SessionError::Persistence`;
    /// the answer is kept and [`SessionOrchestrator::finalize`] retries.
    pub async fn answer_quiz(
        &self,
        ctx: &mut SessionContext,
        selected: usize,
        latency_ms: u64,
    ) -> Result<QuizAnswer, SessionError> {
        expect_phase(ctx, Phase::Quiz)?;
        let item = ctx
            .quiz
            .get(ctx.quiz_cursor)
            .ok_or(SessionError::QuizFinished)?;
        let len = item.choices().len();
        if selected >= len {
            return Err(SessionError::InvalidChoice { selected, len });
        }
        let item_id = item.id();
        let correct = item.choices().is_correct(selected);

        ctx.record_attempt(
            AttemptTarget::Quiz(item_id),
            selected,
            correct,
            latency_ms,
            AttemptOrigin::Learner,
            self.clock.now(),
        );
        ctx.quiz_cursor += 1;
        let remaining = ctx.quiz.len() - ctx.quiz_cursor;
        debug!(session_id = %ctx.session_id, item = %item_id, correct, remaining, "quiz answered");

        if remaining == 0 {
            let gates = PhaseGates {
                quiz_answered: ctx.quiz_cursor,
                quiz_total: ctx.quiz.len(),
                ..PhaseGates::default()
            };
            let next = transition(ctx.flow, ctx.phase, &gates)?;
            self.enter_phase(ctx, next).await?;
        }

        Ok(QuizAnswer {
            item: item_id,
            correct,
            remaining,
            phase: ctx.phase,
        })
    }

    /// Grade the four case-study answers and move to results.
    ///
    /// Grading never fails the session: errors and timeouts record a
    /// neutral fallback grade.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AnswerCount` unless exactly four answers are
    /// given, and `Persistence` when results cannot be written (retry with
    /// [`SessionOrchestrator::finalize`]).
    pub async fn submit_case_study(
        &self,
        ctx: &mut SessionContext,
        answers: Vec<String>,
    ) -> Result<SessionOutcome, SessionError> {
        expect_phase(ctx, Phase::CaseStudy)?;
        let got = answers.len();
        let answers: [String; CASE_STUDY_PARTS] =
            answers
                .try_into()
                .map_err(|_| SessionError::AnswerCount {
                    expected: CASE_STUDY_PARTS,
                    got,
                })?;
        let case_study = ctx
            .content
            .case_study
            .as_ref()
            .ok_or(SessionError::MissingContent(ContentArtifact::CaseStudy))?;

        let request = GradingRequest::new(case_study, &answers);
        let report =
            grade_with_fallback(self.grader.as_ref(), &request, self.policy.grader_timeout())
                .await;
        if report.is_fallback() {
            warn!(session_id = %ctx.session_id, "case study recorded with neutral fallback grade");
        }
        ctx.grade = Some(report);

        let gates = PhaseGates {
            grade_ready: true,
            ..PhaseGates::default()
        };
        let next = transition(ctx.flow, ctx.phase, &gates)?;
        ctx.phase = next;
        self.enter_results(ctx).await
    }

    //
    // ─── RESULTS ───────────────────────────────────────────────────────────────
    //

    /// Write whatever part of the results has not reached storage yet.
    ///
    /// Safe to call repeatedly: attempts, the session row and the review
    /// state are each written once.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::WrongPhase` before results, and `Persistence`
    /// when a write fails.
    pub async fn finalize(&self, ctx: &mut SessionContext) -> Result<SessionOutcome, SessionError> {
        expect_phase(ctx, Phase::Results)?;
        let (Some(score), Some(schedule), Some(record)) =
            (ctx.score.clone(), ctx.schedule.clone(), ctx.session_record())
        else {
            return Err(SessionError::NotPersisted);
        };
        let session_id = ctx.session_id;

        while ctx.progress.attempts_written < ctx.attempts.len() {
            let attempt = &ctx.attempts[ctx.progress.attempts_written];
            self.storage
                .attempts
                .append_attempt(attempt)
                .await
                .map_err(|err| persistence_failed(session_id, "attempt", err))?;
            ctx.progress.attempts_written += 1;
        }

        if !ctx.progress.session_written {
            match self.storage.sessions.append_session(&record).await {
                // an earlier try landed even though it reported failure
                Ok(_) | Err(StorageError::Conflict) => {}
                Err(err) => return Err(persistence_failed(session_id, "session", err)),
            }
            ctx.progress.session_written = true;
        }

        if let Some(state) = schedule.review_state() {
            if !ctx.progress.review_state_written {
                self.storage
                    .review_states
                    .upsert_review_state(state)
                    .await
                    .map_err(|err| persistence_failed(session_id, "review state", err))?;
                ctx.progress.review_state_written = true;
            }
        }

        info!(
            %session_id,
            final_score = score.final_score,
            passed = score.passed,
            next_review = ?schedule.next_review_date(),
            "session results persisted"
        );
        Ok(SessionOutcome {
            session_id,
            score,
            schedule,
        })
    }

    /// Start over after a failed, persisted result.
    ///
    /// A first pass resumes at the video (the inquiry response is kept), a
    /// review at its quiz. The new attempt gets a fresh session id, a newly
    /// drawn quiz and a fresh playback guard.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Rejected` unless the session failed at its
    /// results, and `NotPersisted` while results are still unwritten.
    pub fn restart(&self, ctx: &mut SessionContext) -> Result<Phase, SessionError> {
        let passed = ctx.score.as_ref().is_some_and(|s| s.passed);
        let phase = restart_phase(ctx.flow, ctx.phase, passed)?;
        if !ctx.is_persisted() {
            return Err(SessionError::NotPersisted);
        }

        let quiz = self.draw_quiz(ctx.kind(), &ctx.content.quiz_pool)?;
        let guard = match ctx.flow {
            SessionFlow::FirstPass => Some(self.build_guard(&ctx.content)?),
            SessionFlow::Review => None,
        };
        let previous = ctx.session_id;
        ctx.reset_for_restart(phase, quiz, guard, self.clock.now());
        info!(
            session_id = %ctx.session_id,
            %previous,
            phase = %phase,
            "session restarted"
        );
        Ok(phase)
    }

    //
    // ─── OVERRIDE & TEARDOWN ───────────────────────────────────────────────────
    //

    /// Skip the current phase's gate with a privileged grant.
    ///
    /// Skipped checkpoints and quiz items are recorded as correct with
    /// `origin = override`; a skipped case study gets full marks. Reaching
    /// results runs the normal persistence path.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Rejected` from results, and `Persistence`
    /// when results cannot be written.
    pub async fn force_complete_phase(
        &self,
        ctx: &mut SessionContext,
        grant: &OverrideGrant,
    ) -> Result<Phase, SessionError> {
        let from = ctx.phase;
        let next = force_transition(ctx.flow, from, grant)?;
        let now = self.clock.now();

        match from {
            Phase::Inquiry | Phase::Results => {}
            Phase::Video => {
                let skipped = match (&ctx.playback, ctx.guard.as_mut()) {
                    (Some(supervisor), _) => supervisor.force_complete()?,
                    (None, Some(guard)) => guard.force_complete(),
                    (None, None) => Vec::new(),
                };
                for (checkpoint, correct_index) in skipped {
                    ctx.record_attempt(
                        AttemptTarget::Checkpoint(checkpoint),
                        correct_index,
                        true,
                        0,
                        AttemptOrigin::Override,
                        now,
                    );
                }
                if let Some(mut supervisor) = ctx.playback.take() {
                    supervisor.stop().await;
                }
                ctx.guard = None;
            }
            Phase::Quiz => {
                let skipped: Vec<(ItemId, usize)> = ctx.quiz[ctx.quiz_cursor..]
                    .iter()
                    .map(|item| (item.id(), item.choices().correct_index()))
                    .collect();
                for (item, correct_index) in skipped {
                    ctx.record_attempt(
                        AttemptTarget::Quiz(item),
                        correct_index,
                        true,
                        0,
                        AttemptOrigin::Override,
                        now,
                    );
                }
                ctx.quiz_cursor = ctx.quiz.len();
            }
            Phase::CaseStudy => ctx.grade = Some(GradeReport::override_full_marks()),
        }

        ctx.overridden = true;
        warn!(session_id = %ctx.session_id, from = %from, to = %next, "phase force-completed");
        self.enter_phase(ctx, next).await?;
        Ok(next)
    }

    /// Tear the session down without persisting anything.
    pub async fn abandon(&self, mut ctx: SessionContext) {
        if let Some(mut supervisor) = ctx.playback.take() {
            supervisor.stop().await;
        }
        info!(
            session_id = %ctx.session_id,
            phase = %ctx.phase,
            attempts = ctx.attempts.len(),
            "session abandoned"
        );
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    async fn load_content(&self, topic_id: TopicId) -> Result<TopicContent, SessionError> {
        match self.storage.content.load_topic(topic_id).await {
            Ok(content) => Ok(content),
            Err(StorageError::NotFound) => Err(SessionError::UnknownTopic(topic_id)),
            Err(err) => Err(err.into()),
        }
    }

    fn build_guard(&self, content: &TopicContent) -> Result<PlaybackGuard, SessionError> {
        let video = content
            .video
            .as_ref()
            .ok_or(SessionError::MissingContent(ContentArtifact::Video))?;
        require(!content.checkpoints.is_empty(), ContentArtifact::Checkpoints)?;
        Ok(PlaybackGuard::new(
            video,
            content.checkpoints.clone(),
            self.policy.playback,
        )?)
    }

    fn draw_quiz(
        &self,
        kind: SessionKind,
        pool: &[ContentItem],
    ) -> Result<Vec<ContentItem>, SessionError> {
        require(!pool.is_empty(), ContentArtifact::QuizPool)?;
        let mut rng = self.rng.lock().map_err(|_| SessionError::Poisoned)?;
        Ok(self.selector.select(kind, pool, &mut *rng)?)
    }

    async fn enter_phase(&self, ctx: &mut SessionContext, next: Phase) -> Result<(), SessionError> {
        ctx.phase = next;
        info!(session_id = %ctx.session_id, phase = %next, "phase entered");
        if next == Phase::Results {
            self.enter_results(ctx).await?;
        }
        Ok(())
    }

    /// Score and schedule once, then persist.
    async fn enter_results(&self, ctx: &mut SessionContext) -> Result<SessionOutcome, SessionError> {
        if ctx.score.is_none() {
            let now = self.clock.now();
            let score = self.scoring.score(
                ctx.kind(),
                &ctx.attempts,
                ctx.quiz.len(),
                ctx.grade.as_ref(),
            )?;
            let schedule = self.scheduler.schedule(
                ctx.learner_id,
                ctx.topic_id,
                ctx.prior_state.as_ref(),
                &score,
                now,
            )?;
            info!(
                session_id = %ctx.session_id,
                final_score = score.final_score,
                passed = score.passed,
                "session scored"
            );
            ctx.score = Some(score);
            ctx.schedule = Some(schedule);
            ctx.ended_at = Some(now);
        }
        self.finalize(ctx).await
    }
}

fn expect_phase(ctx: &SessionContext, expected: Phase) -> Result<(), SessionError> {
    if ctx.phase == expected {
        Ok(())
    } else {
        Err(SessionError::WrongPhase {
            expected,
            actual: ctx.phase,
        })
    }
}

fn require(present: bool, artifact: ContentArtifact) -> Result<(), SessionError> {
    if present {
        Ok(())
    } else {
        Err(SessionError::MissingContent(artifact))
    }
}

fn persistence_failed(session_id: SessionId, what: &str, err: StorageError) -> SessionError {
    warn!(%session_id, error = %err, "failed to persist {what}");
    SessionError::Persistence(err)
}
