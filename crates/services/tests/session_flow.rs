use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use lesson_core::model::{
    AttemptOrigin, CaseStudy, CheckpointChallenge, CheckpointId, ContentItem, Difficulty,
    Eligibility, GradeReport, GradeSource, GradedPart, ItemId, LearnerId, LearningSessionRecord,
    MediaUri, PartScore, PromptText, ReviewState, SessionKind, TopicContent, TopicId,
    UrgencyStatus, VideoAsset,
};
use lesson_core::phase::TransitionRejected;
use lesson_core::time::fixed_now;
use lesson_core::{OverrideAuthorizer, Phase, ScheduleOutcome, SessionPolicy};
use services::{
    CaseStudyGrader, Clock, ContentArtifact, GradingError, GradingRequest, MediaPlayer,
    PlaybackEvent, PlayerError, SessionError, SessionOrchestrator,
};
use storage::repository::{
    AttemptRepository, ContentRepository, InMemoryRepository, LearningSessionRepository,
    ReviewStateRepository, Storage, StorageError,
};

const LEARNER: LearnerId = LearnerId::new(7);
const TOPIC: TopicId = TopicId::new(1);
const OVERRIDE_TOKEN: &str = "let-me-through";

// ─── fixtures ───

fn quiz_pool() -> Vec<ContentItem> {
    let tiers = [
        (Difficulty::Easy, 5),
        (Difficulty::Medium, 5),
        (Difficulty::Hard, 3),
    ];
    let mut next_id = 1;
    let mut pool = Vec::new();
    for (difficulty, count) in tiers {
        for _ in 0..count {
            pool.push(
                ContentItem::new(
                    ItemId::new(next_id),
                    format!("{difficulty} question {next_id}"),
                    vec![
                        format!("right {next_id}"),
                        format!("wrong {next_id}"),
                        format!("also wrong {next_id}"),
                    ],
                    0,
                    difficulty,
                )
                .unwrap(),
            );
            next_id += 1;
        }
    }
    pool
}

fn topic() -> TopicContent {
    TopicContent {
        topic_id: TOPIC,
        inquiry_prompt: Some(PromptText::parse("Why do queues back up under load?").unwrap()),
        video: Some(
            VideoAsset::new(MediaUri::from_url("https://cdn.example.com/queues.mp4").unwrap(), 20.0)
                .unwrap(),
        ),
        checkpoints: vec![
            CheckpointChallenge::new(
                CheckpointId::new(1),
                5.0,
                "What grows first?",
                vec!["Latency".into(), "Throughput".into()],
                0,
            )
            .unwrap(),
            CheckpointChallenge::new(
                CheckpointId::new(2),
                12.0,
                "Which fix was shown?",
                vec!["More RAM".into(), "Backpressure".into()],
                1,
            )
            .unwrap(),
        ],
        quiz_pool: quiz_pool(),
        case_study: Some(
            CaseStudy::new(
                "A checkout service drops orders during a sale.",
                (1..=4)
                    .map(|i| (format!("Part {i}?"), format!("Expected {i}")))
                    .collect(),
            )
            .unwrap(),
        ),
    }
}

struct ScriptedGrader {
    report: Option<GradeReport>,
}

#[async_trait]
impl CaseStudyGrader for ScriptedGrader {
    async fn grade(&self, _request: &GradingRequest) -> Result<GradeReport, GradingError> {
        self.report.clone().ok_or(GradingError::EmptyResponse)
    }
}

fn one_one_half_one() -> GradeReport {
    GradeReport::new(
        [
            GradedPart::new(PartScore::Full, "clear"),
            GradedPart::new(PartScore::Full, "clear"),
            GradedPart::new(PartScore::Half, "partly"),
            GradedPart::new(PartScore::Full, "clear"),
        ],
        GradeSource::Grader,
    )
}

async fn seeded_repo() -> InMemoryRepository {
    let repo = InMemoryRepository::new();
    repo.insert_topic_content(&topic()).await.unwrap();
    repo
}

fn orchestrator(storage: Storage, grade: Option<GradeReport>) -> SessionOrchestrator {
    SessionOrchestrator::new(
        Clock::fixed(fixed_now()),
        storage,
        Arc::new(ScriptedGrader { report: grade }),
        SessionPolicy::default(),
    )
    .with_authorizer(OverrideAuthorizer::new(Some(OVERRIDE_TOKEN.into())))
    .with_rng_seed(42)
}

/// Plays forward one second per poll while playing.
struct SteadyPlayer {
    state: Mutex<(f64, bool)>,
}

impl SteadyPlayer {
    fn new() -> Self {
        Self {
            state: Mutex::new((0.0, true)),
        }
    }
}

#[async_trait]
impl MediaPlayer for SteadyPlayer {
    async fn position(&self) -> Result<f64, PlayerError> {
        let mut state = self.state.lock().unwrap();
        if state.1 {
            state.0 += 1.0;
        }
        Ok(state.0)
    }

    async fn seek(&self, to_secs: f64) -> Result<(), PlayerError> {
        self.state.lock().unwrap().0 = to_secs;
        Ok(())
    }

    async fn pause(&self) -> Result<(), PlayerError> {
        self.state.lock().unwrap().1 = false;
        Ok(())
    }

    async fn play(&self) -> Result<(), PlayerError> {
        self.state.lock().unwrap().1 = true;
        Ok(())
    }
}

fn due_review_state(review_count: u32) -> ReviewState {
    ReviewState {
        learner_id: LEARNER,
        topic_id: TOPIC,
        review_count,
        last_review_score: Some(90),
        next_review_date: Some(fixed_now() - Duration::hours(1)),
        urgency_status: UrgencyStatus::Low,
        new_session_completed: true,
        updated_at: fixed_now() - Duration::days(7),
    }
}

// ─── end to end ───

#[tokio::test(start_paused = true)]
async fn first_pass_scores_95_and_schedules_next_day() {
    let repo = seeded_repo().await;
    let orch = orchestrator(Storage::from_repository(repo.clone()), Some(one_one_half_one()));

    assert_eq!(
        orch.plan_session(LEARNER, TOPIC).await.unwrap(),
        Eligibility::NewTopic
    );
    let mut ctx = orch.start_first_pass(LEARNER, TOPIC).await.unwrap();
    assert_eq!(ctx.phase(), Phase::Inquiry);
    assert_eq!(ctx.quiz().len(), 10);

    let next = orch
        .submit_inquiry(&mut ctx, "Arrivals outpace the service rate for a while.")
        .unwrap();
    assert_eq!(next, Phase::Video);

    let mut events = orch
        .begin_playback(&mut ctx, Arc::new(SteadyPlayer::new()))
        .unwrap();
    let mut answered = 0;
    while let Some(event) = events.recv().await {
        match event {
            PlaybackEvent::CheckpointReached { checkpoint, .. } => {
                let correct = checkpoint.choices().correct_index();
                let outcome = orch
                    .answer_checkpoint(&mut ctx, checkpoint.id(), correct, 3_000)
                    .await
                    .unwrap();
                assert!(outcome.correct);
                answered += 1;
            }
            PlaybackEvent::Completed => break,
            PlaybackEvent::SeekCorrected { .. } | PlaybackEvent::PlayerFailed { .. } => {}
        }
    }
    assert_eq!(answered, 2);
    assert_eq!(orch.finish_video(&mut ctx).await.unwrap(), Phase::Quiz);
    assert!(ctx.playback().is_none());

    // first pass presents easy items before medium before hard
    let difficulties: Vec<Difficulty> = ctx.quiz().iter().map(ContentItem::difficulty).collect();
    let mut sorted = difficulties.clone();
    sorted.sort_by_key(|d| Difficulty::ALL.iter().position(|x| x == d));
    assert_eq!(difficulties, sorted);

    while let Some(item) = orch.current_item(&ctx) {
        let correct = item.choices().correct_index();
        let answer = orch.answer_quiz(&mut ctx, correct, 2_000).await.unwrap();
        assert!(answer.correct);
    }
    assert_eq!(ctx.phase(), Phase::CaseStudy);

    let outcome = orch
        .submit_case_study(
            &mut ctx,
            vec![
                "Queueing delay grows first.".into(),
                "Add backpressure at the edge.".into(),
                "Maybe more workers.".into(),
                "Shed load beyond capacity.".into(),
            ],
        )
        .await
        .unwrap();

    assert_eq!(ctx.phase(), Phase::Results);
    assert_eq!(outcome.score.final_score, 95);
    assert!(outcome.score.passed);
    let ScheduleOutcome::Update(state) = &outcome.schedule else {
        panic!("passing first pass must schedule a review");
    };
    assert_eq!(state.review_count, 0);
    assert_eq!(state.next_review_date, Some(fixed_now() + Duration::days(1)));
    assert_eq!(state.urgency_status, UrgencyStatus::Low);
    assert!(ctx.is_persisted());

    let attempts = repo.attempts_for_session(ctx.session_id()).await.unwrap();
    assert_eq!(attempts.len(), 12);
    assert!(attempts.iter().all(|a| a.kind == SessionKind::NewTopic));
    assert!(attempts.iter().all(|a| a.origin == AttemptOrigin::Learner));

    let sessions = repo.sessions_for(LEARNER, TOPIC).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].completed);
    assert_eq!(sessions[0].final_score, 95);
    assert!(!sessions[0].grade_fallback);

    let stored = repo.get_review_state(LEARNER, TOPIC).await.unwrap();
    assert_eq!(stored.as_ref(), Some(state));
    assert!(matches!(
        orch.plan_session(LEARNER, TOPIC).await.unwrap(),
        Eligibility::NotYetDue { .. }
    ));

    // finalize again writes nothing new
    orch.finalize(&mut ctx).await.unwrap();
    assert_eq!(
        repo.attempts_for_session(ctx.session_id()).await.unwrap().len(),
        12
    );
}

#[tokio::test]
async fn failed_first_pass_leaves_review_state_untouched_and_restarts_at_video() {
    let repo = seeded_repo().await;
    // grader failure falls back to neutral 2.0 / 4
    let orch = orchestrator(Storage::from_repository(repo.clone()), None);
    let grant = orch.authorize_override(OVERRIDE_TOKEN).unwrap();

    let mut ctx = orch.start_first_pass(LEARNER, TOPIC).await.unwrap();
    orch.submit_inquiry(&mut ctx, "Because the buffer fills faster than it drains.")
        .unwrap();
    orch.force_complete_phase(&mut ctx, &grant).await.unwrap();
    assert_eq!(ctx.phase(), Phase::Quiz);

    while let Some(item) = orch.current_item(&ctx) {
        let wrong = (item.choices().correct_index() + 1) % item.choices().len();
        orch.answer_quiz(&mut ctx, wrong, 1_000).await.unwrap();
    }
    let outcome = orch
        .submit_case_study(&mut ctx, vec!["a".into(), "b".into(), "c".into(), "d".into()])
        .await
        .unwrap();

    // 0% objective, 50% subjective
    assert_eq!(outcome.score.final_score, 20);
    assert!(!outcome.score.passed);
    assert_eq!(outcome.schedule, ScheduleOutcome::Unchanged);
    assert!(ctx.grade().unwrap().is_fallback());
    assert!(repo.get_review_state(LEARNER, TOPIC).await.unwrap().is_none());

    let sessions: Vec<LearningSessionRecord> = repo.sessions_for(LEARNER, TOPIC).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert!(!sessions[0].completed);
    assert!(sessions[0].grade_fallback);
    assert!(sessions[0].overridden);

    let first_id = ctx.session_id();
    assert_eq!(orch.restart(&mut ctx).unwrap(), Phase::Video);
    assert_ne!(ctx.session_id(), first_id);
    assert_eq!(
        ctx.inquiry_response(),
        Some("Because the buffer fills faster than it drains.")
    );
    assert!(ctx.attempts().is_empty());
    assert!(ctx.score().is_none());
    assert_eq!(orch.plan_session(LEARNER, TOPIC).await.unwrap(), Eligibility::NewTopic);
}

#[tokio::test]
async fn passed_session_cannot_restart() {
    let repo = seeded_repo().await;
    repo.upsert_review_state(&due_review_state(2)).await.unwrap();
    let orch = orchestrator(Storage::from_repository(repo), None);

    let mut ctx = orch.start_review(LEARNER, TOPIC).await.unwrap();
    while let Some(item) = orch.current_item(&ctx) {
        let correct = item.choices().correct_index();
        orch.answer_quiz(&mut ctx, correct, 800).await.unwrap();
    }
    assert!(ctx.score().unwrap().passed);
    let err = orch.restart(&mut ctx).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Rejected(TransitionRejected::RestartNotAllowed)
    ));
}

// ─── review ───

#[tokio::test]
async fn review_pass_and_fail_follow_the_interval_table() {
    let repo = seeded_repo().await;
    repo.upsert_review_state(&due_review_state(2)).await.unwrap();
    let orch = orchestrator(Storage::from_repository(repo.clone()), None);

    assert!(matches!(
        orch.plan_session(LEARNER, TOPIC).await.unwrap(),
        Eligibility::ReviewDue {
            urgency: UrgencyStatus::Medium
        }
    ));
    let mut ctx = orch.start_review(LEARNER, TOPIC).await.unwrap();
    assert_eq!(ctx.phase(), Phase::Quiz);
    assert_eq!(ctx.review_number(), 2);

    // 5 of 10 correct fails
    let mut index = 0;
    while let Some(item) = orch.current_item(&ctx) {
        let correct = item.choices().correct_index();
        let selected = if index % 2 == 0 {
            correct
        } else {
            (correct + 1) % item.choices().len()
        };
        orch.answer_quiz(&mut ctx, selected, 900).await.unwrap();
        index += 1;
    }
    assert_eq!(ctx.phase(), Phase::Results);
    assert_eq!(ctx.score().unwrap().final_score, 50);

    let failed = repo.get_review_state(LEARNER, TOPIC).await.unwrap().unwrap();
    assert_eq!(failed.review_count, 2);
    assert_eq!(failed.urgency_status, UrgencyStatus::Critical);
    assert_eq!(failed.next_review_date, Some(fixed_now() + Duration::days(1)));

    // the restarted review passes and advances the count from the failed state
    assert_eq!(orch.restart(&mut ctx).unwrap(), Phase::Quiz);
    while let Some(item) = orch.current_item(&ctx) {
        let correct = item.choices().correct_index();
        orch.answer_quiz(&mut ctx, correct, 700).await.unwrap();
    }
    let passed = repo.get_review_state(LEARNER, TOPIC).await.unwrap().unwrap();
    assert_eq!(passed.review_count, 3);
    assert_eq!(passed.urgency_status, UrgencyStatus::Low);
    assert_eq!(passed.next_review_date, Some(fixed_now() + Duration::days(14)));

    let sessions = repo.sessions_for(LEARNER, TOPIC).await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s.kind == SessionKind::Review));
}

#[tokio::test]
async fn sessions_respect_eligibility() {
    let repo = seeded_repo().await;
    let orch = orchestrator(Storage::from_repository(repo.clone()), None);
    let err = orch.start_review(LEARNER, TOPIC).await.err().unwrap();
    assert!(matches!(
        err,
        SessionError::NotEligible {
            eligibility: Eligibility::NewTopic
        }
    ));

    let mut not_due = due_review_state(1);
    not_due.next_review_date = Some(fixed_now() + Duration::days(3));
    repo.upsert_review_state(&not_due).await.unwrap();
    assert!(matches!(
        orch.start_review(LEARNER, TOPIC).await.err().unwrap(),
        SessionError::NotEligible {
            eligibility: Eligibility::NotYetDue { .. }
        }
    ));
    assert!(matches!(
        orch.start_first_pass(LEARNER, TOPIC).await.err().unwrap(),
        SessionError::NotEligible { .. }
    ));
}

// ─── gates and content ───

#[tokio::test]
async fn short_inquiry_is_rejected_and_phase_kept() {
    let orch = orchestrator(Storage::from_repository(seeded_repo().await), None);
    let mut ctx = orch.start_first_pass(LEARNER, TOPIC).await.unwrap();

    let err = orch.submit_inquiry(&mut ctx, "   too short   ").unwrap_err();
    assert!(matches!(
        err,
        SessionError::Rejected(TransitionRejected::InquiryTooShort {
            length: 9,
            minimum: 20
        })
    ));
    assert_eq!(ctx.phase(), Phase::Inquiry);
    assert!(ctx.inquiry_response().is_none());

    let err = orch.finish_video(&mut ctx).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::WrongPhase {
            expected: Phase::Video,
            actual: Phase::Inquiry
        }
    ));
}

#[tokio::test]
async fn video_cannot_be_left_early() {
    let orch = orchestrator(Storage::from_repository(seeded_repo().await), None);
    let mut ctx = orch.start_first_pass(LEARNER, TOPIC).await.unwrap();
    orch.submit_inquiry(&mut ctx, "Work arrives faster than it leaves.")
        .unwrap();

    let err = orch.finish_video(&mut ctx).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Rejected(TransitionRejected::PlaybackIncomplete)
    ));
    let err = orch
        .answer_checkpoint(&mut ctx, CheckpointId::new(1), 0, 100)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::PlaybackNotStarted));
}

#[tokio::test]
async fn missing_artifacts_are_named() {
    let repo = InMemoryRepository::new();
    let mut content = topic();
    content.case_study = None;
    repo.insert_topic_content(&content).await.unwrap();
    let orch = orchestrator(Storage::from_repository(repo.clone()), None);

    let err = orch.start_first_pass(LEARNER, TOPIC).await.err().unwrap();
    assert!(matches!(
        err,
        SessionError::MissingContent(ContentArtifact::CaseStudy)
    ));
    assert_eq!(err.to_string(), "topic is missing its case study");

    let mut content = topic();
    content.checkpoints.clear();
    repo.insert_topic_content(&content).await.unwrap();
    assert!(matches!(
        orch.start_first_pass(LEARNER, TOPIC).await.err().unwrap(),
        SessionError::MissingContent(ContentArtifact::Checkpoints)
    ));

    assert!(matches!(
        orch.start_first_pass(LEARNER, TopicId::new(99)).await.err().unwrap(),
        SessionError::UnknownTopic(_)
    ));
}

#[tokio::test]
async fn out_of_range_quiz_choice_is_rejected() {
    let repo = seeded_repo().await;
    repo.upsert_review_state(&due_review_state(0)).await.unwrap();
    let orch = orchestrator(Storage::from_repository(repo), None);
    let mut ctx = orch.start_review(LEARNER, TOPIC).await.unwrap();

    let err = orch.answer_quiz(&mut ctx, 3, 500).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::InvalidChoice {
            selected: 3,
            len: 3
        }
    ));
    assert!(ctx.attempts().is_empty());
    assert_eq!(ctx.quiz_answered(), 0);
}

// ─── override ───

#[tokio::test]
async fn override_needs_the_configured_token() {
    let orch = orchestrator(Storage::from_repository(seeded_repo().await), None);
    assert!(matches!(
        orch.authorize_override("guess").unwrap_err(),
        SessionError::Unauthorized
    ));

    let locked = SessionOrchestrator::new(
        Clock::fixed(fixed_now()),
        Storage::in_memory(),
        Arc::new(ScriptedGrader { report: None }),
        SessionPolicy::default(),
    );
    assert!(matches!(
        locked.authorize_override(OVERRIDE_TOKEN).unwrap_err(),
        SessionError::Unauthorized
    ));
}

#[tokio::test]
async fn force_completing_every_phase_records_override_attempts() {
    let repo = seeded_repo().await;
    let orch = orchestrator(Storage::from_repository(repo.clone()), None);
    let grant = orch.authorize_override(OVERRIDE_TOKEN).unwrap();
    let mut ctx = orch.start_first_pass(LEARNER, TOPIC).await.unwrap();

    let mut phases = Vec::new();
    while ctx.phase() != Phase::Results {
        phases.push(orch.force_complete_phase(&mut ctx, &grant).await.unwrap());
    }
    assert_eq!(
        phases,
        vec![Phase::Video, Phase::Quiz, Phase::CaseStudy, Phase::Results]
    );

    let score = ctx.score().unwrap();
    assert_eq!(score.final_score, 100);
    assert_eq!(ctx.grade().unwrap().source(), GradeSource::Override);

    let attempts = repo.attempts_for_session(ctx.session_id()).await.unwrap();
    // 2 checkpoints + 10 quiz items
    assert_eq!(attempts.len(), 12);
    assert!(attempts.iter().all(|a| a.origin == AttemptOrigin::Override));
    assert!(attempts.iter().all(|a| a.correct && a.kind == SessionKind::NewTopic));

    let sessions = repo.sessions_for(LEARNER, TOPIC).await.unwrap();
    assert!(sessions[0].overridden);

    let err = orch.force_complete_phase(&mut ctx, &grant).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Rejected(TransitionRejected::SessionFinished)
    ));
}

// ─── persistence retry ───

/// Fails the first `failures` session writes.
#[derive(Clone)]
struct FlakySessions {
    inner: InMemoryRepository,
    failures: Arc<AtomicUsize>,
}

#[async_trait]
impl LearningSessionRepository for FlakySessions {
    async fn append_session(&self, record: &LearningSessionRecord) -> Result<i64, StorageError> {
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StorageError::Connection("database is locked".into()));
        }
        self.inner.append_session(record).await
    }

    async fn sessions_for(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
    ) -> Result<Vec<LearningSessionRecord>, StorageError> {
        self.inner.sessions_for(learner_id, topic_id).await
    }
}

#[tokio::test]
async fn failed_persistence_is_reported_and_finalize_does_not_duplicate() {
    let repo = seeded_repo().await;
    repo.upsert_review_state(&due_review_state(2)).await.unwrap();
    let mut storage = Storage::from_repository(repo.clone());
    storage.sessions = Arc::new(FlakySessions {
        inner: repo.clone(),
        failures: Arc::new(AtomicUsize::new(1)),
    });
    let orch = orchestrator(storage, None);

    let mut ctx = orch.start_review(LEARNER, TOPIC).await.unwrap();
    let total = ctx.quiz().len();
    let mut last = None;
    for index in 0..total {
        let item = orch.current_item(&ctx).unwrap();
        let correct = item.choices().correct_index();
        // 8 of 10 correct
        let selected = if index < 8 {
            correct
        } else {
            (correct + 1) % item.choices().len()
        };
        last = Some(orch.answer_quiz(&mut ctx, selected, 1_500).await);
    }

    let err = last.unwrap().unwrap_err();
    assert!(matches!(err, SessionError::Persistence(_)));
    assert_eq!(ctx.phase(), Phase::Results);
    assert!(!ctx.is_persisted());
    assert_eq!(ctx.progress().attempts_written, total);
    assert!(!ctx.progress().session_written);
    assert!(repo.sessions_for(LEARNER, TOPIC).await.unwrap().is_empty());

    let outcome = orch.finalize(&mut ctx).await.unwrap();
    assert_eq!(outcome.score.final_score, 80);
    assert!(ctx.is_persisted());
    assert_eq!(
        repo.attempts_for_session(ctx.session_id()).await.unwrap().len(),
        total
    );
    assert_eq!(repo.sessions_for(LEARNER, TOPIC).await.unwrap().len(), 1);

    let state = repo.get_review_state(LEARNER, TOPIC).await.unwrap().unwrap();
    assert_eq!(state.review_count, 3);
    assert_eq!(state.next_review_date, Some(fixed_now() + Duration::days(14)));
}

#[tokio::test]
async fn abandon_persists_nothing() {
    let repo = seeded_repo().await;
    let orch = orchestrator(Storage::from_repository(repo.clone()), None);
    let mut ctx = orch.start_first_pass(LEARNER, TOPIC).await.unwrap();
    orch.submit_inquiry(&mut ctx, "Requests pile up when workers stall.")
        .unwrap();
    let _events = orch
        .begin_playback(&mut ctx, Arc::new(SteadyPlayer::new()))
        .unwrap();
    let session_id = ctx.session_id();

    orch.abandon(ctx).await;

    assert!(repo.attempts_for_session(session_id).await.unwrap().is_empty());
    assert!(repo.sessions_for(LEARNER, TOPIC).await.unwrap().is_empty());
}
