//! Scripted learner and media player for exercising a full session from
//! the command line.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::{Context, bail};
use async_trait::async_trait;
use lesson_core::model::{ChoiceSet, Eligibility, LearnerId, TopicId};
use lesson_core::policy::PlaybackPolicy;
use lesson_core::{OverrideGrant, Phase};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use services::{
    MediaPlayer, PlaybackEvent, PlayerError, SessionContext, SessionOrchestrator, SessionOutcome,
};
use tracing::{debug, info, warn};

use crate::demo::CASE_STUDY_ANSWERS;

const INQUIRY_RESPONSE: &str =
    "Our search API slowed down during a sale; I think requests piled up in a queue.";

//
// ─── PLAYER ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Default)]
struct PlayerState {
    position: f64,
    paused: bool,
}

/// Media player that advances a fixed step every time it is polled.
#[derive(Debug)]
pub struct SimulatedPlayer {
    step_secs: f64,
    state: Mutex<PlayerState>,
}

impl SimulatedPlayer {
    #[must_use]
    pub fn new(step_secs: f64) -> Self {
        Self {
            step_secs,
            state: Mutex::new(PlayerState::default()),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut PlayerState) -> T) -> Result<T, PlayerError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| PlayerError("player state poisoned".into()))?;
        Ok(f(&mut state))
    }
}

#[async_trait]
impl MediaPlayer for SimulatedPlayer {
    async fn position(&self) -> Result<f64, PlayerError> {
        let step = self.step_secs;
        self.with_state(|state| {
            if !state.paused {
                state.position += step;
            }
            state.position
        })
    }

    async fn seek(&self, to_secs: f64) -> Result<(), PlayerError> {
        self.with_state(|state| state.position = to_secs)
    }

    async fn pause(&self) -> Result<(), PlayerError> {
        self.with_state(|state| state.paused = true)
    }

    async fn play(&self) -> Result<(), PlayerError> {
        self.with_state(|state| state.paused = false)
    }
}

//
// ─── LEARNER ───────────────────────────────────────────────────────────────────
//

/// Options for one simulated run.
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub learner_id: LearnerId,
    pub topic_id: TopicId,
    /// Probability that any single answer is correct.
    pub accuracy: f64,
    /// Media seconds the player advances per poll.
    pub step_secs: f64,
    /// Attempts allowed, counting restarts after a failed result.
    pub max_attempts: u32,
    pub seed: u64,
    /// Phases force-completed instead of played.
    pub skip: Vec<Phase>,
    /// Presented to the orchestrator to authorise `skip`.
    pub override_token: Option<String>,
}

impl SimulationOptions {
    /// Reject settings the playback guard or override gate could never
    /// satisfy.
    ///
    /// # Errors
    ///
    /// Returns an error for a player step outside `0 < step < seek slack`
    /// or for skipped phases without an override token.
    pub fn validate(&self, playback: &PlaybackPolicy) -> anyhow::Result<()> {
        if !self.step_secs.is_finite() || self.step_secs <= 0.0 {
            bail!("player step must be a positive number of seconds, got {}", self.step_secs);
        }
        if self.step_secs >= playback.seek_slack_secs {
            bail!(
                "player step of {} s must be shorter than the {} s seek slack",
                self.step_secs,
                playback.seek_slack_secs
            );
        }
        if !self.skip.is_empty() && self.override_token.is_none() {
            bail!("skipping phases requires --override-token");
        }
        Ok(())
    }
}

/// Answers questions correctly with a fixed probability.
struct Learner {
    accuracy: f64,
    rng: StdRng,
}

impl Learner {
    fn pick(&mut self, choices: &ChoiceSet) -> usize {
        let correct = choices.correct_index();
        if self.rng.random_bool(self.accuracy) {
            correct
        } else {
            (correct + 1) % choices.len()
        }
    }

    fn latency_ms(&mut self) -> u64 {
        self.rng.random_range(800..6_000)
    }
}

/// Run a whole session for `options.learner_id`, restarting after a
/// failed result while attempts remain.
///
/// # Errors
///
/// Returns an error when no session is available for the topic or the
/// orchestrator rejects a step.
pub async fn run_session(
    orchestrator: &SessionOrchestrator,
    options: &SimulationOptions,
) -> anyhow::Result<SessionOutcome> {
    let grant = match &options.override_token {
        Some(token) if !options.skip.is_empty() => Some(orchestrator.authorize_override(token)?),
        _ => None,
    };

    let eligibility = orchestrator
        .plan_session(options.learner_id, options.topic_id)
        .await?;
    let mut ctx = match eligibility {
        Eligibility::NewTopic => {
            orchestrator
                .start_first_pass(options.learner_id, options.topic_id)
                .await?
        }
        Eligibility::ReviewDue { .. } => {
            orchestrator
                .start_review(options.learner_id, options.topic_id)
                .await?
        }
        Eligibility::NotYetDue { next_review_date } => {
            bail!("topic {} is not due until {next_review_date}", options.topic_id)
        }
    };

    let mut learner = Learner {
        accuracy: options.accuracy.clamp(0.0, 1.0),
        rng: StdRng::seed_from_u64(options.seed),
    };

    let mut attempt = 1;
    loop {
        let outcome = drive(orchestrator, &mut ctx, &mut learner, options, grant.as_ref()).await?;
        println!(
            "attempt {attempt}: {} scored {} ({})",
            ctx.kind(),
            outcome.score.final_score,
            if outcome.score.passed { "passed" } else { "failed" },
        );
        if outcome.score.passed || attempt >= options.max_attempts {
            return Ok(outcome);
        }
        let phase = orchestrator.restart(&mut ctx)?;
        attempt += 1;
        info!(attempt, phase = %phase, "restarting after failed result");
    }
}

/// Drive `ctx` from its current phase to persisted results.
async fn drive(
    orchestrator: &SessionOrchestrator,
    ctx: &mut SessionContext,
    learner: &mut Learner,
    options: &SimulationOptions,
    grant: Option<&OverrideGrant>,
) -> anyhow::Result<SessionOutcome> {
    loop {
        let phase = ctx.phase();
        if let Some(grant) = grant.filter(|_| options.skip.contains(&phase)) {
            let next = orchestrator.force_complete_phase(ctx, grant).await?;
            println!("  {phase} force-completed");
            debug!(from = %phase, to = %next, "phase skipped");
            continue;
        }
        match phase {
            Phase::Inquiry => {
                orchestrator.submit_inquiry(ctx, INQUIRY_RESPONSE)?;
            }
            Phase::Video => {
                let player = Arc::new(SimulatedPlayer::new(options.step_secs));
                watch_video(orchestrator, ctx, learner, player).await?;
            }
            Phase::Quiz => {
                let Some(item) = orchestrator.current_item(ctx) else {
                    bail!("quiz has no item left to answer");
                };
                let selected = learner.pick(item.choices());
                let latency_ms = learner.latency_ms();
                let answer = orchestrator.answer_quiz(ctx, selected, latency_ms).await?;
                debug!(item = %answer.item, correct = answer.correct, "quiz item answered");
            }
            Phase::CaseStudy => {
                let answers = CASE_STUDY_ANSWERS.iter().map(|a| (*a).to_string()).collect();
                return Ok(orchestrator.submit_case_study(ctx, answers).await?);
            }
            // reviews land here from their last quiz answer; finalize only
            // writes what that step did not
            Phase::Results => return Ok(orchestrator.finalize(ctx).await?),
        }
    }
}

async fn watch_video(
    orchestrator: &SessionOrchestrator,
    ctx: &mut SessionContext,
    learner: &mut Learner,
    player: Arc<dyn MediaPlayer>,
) -> anyhow::Result<()> {
    let mut events = orchestrator.begin_playback(ctx, player)?;
    // rewatching the segment is enough to get a checkpoint right
    let mut missed = HashSet::new();
    let mut completed = false;

    while let Some(event) = events.recv().await {
        match event {
            PlaybackEvent::CheckpointReached { checkpoint, at_secs } => {
                let selected = if missed.contains(&checkpoint.id()) {
                    checkpoint.choices().correct_index()
                } else {
                    learner.pick(checkpoint.choices())
                };
                let latency_ms = learner.latency_ms();
                let outcome = orchestrator
                    .answer_checkpoint(ctx, checkpoint.id(), selected, latency_ms)
                    .await?;
                println!(
                    "  checkpoint at {at_secs:.0}s: {}",
                    if outcome.correct {
                        "correct".to_string()
                    } else {
                        format!("wrong, rewinding to {:.0}s", outcome.resume_at)
                    }
                );
                if !outcome.correct {
                    missed.insert(checkpoint.id());
                }
            }
            PlaybackEvent::SeekCorrected { to_secs } => {
                debug!(to_secs, "player pulled back");
            }
            PlaybackEvent::Completed => {
                completed = true;
                break;
            }
            // polling continues after a player error
            PlaybackEvent::PlayerFailed { message } => {
                warn!(%message, "media player error during playback");
            }
        }
    }
    if !completed {
        bail!("playback stopped before the video was completed");
    }

    orchestrator
        .finish_video(ctx)
        .await
        .context("video ended before every checkpoint was passed")?;
    Ok(())
}
