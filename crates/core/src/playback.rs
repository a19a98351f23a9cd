//! "Watch fully, checkpoints first" enforcement for the video phase.
//!
//! The guard is a pure state machine fed with polled media positions. It
//! never talks to a player itself; each call returns a [`PlaybackDirective`]
//! that the driver applies (seek back, pause, keep going). Forward seeks and
//! wrong checkpoint answers are ordinary control flow here, not errors.

use thiserror::Error;

use crate::model::{CheckpointChallenge, CheckpointId, VideoAsset};
use crate::policy::PlaybackPolicy;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum PlaybackError {
    #[error("checkpoint {id} at {timestamp}s lies beyond the end of the video ({duration}s)")]
    CheckpointBeyondEnd {
        id: CheckpointId,
        timestamp: f64,
        duration: f64,
    },

    #[error("no checkpoint is waiting for an answer")]
    NoCheckpointPending,

    #[error("checkpoint {expected} is pending, got an answer for {got}")]
    UnexpectedCheckpoint {
        expected: CheckpointId,
        got: CheckpointId,
    },
}

/// What the driver should do after a position report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackDirective {
    /// Position accepted.
    Continue,
    /// The learner jumped ahead; move the player back to `to`.
    SeekBack { to: f64 },
    /// Pause and present the checkpoint.
    PauseForCheckpoint { checkpoint: CheckpointId, at: f64 },
    /// A checkpoint is still unanswered; stay paused at `at`.
    Hold { at: f64 },
    /// Video watched to the end with every checkpoint passed.
    Complete,
}

/// Result of answering the pending checkpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckpointOutcome {
    pub checkpoint: CheckpointId,
    pub selected: usize,
    pub correct: bool,
    /// Where playback resumes: the pause point when correct, the look-back
    /// point when not.
    pub resume_at: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Pending {
    index: usize,
    paused_at: f64,
}

#[derive(Debug, Clone)]
pub struct PlaybackGuard {
    duration: f64,
    checkpoints: Vec<CheckpointChallenge>,
    answered: Vec<bool>,
    last_known: f64,
    position: f64,
    pending: Option<Pending>,
    policy: PlaybackPolicy,
    forward_seeks: u32,
}

impl PlaybackGuard {
    /// Build a guard for `video` with its checkpoints (any order).
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::CheckpointBeyondEnd` when a checkpoint could
    /// never be reached.
    pub fn new(
        video: &VideoAsset,
        mut checkpoints: Vec<CheckpointChallenge>,
        policy: PlaybackPolicy,
    ) -> Result<Self, PlaybackError> {
        let duration = video.duration_secs();
        if let Some(cp) = checkpoints.iter().find(|cp| cp.timestamp_secs() > duration) {
            return Err(PlaybackError::CheckpointBeyondEnd {
                id: cp.id(),
                timestamp: cp.timestamp_secs(),
                duration,
            });
        }
        checkpoints.sort_by(|a, b| a.timestamp_secs().total_cmp(&b.timestamp_secs()));
        let answered = vec![false; checkpoints.len()];

        Ok(Self {
            duration,
            checkpoints,
            answered,
            last_known: 0.0,
            position: 0.0,
            pending: None,
            policy,
            forward_seeks: 0,
        })
    }

    /// Feed a polled media position.
    pub fn observe(&mut self, reported: f64) -> PlaybackDirective {
        if let Some(pending) = self.pending {
            return PlaybackDirective::Hold {
                at: pending.paused_at,
            };
        }
        if !reported.is_finite() {
            return PlaybackDirective::SeekBack {
                to: self.last_known,
            };
        }

        let reported = reported.clamp(0.0, self.duration);
        if reported > self.last_known + self.policy.seek_slack_secs {
            self.forward_seeks = self.forward_seeks.saturating_add(1);
            self.position = self.last_known;
            return PlaybackDirective::SeekBack {
                to: self.last_known,
            };
        }

        self.position = reported;
        if reported > self.last_known {
            self.last_known = reported;
        }

        if let Some(index) = self.first_unanswered_reached(reported) {
            self.pending = Some(Pending {
                index,
                paused_at: reported,
            });
            return PlaybackDirective::PauseForCheckpoint {
                checkpoint: self.checkpoints[index].id(),
                at: reported,
            };
        }

        if self.is_complete() {
            PlaybackDirective::Complete
        } else {
            PlaybackDirective::Continue
        }
    }

    /// Answer the checkpoint playback is paused on.
    ///
    /// A wrong answer rewinds to the look-back point (floored at 0) and lowers
    /// the high-water mark there, so the lead-up has to be watched again and
    /// the checkpoint fires again when reached.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NoCheckpointPending` when playback is not paused
    /// on a checkpoint, or `UnexpectedCheckpoint` for an answer to a different one.
    pub fn answer_checkpoint(
        &mut self,
        id: CheckpointId,
        selected: usize,
    ) -> Result<CheckpointOutcome, PlaybackError> {
        let pending = self.pending.ok_or(PlaybackError::NoCheckpointPending)?;
        let checkpoint = &self.checkpoints[pending.index];
        if checkpoint.id() != id {
            return Err(PlaybackError::UnexpectedCheckpoint {
                expected: checkpoint.id(),
                got: id,
            });
        }

        let correct = checkpoint.choices().is_correct(selected);
        let resume_at = if correct {
            self.answered[pending.index] = true;
            pending.paused_at
        } else {
            let rewind = (checkpoint.timestamp_secs() - self.policy.lookback_secs).max(0.0);
            self.last_known = rewind;
            rewind
        };
        self.position = resume_at;
        self.pending = None;

        Ok(CheckpointOutcome {
            checkpoint: id,
            selected,
            correct,
            resume_at,
        })
    }

    /// Privileged shortcut: mark every checkpoint passed and jump to the end.
    ///
    /// Returns the checkpoints that had not been passed yet with their
    /// correct choice index, so the caller can record them.
    pub fn force_complete(&mut self) -> Vec<(CheckpointId, usize)> {
        let skipped = self
            .checkpoints
            .iter()
            .zip(&self.answered)
            .filter(|(_, answered)| !**answered)
            .map(|(cp, _)| (cp.id(), cp.choices().correct_index()))
            .collect();
        self.answered.iter_mut().for_each(|a| *a = true);
        self.pending = None;
        self.last_known = self.duration;
        self.position = self.duration;
        skipped
    }

    /// `true` once the high-water mark is within epsilon of the end and every
    /// checkpoint has been answered correctly.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pending.is_none()
            && self.answered.iter().all(|a| *a)
            && self.last_known >= self.duration - self.policy.completion_epsilon_secs
    }

    #[must_use]
    pub fn pending_checkpoint(&self) -> Option<&CheckpointChallenge> {
        self.pending.map(|p| &self.checkpoints[p.index])
    }

    #[must_use]
    pub fn checkpoints(&self) -> &[CheckpointChallenge] {
        &self.checkpoints
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answered.iter().filter(|a| **a).count()
    }

    #[must_use]
    pub fn last_known(&self) -> f64 {
        self.last_known
    }

    #[must_use]
    pub fn position(&self) -> f64 {
        self.position
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        self.duration
    }

    #[must_use]
    pub fn forward_seek_count(&self) -> u32 {
        self.forward_seeks
    }

    #[must_use]
    pub fn policy(&self) -> &PlaybackPolicy {
        &self.policy
    }

    fn first_unanswered_reached(&self, position: f64) -> Option<usize> {
        self.checkpoints
            .iter()
            .zip(&self.answered)
            .position(|(cp, answered)| !*answered && cp.timestamp_secs() <= position)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaUri;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn video(duration: f64) -> VideoAsset {
        VideoAsset::new(MediaUri::from_file("lesson.mp4").unwrap(), duration).unwrap()
    }

    fn checkpoint(id: u64, at: f64) -> CheckpointChallenge {
        CheckpointChallenge::new(
            CheckpointId::new(id),
            at,
            format!("Checkpoint {id}"),
            vec!["right".into(), "wrong".into()],
            0,
        )
        .unwrap()
    }

    fn guard(duration: f64, checkpoints: Vec<CheckpointChallenge>) -> PlaybackGuard {
        PlaybackGuard::new(&video(duration), checkpoints, PlaybackPolicy::default()).unwrap()
    }

    /// Advance in half-second steps up to `until`, answering nothing.
    fn play_to(g: &mut PlaybackGuard, from: f64, until: f64) -> PlaybackDirective {
        let mut t = from;
        let mut last = PlaybackDirective::Continue;
        while t <= until {
            last = g.observe(t);
            if !matches!(last, PlaybackDirective::Continue) {
                return last;
            }
            t += 0.5;
        }
        last
    }

    #[test]
    fn forward_seek_is_pulled_back() {
        let mut g = guard(300.0, vec![]);
        assert_eq!(g.observe(10.0), PlaybackDirective::SeekBack { to: 0.0 });
        assert_eq!(g.forward_seek_count(), 1);
        assert_eq!(g.position(), 0.0);
    }

    #[test]
    fn movement_within_slack_is_accepted() {
        let mut g = guard(300.0, vec![]);
        assert_eq!(g.observe(1.0), PlaybackDirective::Continue);
        assert_eq!(g.observe(2.4), PlaybackDirective::Continue);
        assert_eq!(g.last_known(), 2.4);
    }

    #[test]
    fn backward_seek_keeps_high_water_mark() {
        let mut g = guard(300.0, vec![]);
        play_to(&mut g, 0.0, 20.0);
        assert_eq!(g.observe(5.0), PlaybackDirective::Continue);
        assert_eq!(g.last_known(), 20.0);
        assert_eq!(g.observe(21.0), PlaybackDirective::Continue);
    }

    #[test]
    fn corrected_position_never_exceeds_high_water_plus_slack() {
        let slack = PlaybackPolicy::default().seek_slack_secs;
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut g = guard(120.0, vec![checkpoint(1, 40.0), checkpoint(2, 80.0)]);
            for _ in 0..400 {
                let before = g.last_known();
                let reported = rng.random_range(-5.0..130.0);
                g.observe(reported);
                assert!(g.position() <= before + slack);
                assert!(g.last_known() <= before + slack);
                if let Some(cp) = g.pending_checkpoint() {
                    let id = cp.id();
                    let pick = rng.random_range(0..2);
                    g.answer_checkpoint(id, pick).unwrap();
                }
            }
        }
    }

    #[test]
    fn checkpoint_pauses_and_holds_until_answered() {
        let mut g = guard(120.0, vec![checkpoint(1, 30.0)]);
        let directive = play_to(&mut g, 0.0, 60.0);
        assert_eq!(
            directive,
            PlaybackDirective::PauseForCheckpoint {
                checkpoint: CheckpointId::new(1),
                at: 30.0
            }
        );
        assert_eq!(g.observe(30.5), PlaybackDirective::Hold { at: 30.0 });
        assert_eq!(g.observe(31.0), PlaybackDirective::Hold { at: 30.0 });
    }

    #[test]
    fn correct_answer_resumes_from_pause_point() {
        let mut g = guard(120.0, vec![checkpoint(1, 30.0)]);
        play_to(&mut g, 0.0, 60.0);
        let outcome = g.answer_checkpoint(CheckpointId::new(1), 0).unwrap();
        assert!(outcome.correct);
        assert_eq!(outcome.resume_at, 30.0);
        assert_eq!(g.answered_count(), 1);
        assert_eq!(g.observe(30.5), PlaybackDirective::Continue);
    }

    #[test]
    fn wrong_answer_rewinds_and_requires_retry() {
        let mut g = guard(120.0, vec![checkpoint(1, 45.0)]);
        play_to(&mut g, 0.0, 60.0);
        let outcome = g.answer_checkpoint(CheckpointId::new(1), 1).unwrap();
        assert!(!outcome.correct);
        assert_eq!(outcome.resume_at, 15.0);
        assert_eq!(g.last_known(), 15.0);
        assert_eq!(g.answered_count(), 0);

        // cannot skip straight back to the checkpoint
        assert_eq!(g.observe(45.0), PlaybackDirective::SeekBack { to: 15.0 });

        let directive = play_to(&mut g, 15.0, 60.0);
        assert_eq!(
            directive,
            PlaybackDirective::PauseForCheckpoint {
                checkpoint: CheckpointId::new(1),
                at: 45.0
            }
        );
    }

    #[test]
    fn rewind_is_floored_at_zero() {
        let mut g = guard(120.0, vec![checkpoint(1, 10.0)]);
        play_to(&mut g, 0.0, 20.0);
        let outcome = g.answer_checkpoint(CheckpointId::new(1), 1).unwrap();
        assert_eq!(outcome.resume_at, 0.0);
    }

    #[test]
    fn never_complete_with_unanswered_checkpoint() {
        let mut g = guard(60.0, vec![checkpoint(1, 20.0), checkpoint(2, 40.0)]);
        let mut t = 0.0;
        for _ in 0..1_000 {
            g.observe(t);
            assert!(!g.is_complete());
            if let Some(cp) = g.pending_checkpoint() {
                let id = cp.id();
                // always answer the second checkpoint wrong
                let pick = if id == CheckpointId::new(2) { 1 } else { 0 };
                g.answer_checkpoint(id, pick).unwrap();
                t = g.position();
            } else {
                t += 0.5;
            }
        }
        assert_eq!(g.answered_count(), 1);
    }

    #[test]
    fn completes_after_all_checkpoints_and_end_reached() {
        let mut g = guard(60.0, vec![checkpoint(2, 40.0), checkpoint(1, 20.0)]);
        let mut t = 0.0;
        let mut completed = false;
        while t <= 60.0 {
            match g.observe(t) {
                PlaybackDirective::PauseForCheckpoint { checkpoint, .. } => {
                    g.answer_checkpoint(checkpoint, 0).unwrap();
                }
                PlaybackDirective::Complete => {
                    completed = true;
                    break;
                }
                _ => {}
            }
            t += 0.5;
        }
        assert!(completed);
        assert!(g.is_complete());
        assert_eq!(g.answered_count(), 2);
    }

    #[test]
    fn answering_without_pending_checkpoint_fails() {
        let mut g = guard(60.0, vec![checkpoint(1, 20.0)]);
        assert_eq!(
            g.answer_checkpoint(CheckpointId::new(1), 0),
            Err(PlaybackError::NoCheckpointPending)
        );
    }

    #[test]
    fn answering_other_checkpoint_fails() {
        let mut g = guard(60.0, vec![checkpoint(1, 20.0), checkpoint(2, 21.0)]);
        play_to(&mut g, 0.0, 30.0);
        assert!(matches!(
            g.answer_checkpoint(CheckpointId::new(2), 0),
            Err(PlaybackError::UnexpectedCheckpoint { .. })
        ));
    }

    #[test]
    fn checkpoint_past_the_end_is_rejected() {
        let err = PlaybackGuard::new(
            &video(30.0),
            vec![checkpoint(1, 31.0)],
            PlaybackPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PlaybackError::CheckpointBeyondEnd { .. }));
    }

    #[test]
    fn force_complete_reports_skipped_checkpoints() {
        let mut g = guard(60.0, vec![checkpoint(1, 20.0), checkpoint(2, 40.0)]);
        play_to(&mut g, 0.0, 30.0);
        g.answer_checkpoint(CheckpointId::new(1), 0).unwrap();

        let skipped = g.force_complete();
        assert_eq!(skipped, vec![(CheckpointId::new(2), 0)]);
        assert!(g.is_complete());
    }
}
