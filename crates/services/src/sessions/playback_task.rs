//! Periodic supervision of the media player during the video phase.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lesson_core::model::{CheckpointChallenge, CheckpointId};
use lesson_core::{CheckpointOutcome, PlaybackDirective, PlaybackGuard};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SessionError;

#[derive(Debug, Error)]
#[error("media player error: {0}")]
pub struct PlayerError(pub String);

/// The embedded player the learner is watching.
#[async_trait]
pub trait MediaPlayer: Send + Sync {
    /// Current playback position in seconds.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError` when the position cannot be read.
    async fn position(&self) -> Result<f64, PlayerError>;

    /// # Errors
    ///
    /// Returns `PlayerError` when the player rejects the seek.
    async fn seek(&self, to_secs: f64) -> Result<(), PlayerError>;

    /// # Errors
    ///
    /// Returns `PlayerError` when the player cannot pause.
    async fn pause(&self) -> Result<(), PlayerError>;

    /// # Errors
    ///
    /// Returns `PlayerError` when the player cannot resume.
    async fn play(&self) -> Result<(), PlayerError>;
}

/// Notable things the supervisor did, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// Playback paused; the learner must answer this checkpoint.
    CheckpointReached {
        checkpoint: CheckpointChallenge,
        at_secs: f64,
    },
    /// A forward seek was undone.
    SeekCorrected { to_secs: f64 },
    /// The video was watched to the end with every checkpoint passed.
    Completed,
    /// The player failed to report or apply a position.
    PlayerFailed { message: String },
}

/// Owns the polling task for one video phase.
///
/// The task stops on [`PlaybackSupervisor::stop`], on completion, or when
/// the supervisor is dropped.
pub struct PlaybackSupervisor {
    guard: Arc<Mutex<PlaybackGuard>>,
    player: Arc<dyn MediaPlayer>,
    /// Held across every guard update together with the player calls that
    /// follow it, so a poll never reads a position the guard has moved past.
    player_turn: Arc<AsyncMutex<()>>,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PlaybackSupervisor {
    /// Start polling `player` at the guard's configured interval.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(
        guard: PlaybackGuard,
        player: Arc<dyn MediaPlayer>,
    ) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let guard = Arc::new(Mutex::new(guard));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        let player_turn = Arc::new(AsyncMutex::new(()));

        let handle = tokio::spawn(supervise(
            Arc::clone(&guard),
            Arc::clone(&player),
            Arc::clone(&player_turn),
            events_tx,
            cancel_token.clone(),
        ));

        let supervisor = Self {
            guard,
            player,
            player_turn,
            cancel_token,
            handle: Some(handle),
        };
        (supervisor, events_rx)
    }

    /// Answer the paused checkpoint and move the player to where it resumes.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Playback` when no checkpoint (or a different
    /// one) is pending.
    pub async fn answer_checkpoint(
        &self,
        id: CheckpointId,
        selected: usize,
    ) -> Result<CheckpointOutcome, SessionError> {
        let _turn = self.player_turn.lock().await;
        let outcome = {
            let mut guard = self.guard.lock().map_err(|_| SessionError::Poisoned)?;
            guard.answer_checkpoint(id, selected)?
        };

        if let Err(err) = self.player.seek(outcome.resume_at).await {
            warn!(error = %err, checkpoint = %id, "failed to move player after checkpoint");
        }
        if let Err(err) = self.player.play().await {
            warn!(error = %err, checkpoint = %id, "failed to resume player after checkpoint");
        }
        Ok(outcome)
    }

    /// # Errors
    ///
    /// Returns `SessionError::Poisoned` if the polling task panicked mid-update.
    pub fn is_complete(&self) -> Result<bool, SessionError> {
        let guard = self.guard.lock().map_err(|_| SessionError::Poisoned)?;
        Ok(guard.is_complete())
    }

    /// # Errors
    ///
    /// Returns `SessionError::Poisoned` if the polling task panicked mid-update.
    pub fn pending_checkpoint(&self) -> Result<Option<CheckpointChallenge>, SessionError> {
        let guard = self.guard.lock().map_err(|_| SessionError::Poisoned)?;
        Ok(guard.pending_checkpoint().cloned())
    }

    /// Mark every checkpoint passed and return the ones that were skipped.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Poisoned` if the polling task panicked mid-update.
    pub fn force_complete(&self) -> Result<Vec<(CheckpointId, usize)>, SessionError> {
        let mut guard = self.guard.lock().map_err(|_| SessionError::Poisoned)?;
        Ok(guard.force_complete())
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel the polling task and wait for it to exit.
    pub async fn stop(&mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "playback task ended abnormally");
            }
        }
    }
}

impl Drop for PlaybackSupervisor {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn supervise(
    guard: Arc<Mutex<PlaybackGuard>>,
    player: Arc<dyn MediaPlayer>,
    player_turn: Arc<AsyncMutex<()>>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
    cancel_token: CancellationToken,
) {
    let poll_interval = match guard.lock() {
        Ok(guard) => guard.policy().poll_interval(),
        Err(_) => return,
    };
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(poll_interval = ?poll_interval, "playback supervision started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let _turn = player_turn.lock().await;
                let reported = match player.position().await {
                    Ok(position) => position,
                    Err(err) => {
                        warn!(error = %err, "failed to read player position");
                        let _ = events.send(PlaybackEvent::PlayerFailed { message: err.0 });
                        continue;
                    }
                };

                let (directive, pending) = match guard.lock() {
                    Ok(mut guard) => {
                        let directive = guard.observe(reported);
                        (directive, guard.pending_checkpoint().cloned())
                    }
                    Err(_) => {
                        warn!("playback guard poisoned; stopping supervision");
                        break;
                    }
                };

                if apply(&*player, &events, reported, directive, pending).await {
                    info!("video watched to the end");
                    break;
                }
            }
            () = cancel_token.cancelled() => {
                info!("playback supervision cancelled");
                break;
            }
        }
    }
}

/// Carry out one directive. Returns `true` once playback is complete.
async fn apply(
    player: &dyn MediaPlayer,
    events: &mpsc::UnboundedSender<PlaybackEvent>,
    reported: f64,
    directive: PlaybackDirective,
    pending: Option<CheckpointChallenge>,
) -> bool {
    let result = match directive {
        PlaybackDirective::Continue => Ok(()),
        PlaybackDirective::SeekBack { to } => {
            debug!(reported, to, "forward seek undone");
            let result = player.seek(to).await;
            let _ = events.send(PlaybackEvent::SeekCorrected { to_secs: to });
            result
        }
        PlaybackDirective::PauseForCheckpoint { checkpoint, at } => {
            debug!(%checkpoint, at, "pausing for checkpoint");
            let result = player.pause().await;
            if let Some(challenge) = pending {
                let _ = events.send(PlaybackEvent::CheckpointReached {
                    checkpoint: challenge,
                    at_secs: at,
                });
            }
            result
        }
        PlaybackDirective::Hold { at } => {
            // keep the player parked while a checkpoint is open
            if (reported - at).abs() > f64::EPSILON {
                match player.seek(at).await {
                    Ok(()) => player.pause().await,
                    Err(err) => Err(err),
                }
            } else {
                Ok(())
            }
        }
        PlaybackDirective::Complete => {
            let _ = events.send(PlaybackEvent::Completed);
            return true;
        }
    };

    if let Err(err) = result {
        warn!(error = %err, "player rejected playback correction");
        let _ = events.send(PlaybackEvent::PlayerFailed { message: err.0 });
    }
    false
}
