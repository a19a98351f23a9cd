mod context;
mod orchestrator;
mod playback_task;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use context::{PersistProgress, SessionContext};
pub use orchestrator::{QuizAnswer, SessionOrchestrator, SessionOutcome};
pub use playback_task::{MediaPlayer, PlaybackEvent, PlaybackSupervisor, PlayerError};
