#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod phase;
pub mod playback;
pub mod policy;
pub mod scheduler;
pub mod scoring;
pub mod selector;
pub mod time;

pub use error::Error;
pub use phase::{OverrideAuthorizer, OverrideGrant, Phase, PhaseGates, SessionFlow};
pub use playback::{CheckpointOutcome, PlaybackDirective, PlaybackGuard};
pub use policy::SessionPolicy;
pub use scheduler::{ReviewScheduler, ScheduleOutcome};
pub use scoring::{ScoreBreakdown, ScoringEngine};
pub use selector::ContentSelector;
pub use time::Clock;
