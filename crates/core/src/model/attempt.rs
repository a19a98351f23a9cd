use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{CheckpointId, ItemId, LearnerId, SessionId};

//
// ─── SESSION KIND ──────────────────────────────────────────────────────────────
//

/// Which flow a session runs: the first pass over a topic or a later review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// Inquiry → Video → Quiz → CaseStudy → Results.
    NewTopic,
    /// Quiz → Results.
    Review,
}

impl SessionKind {
    /// Tag used when persisting attempts and sessions.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKind::NewTopic => "new_topic",
            SessionKind::Review => "review",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseTagError {
    kind: &'static str,
    value: String,
}

impl ParseTagError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

impl FromStr for SessionKind {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new_topic" => Ok(SessionKind::NewTopic),
            "review" => Ok(SessionKind::Review),
            other => Err(ParseTagError::new("session kind", other)),
        }
    }
}

//
// ─── ORIGIN ────────────────────────────────────────────────────────────────────
//

/// Whether a record came from the learner or was synthesized by a privileged
/// force-complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptOrigin {
    Learner,
    Override,
}

impl AttemptOrigin {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptOrigin::Learner => "learner",
            AttemptOrigin::Override => "override",
        }
    }
}

impl FromStr for AttemptOrigin {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "learner" => Ok(AttemptOrigin::Learner),
            "override" => Ok(AttemptOrigin::Override),
            other => Err(ParseTagError::new("attempt origin", other)),
        }
    }
}

//
// ─── ATTEMPT RECORD ────────────────────────────────────────────────────────────
//

/// What was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptTarget {
    Quiz(ItemId),
    Checkpoint(CheckpointId),
}

impl AttemptTarget {
    #[must_use]
    pub fn is_quiz(&self) -> bool {
        matches!(self, AttemptTarget::Quiz(_))
    }

    #[must_use]
    pub fn is_checkpoint(&self) -> bool {
        matches!(self, AttemptTarget::Checkpoint(_))
    }
}

/// One learner response. Appended to the session, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub learner_id: LearnerId,
    pub session_id: SessionId,
    pub target: AttemptTarget,
    pub selected: usize,
    pub correct: bool,
    pub latency_ms: u64,
    pub kind: SessionKind,
    pub origin: AttemptOrigin,
    pub recorded_at: DateTime<Utc>,
}
