//! Lesson phases and the rules for moving between them.
//!
//! A first pass runs `Inquiry → Video → Quiz → CaseStudy → Results`; a
//! review runs `Quiz → Results`. Every forward step is checked against a
//! [`PhaseGates`] snapshot. The only way around the gates is
//! [`force_transition`], which needs an [`OverrideGrant`].

use std::fmt;

use thiserror::Error;

use crate::model::SessionKind;

//
// ─── PHASES ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Inquiry,
    Video,
    Quiz,
    CaseStudy,
    Results,
}

impl Phase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Inquiry => "inquiry",
            Phase::Video => "video",
            Phase::Quiz => "quiz",
            Phase::CaseStudy => "case_study",
            Phase::Results => "results",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Phase::Results
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which sequence of phases a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionFlow {
    FirstPass,
    Review,
}

impl SessionFlow {
    const FIRST_PASS: [Phase; 5] = [
        Phase::Inquiry,
        Phase::Video,
        Phase::Quiz,
        Phase::CaseStudy,
        Phase::Results,
    ];
    const REVIEW: [Phase; 2] = [Phase::Quiz, Phase::Results];

    #[must_use]
    pub fn phases(self) -> &'static [Phase] {
        match self {
            SessionFlow::FirstPass => &Self::FIRST_PASS,
            SessionFlow::Review => &Self::REVIEW,
        }
    }

    #[must_use]
    pub fn initial_phase(self) -> Phase {
        match self {
            SessionFlow::FirstPass => Phase::Inquiry,
            SessionFlow::Review => Phase::Quiz,
        }
    }

    /// Where a failed attempt starts over. The inquiry is not repeated.
    #[must_use]
    pub fn restart_phase(self) -> Phase {
        match self {
            SessionFlow::FirstPass => Phase::Video,
            SessionFlow::Review => Phase::Quiz,
        }
    }

    #[must_use]
    pub fn contains(self, phase: Phase) -> bool {
        self.phases().contains(&phase)
    }

    #[must_use]
    pub fn next(self, phase: Phase) -> Option<Phase> {
        let phases = self.phases();
        phases
            .iter()
            .position(|p| *p == phase)
            .and_then(|i| phases.get(i + 1))
            .copied()
    }

    #[must_use]
    pub fn kind(self) -> SessionKind {
        match self {
            SessionFlow::FirstPass => SessionKind::NewTopic,
            SessionFlow::Review => SessionKind::Review,
        }
    }
}

impl From<SessionKind> for SessionFlow {
    fn from(kind: SessionKind) -> Self {
        match kind {
            SessionKind::NewTopic => SessionFlow::FirstPass,
            SessionKind::Review => SessionFlow::Review,
        }
    }
}

//
// ─── GATES ─────────────────────────────────────────────────────────────────────
//

/// Snapshot of everything the gates look at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseGates {
    /// Trimmed character count of the inquiry response.
    pub inquiry_len: usize,
    pub min_inquiry_chars: usize,
    pub playback_complete: bool,
    pub quiz_answered: usize,
    pub quiz_total: usize,
    pub grade_ready: bool,
}

/// Character count the inquiry gate compares against the minimum.
#[must_use]
pub fn inquiry_len(response: &str) -> usize {
    response.trim().chars().count()
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransitionRejected {
    #[error("inquiry response is {length} characters, at least {minimum} required")]
    InquiryTooShort { length: usize, minimum: usize },

    #[error("video has not been watched to the end with every checkpoint passed")]
    PlaybackIncomplete,

    #[error("{answered} of {total} quiz items answered")]
    QuizIncomplete { answered: usize, total: usize },

    #[error("case study has not been graded")]
    GradeMissing,

    #[error("session already reached its results")]
    SessionFinished,

    #[error("phase {phase} is not part of this flow")]
    NotInFlow { phase: Phase },

    #[error("only a failed session at its results can restart")]
    RestartNotAllowed,
}

/// Next phase if the gate for leaving `phase` is satisfied.
///
/// # Errors
///
/// Returns the reason the gate is closed, `SessionFinished` from `Results`,
/// or `NotInFlow` when `phase` does not belong to `flow`.
pub fn transition(
    flow: SessionFlow,
    phase: Phase,
    gates: &PhaseGates,
) -> Result<Phase, TransitionRejected> {
    let next = next_in_flow(flow, phase)?;
    match phase {
        Phase::Inquiry if gates.inquiry_len < gates.min_inquiry_chars => {
            Err(TransitionRejected::InquiryTooShort {
                length: gates.inquiry_len,
                minimum: gates.min_inquiry_chars,
            })
        }
        Phase::Video if !gates.playback_complete => Err(TransitionRejected::PlaybackIncomplete),
        Phase::Quiz if gates.quiz_total == 0 || gates.quiz_answered < gates.quiz_total => {
            Err(TransitionRejected::QuizIncomplete {
                answered: gates.quiz_answered,
                total: gates.quiz_total,
            })
        }
        Phase::CaseStudy if !gates.grade_ready => Err(TransitionRejected::GradeMissing),
        _ => Ok(next),
    }
}

/// Phase a restarted attempt begins in.
///
/// # Errors
///
/// Returns `RestartNotAllowed` unless the session is at `Results` with a
/// failing score.
pub fn restart_phase(
    flow: SessionFlow,
    phase: Phase,
    passed: bool,
) -> Result<Phase, TransitionRejected> {
    if phase.is_terminal() && !passed {
        Ok(flow.restart_phase())
    } else {
        Err(TransitionRejected::RestartNotAllowed)
    }
}

/// Advance past `phase` without checking its gate.
///
/// # Errors
///
/// Returns `SessionFinished` from `Results`, or `NotInFlow`.
pub fn force_transition(
    flow: SessionFlow,
    phase: Phase,
    _grant: &OverrideGrant,
) -> Result<Phase, TransitionRejected> {
    next_in_flow(flow, phase)
}

fn next_in_flow(flow: SessionFlow, phase: Phase) -> Result<Phase, TransitionRejected> {
    if !flow.contains(phase) {
        return Err(TransitionRejected::NotInFlow { phase });
    }
    flow.next(phase).ok_or(TransitionRejected::SessionFinished)
}

//
// ─── OVERRIDE ──────────────────────────────────────────────────────────────────
//

/// Proof that a privileged caller authorised a force-complete.
///
/// Only [`OverrideAuthorizer::authorize`] can create one.
#[derive(Debug)]
pub struct OverrideGrant {
    _private: (),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OverrideDenied {
    #[error("overrides are disabled")]
    Disabled,

    #[error("override token rejected")]
    InvalidToken,
}

/// Checks override tokens against a configured secret. With no secret,
/// every request is denied.
#[derive(Clone, Default)]
pub struct OverrideAuthorizer {
    secret: Option<String>,
}

impl OverrideAuthorizer {
    #[must_use]
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.trim().is_empty()),
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self { secret: None }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// # Errors
    ///
    /// Returns `OverrideDenied::Disabled` without a secret, `InvalidToken`
    /// on mismatch.
    pub fn authorize(&self, token: &str) -> Result<OverrideGrant, OverrideDenied> {
        let secret = self.secret.as_deref().ok_or(OverrideDenied::Disabled)?;
        if tokens_match(secret.as_bytes(), token.as_bytes()) {
            Ok(OverrideGrant { _private: () })
        } else {
            Err(OverrideDenied::InvalidToken)
        }
    }
}

impl fmt::Debug for OverrideAuthorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideAuthorizer")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

// No early exit on the first differing byte.
fn tokens_match(expected: &[u8], given: &[u8]) -> bool {
    if expected.len() != given.len() {
        return false;
    }
    expected
        .iter()
        .zip(given)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
