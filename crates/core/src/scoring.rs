use std::collections::HashSet;

use thiserror::Error;

use crate::model::{AttemptRecord, AttemptTarget, GradeReport, SessionKind};
use crate::policy::SessionPolicy;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoringError {
    #[error("session has no quiz items to score")]
    NoQuizItems,

    #[error("first-pass session has no case-study grade")]
    MissingGrade,
}

//
// ─── BREAKDOWN ─────────────────────────────────────────────────────────────────
//

/// Final score of one session with its components.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub kind: SessionKind,
    pub quiz_correct: usize,
    pub quiz_total: usize,
    /// Share of quiz items answered correctly, 0–100.
    pub objective_percent: f64,
    /// Case-study aggregate on the 0–4 scale; first pass only.
    pub subjective_aggregate: Option<f64>,
    pub subjective_percent: Option<f64>,
    pub final_score: u32,
    pub passed: bool,
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Combines quiz attempts and the case-study grade into one percentage.
///
/// Pure: the same attempts and grade always give the same breakdown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringEngine {
    objective_weight: f64,
    subjective_weight: f64,
    pass_threshold: u32,
}

impl ScoringEngine {
    #[must_use]
    pub fn from_policy(policy: &SessionPolicy) -> Self {
        Self {
            objective_weight: policy.objective_weight,
            subjective_weight: policy.subjective_weight,
            pass_threshold: policy.pass_threshold,
        }
    }

    /// Score a session.
    ///
    /// `quiz_total` is the number of quiz items that were presented. Only
    /// correct quiz attempts count; checkpoint attempts are ignored. A review
    /// session's score is the quiz percentage alone and any grade is ignored.
    ///
    /// # Errors
    ///
    /// Returns `ScoringError::NoQuizItems` when `quiz_total` is 0, and
    /// `ScoringError::MissingGrade` for a first pass without a grade report.
    pub fn score(
        &self,
        kind: SessionKind,
        attempts: &[AttemptRecord],
        quiz_total: usize,
        grade: Option<&GradeReport>,
    ) -> Result<ScoreBreakdown, ScoringError> {
        if quiz_total == 0 {
            return Err(ScoringError::NoQuizItems);
        }

        let correct_items: HashSet<_> = attempts
            .iter()
            .filter(|a| a.correct)
            .filter_map(|a| match a.target {
                AttemptTarget::Quiz(item) => Some(item),
                AttemptTarget::Checkpoint(_) => None,
            })
            .collect();
        let quiz_correct = correct_items.len().min(quiz_total);
        #[allow(clippy::cast_precision_loss)]
        let objective_percent = quiz_correct as f64 / quiz_total as f64 * 100.0;

        let (subjective_aggregate, subjective_percent, raw) = match kind {
            SessionKind::NewTopic => {
                let grade = grade.ok_or(ScoringError::MissingGrade)?;
                let raw = objective_percent * self.objective_weight
                    + grade.percent() * self.subjective_weight;
                (Some(grade.aggregate()), Some(grade.percent()), raw)
            }
            SessionKind::Review => (None, None, objective_percent),
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let final_score = raw.round().clamp(0.0, 100.0) as u32;

        Ok(ScoreBreakdown {
            kind,
            quiz_correct,
            quiz_total,
            objective_percent,
            subjective_aggregate,
            subjective_percent,
            final_score,
            passed: final_score >= self.pass_threshold,
        })
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::from_policy(&SessionPolicy::default())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
