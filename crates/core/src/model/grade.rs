use thiserror::Error;

use crate::model::content::CASE_STUDY_PARTS;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GradeError {
    #[error("part score must be 0, 0.5 or 1, got {0}")]
    InvalidPartScore(f64),

    #[error("expected {CASE_STUDY_PARTS} graded parts, got {0}")]
    WrongPartCount(usize),
}

/// Score for one free-response part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartScore {
    Zero,
    Half,
    Full,
}

impl PartScore {
    /// Strict conversion from the grader's numeric score.
    ///
    /// # Errors
    ///
    /// Returns `GradeError::InvalidPartScore` for anything other than 0, 0.5 or 1.
    pub fn from_value(value: f64) -> Result<Self, GradeError> {
        const TOLERANCE: f64 = 1e-6;
        if (value - 0.0).abs() < TOLERANCE {
            Ok(PartScore::Zero)
        } else if (value - 0.5).abs() < TOLERANCE {
            Ok(PartScore::Half)
        } else if (value - 1.0).abs() < TOLERANCE {
            Ok(PartScore::Full)
        } else {
            Err(GradeError::InvalidPartScore(value))
        }
    }

    /// Snap an arbitrary value onto the nearest half point within `[0, 1]`.
    /// Non-finite input counts as zero.
    #[must_use]
    pub fn nearest(value: f64) -> Self {
        if !value.is_finite() {
            return PartScore::Zero;
        }
        let snapped = (value.clamp(0.0, 1.0) * 2.0).round() / 2.0;
        Self::from_value(snapped).unwrap_or(PartScore::Zero)
    }

    #[must_use]
    pub fn value(self) -> f64 {
        match self {
            PartScore::Zero => 0.0,
            PartScore::Half => 0.5,
            PartScore::Full => 1.0,
        }
    }
}

/// Where a grade report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeSource {
    /// The external grading service returned this grade.
    Grader,
    /// The grader failed or timed out; a neutral default was substituted.
    Fallback,
    /// Synthesized by a privileged force-complete.
    Override,
}

impl GradeSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GradeSource::Grader => "grader",
            GradeSource::Fallback => "fallback",
            GradeSource::Override => "override",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedPart {
    pub score: PartScore,
    pub feedback: String,
}

impl GradedPart {
    #[must_use]
    pub fn new(score: PartScore, feedback: impl Into<String>) -> Self {
        Self {
            score,
            feedback: feedback.into(),
        }
    }
}

/// Grading result for the four case-study answers. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeReport {
    parts: [GradedPart; CASE_STUDY_PARTS],
    source: GradeSource,
}

impl GradeReport {
    #[must_use]
    pub fn new(parts: [GradedPart; CASE_STUDY_PARTS], source: GradeSource) -> Self {
        Self { parts, source }
    }

    /// # Errors
    ///
    /// Returns `GradeError::WrongPartCount` unless exactly `CASE_STUDY_PARTS` parts are given.
    pub fn from_vec(parts: Vec<GradedPart>, source: GradeSource) -> Result<Self, GradeError> {
        let len = parts.len();
        let parts: [GradedPart; CASE_STUDY_PARTS] = parts
            .try_into()
            .map_err(|_| GradeError::WrongPartCount(len))?;
        Ok(Self { parts, source })
    }

    /// Default used when the grading service is unavailable: half credit on
    /// every part.
    #[must_use]
    pub fn neutral() -> Self {
        let part = || {
            GradedPart::new(
                PartScore::Half,
                "Automatic grading was unavailable; a neutral score was recorded.",
            )
        };
        Self {
            parts: [part(), part(), part(), part()],
            source: GradeSource::Fallback,
        }
    }

    /// Full marks, recorded when a privileged override skips the case study.
    #[must_use]
    pub fn override_full_marks() -> Self {
        let part = || GradedPart::new(PartScore::Full, "Completed by override.");
        Self {
            parts: [part(), part(), part(), part()],
            source: GradeSource::Override,
        }
    }

    #[must_use]
    pub fn parts(&self) -> &[GradedPart; CASE_STUDY_PARTS] {
        &self.parts
    }

    #[must_use]
    pub fn source(&self) -> GradeSource {
        self.source
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.source == GradeSource::Fallback
    }

    /// Sum of part scores on the 0–4 scale.
    #[must_use]
    pub fn aggregate(&self) -> f64 {
        self.parts.iter().map(|p| p.score.value()).sum()
    }

    /// Aggregate converted to a percentage (×25).
    #[must_use]
    pub fn percent(&self) -> f64 {
        self.aggregate() * 25.0
    }
}
