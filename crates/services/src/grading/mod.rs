//! Free-response grading for the case-study phase.

mod http;

use std::time::Duration;

use async_trait::async_trait;
use lesson_core::model::{
    CASE_STUDY_PARTS, CaseStudy, GradeReport, GradeSource, GradedPart, PartScore,
};
use tracing::{debug, warn};

use crate::error::GradingError;

pub use http::HttpCaseStudyGrader;

const NO_ANSWER_FEEDBACK: &str = "No answer was given.";

/// One question of the case study together with the learner's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradingPart {
    pub question: String,
    pub expected_answer: String,
    pub answer: String,
}

impl GradingPart {
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.answer.trim().is_empty()
    }
}

/// Everything a grader sees for one case-study submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradingRequest {
    pub scenario: String,
    pub parts: [GradingPart; CASE_STUDY_PARTS],
}

impl GradingRequest {
    #[must_use]
    pub fn new(case_study: &CaseStudy, answers: &[String; CASE_STUDY_PARTS]) -> Self {
        let questions = case_study.questions();
        Self {
            scenario: case_study.scenario().to_string(),
            parts: std::array::from_fn(|i| GradingPart {
                question: questions[i].question().to_string(),
                expected_answer: questions[i].expected_answer().to_string(),
                answer: answers[i].clone(),
            }),
        }
    }

    #[must_use]
    pub fn all_blank(&self) -> bool {
        self.parts.iter().all(GradingPart::is_blank)
    }
}

/// External scorer for the four free-response answers.
#[async_trait]
pub trait CaseStudyGrader: Send + Sync {
    /// # Errors
    ///
    /// Returns `GradingError` when the grader is unavailable or its reply
    /// cannot be turned into a report.
    async fn grade(&self, request: &GradingRequest) -> Result<GradeReport, GradingError>;
}

/// Grade a submission, never failing.
///
/// Blank answers score zero without being sent anywhere. A grader error or
/// a reply slower than `timeout` yields [`GradeReport::neutral`], which is
/// flagged as a fallback.
pub async fn grade_with_fallback(
    grader: &dyn CaseStudyGrader,
    request: &GradingRequest,
    timeout: Duration,
) -> GradeReport {
    if request.all_blank() {
        debug!("every case study answer is blank; skipping grader");
        return zero_blank_parts(request, GradeReport::neutral(), GradeSource::Grader);
    }

    let report = match tokio::time::timeout(timeout, grader.grade(request)).await {
        Ok(Ok(report)) => report,
        Ok(Err(err)) => {
            warn!(error = %err, "case study grading failed; recording neutral grade");
            GradeReport::neutral()
        }
        Err(_) => {
            warn!(
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "case study grading timed out; recording neutral grade"
            );
            GradeReport::neutral()
        }
    };
    let source = report.source();
    zero_blank_parts(request, report, source)
}

fn zero_blank_parts(
    request: &GradingRequest,
    report: GradeReport,
    source: GradeSource,
) -> GradeReport {
    if source == report.source() && !request.parts.iter().any(GradingPart::is_blank) {
        return report;
    }
    let mut parts = report.parts().clone();
    for (part, graded) in request.parts.iter().zip(parts.iter_mut()) {
        if part.is_blank() {
            *graded = GradedPart::new(PartScore::Zero, NO_ANSWER_FEEDBACK);
        }
    }
    GradeReport::new(parts, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedGrader {
        report: Result<GradeReport, ()>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FixedGrader {
        fn ok(report: GradeReport) -> Self {
            Self {
                report: Ok(report),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CaseStudyGrader for FixedGrader {
        async fn grade(&self, _request: &GradingRequest) -> Result<GradeReport, GradingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.report.clone().map_err(|()| GradingError::EmptyResponse)
        }
    }

    fn request(answers: [&str; CASE_STUDY_PARTS]) -> GradingRequest {
        let case_study = CaseStudy::new(
            "A cache stampede takes down the database.",
            (1..=4)
                .map(|i| (format!("Question {i}?"), format!("Expected {i}")))
                .collect(),
        )
        .unwrap();
        GradingRequest::new(&case_study, &answers.map(String::from))
    }

    fn full_marks() -> GradeReport {
        GradeReport::new(
            std::array::from_fn(|_| GradedPart::new(PartScore::Full, "good")),
            GradeSource::Grader,
        )
    }

    #[tokio::test]
    async fn grader_report_is_used_as_is() {
        let grader = FixedGrader::ok(full_marks());
        let report =
            grade_with_fallback(&grader, &request(["a", "b", "c", "d"]), Duration::from_secs(1))
                .await;
        assert_eq!(report, full_marks());
    }

    #[tokio::test]
    async fn grader_error_falls_back_to_neutral() {
        let grader = FixedGrader {
            report: Err(()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        };
        let report =
            grade_with_fallback(&grader, &request(["a", "b", "c", "d"]), Duration::from_secs(1))
                .await;
        assert!(report.is_fallback());
        assert!((report.aggregate() - 2.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_grader_times_out_to_neutral() {
        let grader = FixedGrader {
            report: Ok(full_marks()),
            delay: Duration::from_secs(60),
            calls: AtomicUsize::new(0),
        };
        let report =
            grade_with_fallback(&grader, &request(["a", "b", "c", "d"]), Duration::from_secs(30))
                .await;
        assert!(report.is_fallback());
        assert!((report.aggregate() - 2.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn blank_answers_score_zero() {
        let grader = FixedGrader::ok(full_marks());
        let report =
            grade_with_fallback(&grader, &request(["a", "  ", "c", ""]), Duration::from_secs(1))
                .await;
        assert!((report.aggregate() - 2.0).abs() < f64::EPSILON);
        assert_eq!(report.parts()[1].score, PartScore::Zero);
        assert_eq!(report.parts()[3].score, PartScore::Zero);
        assert_eq!(report.source(), GradeSource::Grader);
    }

    #[tokio::test]
    async fn all_blank_submission_never_reaches_grader() {
        let grader = FixedGrader::ok(full_marks());
        let report =
            grade_with_fallback(&grader, &request(["", " ", "\n", ""]), Duration::from_secs(1))
                .await;
        assert_eq!(grader.calls.load(Ordering::SeqCst), 0);
        assert!(report.aggregate().abs() < f64::EPSILON);
        assert!(!report.is_fallback());
    }
}
