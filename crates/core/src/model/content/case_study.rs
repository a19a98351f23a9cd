use thiserror::Error;

use super::text::{PromptText, TextError};

/// Every case study has exactly this many free-response parts.
pub const CASE_STUDY_PARTS: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CaseStudyError {
    #[error("case study needs exactly {CASE_STUDY_PARTS} questions, got {0}")]
    WrongPartCount(usize),

    #[error("invalid scenario: {0}")]
    Scenario(#[source] TextError),

    #[error("invalid question {index}: {source}")]
    Question {
        index: usize,
        #[source]
        source: TextError,
    },
}

/// One free-response question together with the answer the grader compares against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseStudyQuestion {
    question: PromptText,
    expected_answer: String,
}

impl CaseStudyQuestion {
    #[must_use]
    pub fn question(&self) -> &str {
        self.question.as_str()
    }

    #[must_use]
    pub fn expected_answer(&self) -> &str {
        &self.expected_answer
    }
}

/// Scenario plus its four free-response questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseStudy {
    scenario: PromptText,
    questions: [CaseStudyQuestion; CASE_STUDY_PARTS],
}

impl CaseStudy {
    /// Build a case study from `(question, expected_answer)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `CaseStudyError` if the scenario or a question is blank, or if
    /// the number of questions is not `CASE_STUDY_PARTS`.
    pub fn new(
        scenario: impl Into<String>,
        questions: Vec<(String, String)>,
    ) -> Result<Self, CaseStudyError> {
        let scenario = PromptText::parse(scenario).map_err(CaseStudyError::Scenario)?;
        let count = questions.len();

        let parsed = questions
            .into_iter()
            .enumerate()
            .map(|(index, (question, expected_answer))| {
                PromptText::parse(question)
                    .map(|question| CaseStudyQuestion {
                        question,
                        expected_answer,
                    })
                    .map_err(|source| CaseStudyError::Question { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let questions: [CaseStudyQuestion; CASE_STUDY_PARTS] = parsed
            .try_into()
            .map_err(|_| CaseStudyError::WrongPartCount(count))?;

        Ok(Self {
            scenario,
            questions,
        })
    }

    #[must_use]
    pub fn scenario(&self) -> &str {
        self.scenario.as_str()
    }

    #[must_use]
    pub fn questions(&self) -> &[CaseStudyQuestion; CASE_STUDY_PARTS] {
        &self.questions
    }
}
