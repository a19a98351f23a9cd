use async_trait::async_trait;
use lesson_core::model::{CASE_STUDY_PARTS, GradeReport, GradeSource, GradedPart, PartScore};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CaseStudyGrader, GradingRequest};
use crate::config::GraderConfig;
use crate::error::GradingError;

const SYSTEM_PROMPT: &str = "You grade short free-response answers to a case study. \
Score each answer 0, 0.5 or 1 against its expected answer. Reply with JSON only: \
{\"parts\":[{\"index\":<n>,\"score\":<0|0.5|1>,\"feedback\":\"<one sentence>\"}]}";

/// Grades case studies with an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct HttpCaseStudyGrader {
    client: Client,
    config: Option<GraderConfig>,
}

impl HttpCaseStudyGrader {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(GraderConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<GraderConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl CaseStudyGrader for HttpCaseStudyGrader {
    async fn grade(&self, request: &GradingRequest) -> Result<GradeReport, GradingError> {
        let config = self.config.as_ref().ok_or(GradingError::Disabled)?;

        let url = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        let payload = ChatRequest {
            model: config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: build_prompt(request),
                },
            ],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GradingError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GradingError::EmptyResponse)?;

        debug!(model = %config.model, "case study graded");
        parse_grades(request, &content)
    }
}

/// Only answered parts are listed; blank ones are scored locally.
fn build_prompt(request: &GradingRequest) -> String {
    let mut prompt = format!("Scenario:\n{}\n", request.scenario.trim());
    for (index, part) in request.parts.iter().enumerate() {
        if part.is_blank() {
            continue;
        }
        prompt.push_str(&format!(
            "\nPart {index}\nQuestion: {}\nExpected answer: {}\nLearner answer: {}\n",
            part.question.trim(),
            part.expected_answer.trim(),
            part.answer.trim()
        ));
    }
    prompt
}

fn parse_grades(request: &GradingRequest, content: &str) -> Result<GradeReport, GradingError> {
    let parsed: GradedParts = serde_json::from_str(strip_code_fence(content))
        .map_err(|err| GradingError::MalformedResponse(err.to_string()))?;

    let mut slots: [Option<GradedPart>; CASE_STUDY_PARTS] = Default::default();
    for part in parsed.parts {
        let slot = slots.get_mut(part.index).ok_or_else(|| {
            GradingError::MalformedResponse(format!("part index {} out of range", part.index))
        })?;
        *slot = Some(GradedPart::new(
            PartScore::nearest(part.score),
            part.feedback.unwrap_or_default(),
        ));
    }

    let mut parts = Vec::with_capacity(CASE_STUDY_PARTS);
    for (index, (slot, asked)) in slots.into_iter().zip(&request.parts).enumerate() {
        match slot {
            Some(graded) if !asked.is_blank() => parts.push(graded),
            _ if asked.is_blank() => parts.push(GradedPart::new(PartScore::Zero, "")),
            _ => {
                return Err(GradingError::MalformedResponse(format!(
                    "no grade for part {index}"
                )));
            }
        }
    }
    GradeReport::from_vec(parts, GradeSource::Grader)
        .map_err(|err| GradingError::MalformedResponse(err.to_string()))
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[derive(Debug, Deserialize)]
struct GradedParts {
    parts: Vec<GradedPartResponse>,
}

#[derive(Debug, Deserialize)]
struct GradedPartResponse {
    index: usize,
    score: f64,
    feedback: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}
