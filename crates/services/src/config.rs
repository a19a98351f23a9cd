use std::env;
use std::fs;
use std::path::PathBuf;

use lesson_core::SessionPolicy;

use crate::error::ConfigError;

pub const DEFAULT_DB_URL: &str = "sqlite://lesson.db?mode=rwc";

/// OpenAI-compatible chat-completions endpoint used for case-study grading.
#[derive(Clone, Debug)]
pub struct GraderConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl GraderConfig {
    /// Reads `LESSON_AI_API_KEY`, `LESSON_AI_BASE_URL` and `LESSON_AI_MODEL`.
    /// Returns `None` when no API key is set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("LESSON_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url =
            env::var("LESSON_AI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let model = env::var("LESSON_AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// Environment-driven settings for building the orchestrator.
#[derive(Clone, Debug)]
pub struct ServicesConfig {
    pub db_url: String,
    pub policy_file: Option<PathBuf>,
    pub grader: Option<GraderConfig>,
    pub override_token: Option<String>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            db_url: DEFAULT_DB_URL.to_string(),
            policy_file: None,
            grader: None,
            override_token: None,
        }
    }
}

impl ServicesConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            db_url: env::var("LESSON_DB_URL").unwrap_or_else(|_| DEFAULT_DB_URL.to_string()),
            policy_file: env::var_os("LESSON_POLICY_FILE").map(PathBuf::from),
            grader: GraderConfig::from_env(),
            override_token: env::var("LESSON_OVERRIDE_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
        }
    }

    /// The configured policy file, or defaults when none is set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::PolicyFile` if the file cannot be read, and
    /// `ConfigError::Policy` if it does not parse or validate.
    pub fn load_policy(&self) -> Result<SessionPolicy, ConfigError> {
        let Some(path) = &self.policy_file else {
            return Ok(SessionPolicy::default());
        };
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::PolicyFile {
            path: path.clone(),
            source,
        })?;
        Ok(SessionPolicy::from_json_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_policy_file_uses_defaults() {
        let config = ServicesConfig::default();
        let policy = config.load_policy().unwrap();
        assert_eq!(policy.pass_threshold, SessionPolicy::default().pass_threshold);
    }

    #[test]
    fn unreadable_policy_file_names_the_path() {
        let config = ServicesConfig {
            policy_file: Some(PathBuf::from("/nonexistent/lesson-policy.json")),
            ..ServicesConfig::default()
        };
        let err = config.load_policy().unwrap_err();
        assert!(matches!(err, ConfigError::PolicyFile { .. }));
        assert!(err.to_string().contains("lesson-policy.json"));
    }

    #[test]
    fn policy_file_is_parsed_and_validated() {
        let path = env::temp_dir().join(format!("lesson-policy-{}.json", std::process::id()));
        fs::write(&path, r#"{ "passThreshold": 80 }"#).unwrap();
        let config = ServicesConfig {
            policy_file: Some(path.clone()),
            ..ServicesConfig::default()
        };
        assert_eq!(config.load_policy().unwrap().pass_threshold, 80);

        fs::write(&path, r#"{ "passThreshold": 101 }"#).unwrap();
        assert!(matches!(
            config.load_policy().unwrap_err(),
            ConfigError::Policy(_)
        ));
        let _ = fs::remove_file(path);
    }
}
