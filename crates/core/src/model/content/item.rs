use std::fmt;
use std::str::FromStr;

use rand::Rng;
use thiserror::Error;

use super::choice::{ChoiceError, ChoiceSet};
use super::media::MediaValidationError;
use super::text::{PromptText, TextError};
use crate::model::ids::ItemId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ContentError {
    #[error("invalid prompt: {0}")]
    Prompt(#[source] TextError),

    #[error("invalid choices: {0}")]
    Choices(#[source] ChoiceError),

    #[error(transparent)]
    Media(#[from] MediaValidationError),
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

/// Difficulty tag attached to every quiz item by the content pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown difficulty: {0}")]
pub struct ParseDifficultyError(String);

impl FromStr for Difficulty {
    type Err = ParseDifficultyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(ParseDifficultyError(other.to_owned())),
        }
    }
}

//
// ─── CONTENT ITEM ──────────────────────────────────────────────────────────────
//

/// A multiple-choice quiz question. Read-only to the session core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    id: ItemId,
    prompt: PromptText,
    choices: ChoiceSet,
    difficulty: Difficulty,
}

impl ContentItem {
    /// # Errors
    ///
    /// Returns `ContentError` if the prompt is blank or the choices are invalid.
    pub fn new(
        id: ItemId,
        prompt: impl Into<String>,
        choices: Vec<String>,
        correct: usize,
        difficulty: Difficulty,
    ) -> Result<Self, ContentError> {
        let prompt = PromptText::parse(prompt).map_err(ContentError::Prompt)?;
        let choices = ChoiceSet::new(choices, correct).map_err(ContentError::Choices)?;
        Ok(Self {
            id,
            prompt,
            choices,
            difficulty,
        })
    }

    #[must_use]
    pub fn id(&self) -> ItemId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        self.prompt.as_str()
    }

    #[must_use]
    pub fn choices(&self) -> &ChoiceSet {
        &self.choices
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Same item with its choice order shuffled.
    #[must_use]
    pub fn with_shuffled_choices<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        Self {
            id: self.id,
            prompt: self.prompt.clone(),
            choices: self.choices.shuffled(rng),
            difficulty: self.difficulty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("Hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!(" easy ".parse::<Difficulty>().unwrap(), Difficulty::Easy);
        assert!("extreme".parse::<Difficulty>().is_err());
    }

    #[test]
    fn difficulty_display_matches_storage_tag() {
        for d in Difficulty::ALL {
            assert_eq!(d.to_string().parse::<Difficulty>().unwrap(), d);
        }
    }

    #[test]
    fn blank_prompt_is_rejected() {
        let err = ContentItem::new(
            ItemId::new(1),
            "  ",
            vec!["a".into(), "b".into()],
            0,
            Difficulty::Easy,
        )
        .unwrap_err();
        assert!(matches!(err, ContentError::Prompt(TextError::Empty)));
    }

    #[test]
    fn invalid_choices_are_rejected() {
        let err = ContentItem::new(
            ItemId::new(1),
            "What?",
            vec!["a".into(), "b".into()],
            5,
            Difficulty::Medium,
        )
        .unwrap_err();
        assert!(matches!(err, ContentError::Choices(_)));
    }
}
