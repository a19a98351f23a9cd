mod case_study;
mod choice;
mod item;
mod media;
mod text;

pub use case_study::{CASE_STUDY_PARTS, CaseStudy, CaseStudyError, CaseStudyQuestion};
pub use choice::{ChoiceError, ChoiceSet};
pub use item::{ContentError, ContentItem, Difficulty, ParseDifficultyError};
pub use media::{CheckpointChallenge, MediaUri, MediaValidationError, VideoAsset};
pub use text::{PromptText, TextError};
