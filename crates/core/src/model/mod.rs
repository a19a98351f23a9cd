mod attempt;
pub mod content;
mod grade;
mod ids;
mod review;
mod session;
mod topic;

pub use content::{
    CASE_STUDY_PARTS, CaseStudy, CaseStudyError, CaseStudyQuestion, CheckpointChallenge,
    ChoiceError, ChoiceSet, ContentError, ContentItem, Difficulty, MediaUri, ParseDifficultyError,
    MediaValidationError, PromptText, TextError, VideoAsset,
};
pub use ids::{CheckpointId, ItemId, LearnerId, ParseIdError, SessionId, TopicId};

pub use attempt::{AttemptOrigin, AttemptRecord, AttemptTarget, ParseTagError, SessionKind};
pub use grade::{GradeError, GradeReport, GradeSource, GradedPart, PartScore};
pub use review::{Eligibility, ReviewState, UrgencyStatus};
pub use session::{LearningSessionError, LearningSessionRecord};
pub use topic::TopicContent;
