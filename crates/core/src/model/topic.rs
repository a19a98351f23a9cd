use crate::model::content::{CaseStudy, CheckpointChallenge, ContentItem, PromptText, VideoAsset};
use crate::model::ids::TopicId;

/// Everything the content pipeline supplies for one topic.
///
/// Fields are optional because authoring happens elsewhere; the orchestrator
/// decides which gaps are fatal for the flow being started.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicContent {
    pub topic_id: TopicId,
    pub inquiry_prompt: Option<PromptText>,
    pub video: Option<VideoAsset>,
    pub checkpoints: Vec<CheckpointChallenge>,
    pub quiz_pool: Vec<ContentItem>,
    pub case_study: Option<CaseStudy>,
}

impl TopicContent {
    #[must_use]
    pub fn empty(topic_id: TopicId) -> Self {
        Self {
            topic_id,
            inquiry_prompt: None,
            video: None,
            checkpoints: Vec::new(),
            quiz_pool: Vec::new(),
            case_study: None,
        }
    }
}
