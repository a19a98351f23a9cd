//! Built-in demo topic for `lesson seed` and `lesson simulate`.

use anyhow::Result;
use lesson_core::model::{
    CaseStudy, CheckpointChallenge, CheckpointId, ContentItem, Difficulty, ItemId, MediaUri,
    PromptText, TopicContent, TopicId, VideoAsset,
};

pub const DEMO_VIDEO_URL: &str = "https://media.example.org/lessons/backpressure.mp4";
pub const DEMO_VIDEO_SECS: f64 = 60.0;

const QUIZ: &[(Difficulty, &str, [&str; 4])] = &[
    (Difficulty::Easy, "What is a queue's arrival rate?", ["Requests arriving per second", "Requests served per second", "Queue length", "Timeout"]),
    (Difficulty::Easy, "What happens when arrivals exceed service rate?", ["The queue grows", "The queue shrinks", "Nothing", "Latency drops"]),
    (Difficulty::Easy, "Which metric rises first under overload?", ["Latency", "Error budget", "CPU frequency", "Disk size"]),
    (Difficulty::Easy, "What does a bounded queue do when full?", ["Rejects or blocks new work", "Grows without limit", "Drops the oldest config", "Restarts"]),
    (Difficulty::Easy, "What is backpressure?", ["Signalling producers to slow down", "Retrying faster", "Adding logs", "Caching results"]),
    (Difficulty::Easy, "Where is load shedding applied?", ["At the edge, before expensive work", "After the database write", "In the log pipeline", "Nowhere"]),
    (Difficulty::Medium, "Why do retries amplify overload?", ["They add work while capacity is exhausted", "They reduce latency", "They are free", "They bypass queues"]),
    (Difficulty::Medium, "What does Little's law relate?", ["Queue length, arrival rate and wait time", "CPU and memory", "Errors and retries", "Disk and network"]),
    (Difficulty::Medium, "Why add jitter to retries?", ["To avoid synchronized retry storms", "To slow the client down forever", "To encrypt requests", "To sort requests"]),
    (Difficulty::Medium, "What does a circuit breaker prevent?", ["Calling a dependency that keeps failing", "All network calls", "Logging", "Deploys"]),
    (Difficulty::Medium, "What is a good queue timeout?", ["Shorter than the caller's deadline", "Infinite", "Longer than the caller's deadline", "Zero"]),
    (Difficulty::Medium, "Why prefer LIFO under overload?", ["Fresh requests are still worth serving", "It is fair", "It is simpler", "It uses less memory"]),
    (Difficulty::Hard, "Utilisation near 100% makes wait time...", ["Grow without bound", "Shrink", "Stay flat", "Become negative"]),
    (Difficulty::Hard, "Which signal best drives admission control?", ["Queueing delay", "Request size", "Host name", "Build number"]),
    (Difficulty::Hard, "What breaks when every tier retries three times?", ["Load multiplies per tier", "Nothing", "Latency halves", "Caches warm up"]),
];

/// Canned case-study answers used by the simulator.
pub const CASE_STUDY_ANSWERS: [&str; 4] = [
    "Queueing delay grew until requests timed out and clients retried.",
    "Bound the queue and reject early once delay passes the deadline.",
    "Use retry budgets with jitter so clients back off together less.",
    "Alert on queueing delay rather than CPU so overload shows up early.",
];

/// Demo lesson on overload and backpressure.
///
/// # Errors
///
/// Returns an error if any built-in content fails validation.
pub fn demo_topic(topic_id: TopicId) -> Result<TopicContent> {
    let checkpoints = vec![
        CheckpointChallenge::new(
            CheckpointId::new(1),
            15.0,
            "What grows first when a service is overloaded?",
            vec!["Queueing delay".into(), "Disk usage".into(), "Build time".into()],
            0,
        )?,
        CheckpointChallenge::new(
            CheckpointId::new(2),
            32.0,
            "What did the speaker add at the edge?",
            vec!["More logging".into(), "Load shedding".into()],
            1,
        )?,
        CheckpointChallenge::new(
            CheckpointId::new(3),
            50.0,
            "Why are synchronized retries dangerous?",
            vec![
                "They are slower".into(),
                "They cost more".into(),
                "They arrive as a burst".into(),
            ],
            2,
        )?,
    ];

    let quiz_pool = QUIZ
        .iter()
        .zip(1_u64..)
        .map(|((difficulty, prompt, choices), id)| {
            ContentItem::new(
                ItemId::new(id),
                *prompt,
                choices.iter().map(|c| (*c).to_string()).collect(),
                0,
                *difficulty,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let case_study = CaseStudy::new(
        "During a flash sale the checkout service's latency climbed from 80 ms to 9 s \
         and error rates spiked even though CPU stayed below 60%.",
        vec![
            ("What most likely caused the latency spike?".into(), "Unbounded queueing with client retries".into()),
            ("What would you change first?".into(), "Bound the queue and shed load early".into()),
            ("How should clients retry?".into(), "With budgets, backoff and jitter".into()),
            ("What should alerting watch?".into(), "Queueing delay or saturation, not CPU alone".into()),
        ],
    )?;

    Ok(TopicContent {
        topic_id,
        inquiry_prompt: Some(PromptText::parse(
            "Think of a service you depend on that slowed down under load. What do you think happened inside it?",
        )?),
        video: Some(VideoAsset::new(
            MediaUri::from_url(DEMO_VIDEO_URL)?,
            DEMO_VIDEO_SECS,
        )?),
        checkpoints,
        quiz_pool,
        case_study: Some(case_study),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::ContentSelector;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn demo_topic_fills_default_strata_and_review_size() {
        let topic = demo_topic(TopicId::new(1)).unwrap();
        let selector = ContentSelector::default();
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(selector.select_first_pass(&topic.quiz_pool, &mut rng).unwrap().len(), 10);
        assert_eq!(selector.select_review(&topic.quiz_pool, &mut rng).unwrap().len(), 10);
        assert!(topic
            .checkpoints
            .iter()
            .all(|cp| cp.timestamp_secs() < DEMO_VIDEO_SECS));
    }
}
