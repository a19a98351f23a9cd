//! Lesson CLI
//!
//! Seeds topic content, reports what a learner may study next, and runs
//! simulated sessions through the orchestrator.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use lesson_core::Phase;
use lesson_core::model::{Eligibility, LearnerId, TopicId};
use services::{AppServices, Clock, ServicesConfig};
use storage::repository::Storage;
use storage::sqlite::SqliteRepository;
use tracing_subscriber::EnvFilter;

mod demo;
mod simulate;

use simulate::SimulationOptions;

/// Lesson session orchestrator
///
/// Runs the inquiry, video, quiz and case-study lesson flow and schedules
/// spaced reviews.
#[derive(Parser, Debug)]
#[command(name = "lesson")]
#[command(version, about, long_about = None)]
struct Args {
    /// `SQLite` database URL (default: `LESSON_DB_URL` or ./lesson.db)
    #[arg(long, global = true, value_name = "URL")]
    db: Option<String>,

    /// JSON session policy file (default: `LESSON_POLICY_FILE`)
    #[arg(long, global = true, value_name = "FILE")]
    policy: Option<PathBuf>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or upgrade the database schema
    Migrate,

    /// Store the built-in demo topic
    Seed {
        #[arg(long, default_value_t = 1)]
        topic: u64,
    },

    /// Show which session each topic offers a learner
    Status {
        #[arg(long)]
        learner: u64,
    },

    /// Run a full session with a scripted learner and player
    Simulate {
        #[arg(long)]
        learner: u64,

        #[arg(long, default_value_t = 1)]
        topic: u64,

        /// Probability that each answer is correct
        #[arg(long, default_value_t = 0.8)]
        accuracy: f64,

        /// Attempts allowed, counting restarts after a failed result
        #[arg(long, default_value_t = 2)]
        max_attempts: u32,

        /// Position poll interval in milliseconds
        #[arg(long, default_value_t = 50)]
        poll_ms: u64,

        /// Media seconds the simulated player advances per poll
        #[arg(long, default_value_t = 1.0)]
        step_secs: f64,

        /// Seed for the simulated learner
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Force-complete this phase instead of playing it (repeatable)
        #[arg(long, value_enum, requires = "override_token")]
        skip: Vec<SkipPhase>,

        /// Override token authorising --skip
        #[arg(long, value_name = "TOKEN")]
        override_token: Option<String>,
    },
}

/// Phases that can be force-completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SkipPhase {
    Inquiry,
    Video,
    Quiz,
    CaseStudy,
}

impl From<SkipPhase> for Phase {
    fn from(phase: SkipPhase) -> Self {
        match phase {
            SkipPhase::Inquiry => Phase::Inquiry,
            SkipPhase::Video => Phase::Video,
            SkipPhase::Quiz => Phase::Quiz,
            SkipPhase::CaseStudy => Phase::CaseStudy,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = ServicesConfig::from_env();
    if let Some(db) = args.db {
        config.db_url = db;
    }
    if let Some(policy) = args.policy {
        config.policy_file = Some(policy);
    }
    tracing::debug!(db_url = %config.db_url, policy_file = ?config.policy_file, "configuration");

    match args.command {
        Command::Migrate => migrate(&config).await,
        Command::Seed { topic } => seed(&config, TopicId::new(topic)).await,
        Command::Status { learner } => status(&config, LearnerId::new(learner)).await,
        Command::Simulate {
            learner,
            topic,
            accuracy,
            max_attempts,
            poll_ms,
            step_secs,
            seed,
            skip,
            override_token,
        } => {
            let options = SimulationOptions {
                learner_id: LearnerId::new(learner),
                topic_id: TopicId::new(topic),
                accuracy,
                step_secs,
                max_attempts: max_attempts.max(1),
                seed,
                skip: skip.into_iter().map(Phase::from).collect(),
                override_token,
            };
            simulate(&config, poll_ms, options).await
        }
    }
}

async fn migrate(config: &ServicesConfig) -> anyhow::Result<()> {
    let repo = SqliteRepository::connect(&config.db_url)
        .await
        .with_context(|| format!("failed to open {}", config.db_url))?;
    repo.migrate().await.context("migration failed")?;
    println!("Schema is up to date: {}", config.db_url);
    Ok(())
}

async fn seed(config: &ServicesConfig, topic_id: TopicId) -> anyhow::Result<()> {
    let storage = Storage::sqlite(&config.db_url).await?;
    let content = demo::demo_topic(topic_id)?;
    storage.content.insert_topic_content(&content).await?;
    tracing::info!(topic = %topic_id, "demo topic stored");
    println!("Seeded topic {topic_id}:");
    println!("  Video: {}s, {} checkpoints", demo::DEMO_VIDEO_SECS, content.checkpoints.len());
    println!("  Quiz pool: {} items", content.quiz_pool.len());
    Ok(())
}

async fn status(config: &ServicesConfig, learner_id: LearnerId) -> anyhow::Result<()> {
    let services = AppServices::new_sqlite(config, Clock::System).await?;
    let orchestrator = services.orchestrator();
    let topics = services.storage().content.topic_ids().await?;
    if topics.is_empty() {
        println!("No topics stored. Run `lesson seed` first.");
        return Ok(());
    }

    println!("Learner {learner_id}:");
    for topic_id in topics {
        let line = match orchestrator.plan_session(learner_id, topic_id).await? {
            Eligibility::NewTopic => "first pass available".to_string(),
            Eligibility::ReviewDue { urgency } => format!("review due ({urgency})"),
            Eligibility::NotYetDue { next_review_date } => {
                format!("next review {}", next_review_date.format("%Y-%m-%d %H:%M UTC"))
            }
        };
        println!("  topic {topic_id}: {line}");
    }

    let due = services
        .storage()
        .review_states
        .due_reviews(learner_id, orchestrator.clock().now())
        .await?;
    println!("{} review(s) due", due.len());
    Ok(())
}

async fn simulate(
    config: &ServicesConfig,
    poll_ms: u64,
    options: SimulationOptions,
) -> anyhow::Result<()> {
    let mut policy = config.load_policy()?;
    policy.playback.poll_interval_ms = poll_ms;
    policy.validate()?;
    options.validate(&policy.playback)?;

    let storage = Storage::sqlite(&config.db_url).await?;
    let services = AppServices::with_storage(config, storage, policy, Clock::System);
    let outcome = simulate::run_session(&services.orchestrator(), &options).await?;

    println!();
    println!("=== Session Summary ===");
    println!("Session: {}", outcome.session_id);
    println!(
        "Score: {} ({})",
        outcome.score.final_score,
        if outcome.score.passed { "passed" } else { "failed" }
    );
    match outcome.schedule.next_review_date() {
        Some(next) => println!("Next review: {}", next.format("%Y-%m-%d %H:%M UTC")),
        None => println!("Review schedule unchanged"),
    }
    Ok(())
}
