use std::sync::Arc;

use lesson_core::{OverrideAuthorizer, SessionPolicy};
use storage::repository::Storage;
use tracing::info;

use crate::Clock;
use crate::config::ServicesConfig;
use crate::error::AppServicesError;
use crate::grading::HttpCaseStudyGrader;
use crate::sessions::SessionOrchestrator;

/// Assembles the orchestrator and its storage from configuration.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    orchestrator: Arc<SessionOrchestrator>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the policy cannot be loaded or storage
    /// initialization fails.
    pub async fn new_sqlite(config: &ServicesConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let policy = config.load_policy()?;
        let storage = Storage::sqlite(&config.db_url).await?;
        info!(db_url = %config.db_url, "storage ready");
        Ok(Self::with_storage(config, storage, policy, clock))
    }

    /// Build services over an existing storage bundle.
    #[must_use]
    pub fn with_storage(
        config: &ServicesConfig,
        storage: Storage,
        policy: SessionPolicy,
        clock: Clock,
    ) -> Self {
        let grader = HttpCaseStudyGrader::new(config.grader.clone());
        info!(
            grader_enabled = grader.enabled(),
            overrides_enabled = config.override_token.is_some(),
            "session services configured"
        );
        let orchestrator = SessionOrchestrator::new(clock, storage.clone(), Arc::new(grader), policy)
            .with_authorizer(OverrideAuthorizer::new(config.override_token.clone()));
        Self {
            storage,
            orchestrator: Arc::new(orchestrator),
        }
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn orchestrator(&self) -> Arc<SessionOrchestrator> {
        Arc::clone(&self.orchestrator)
    }
}
