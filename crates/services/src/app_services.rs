use std::sync::Arc;

use storage::{Storage, TimerStore};

use crate::Clock;
use crate::api::{ApiContext, AuthContext, HttpQuizApi, QuizApi};
use crate::config::ClientConfig;
use crate::error::AppServicesError;
use crate::quiz_session::QuizSessionService;
use crate::results::ResultService;

/// Assembles app-facing services around one API context and storage backend.
#[derive(Clone)]
pub struct AppServices {
    api: ApiContext,
    quiz_sessions: Arc<QuizSessionService>,
    results: Arc<ResultService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, falling back to memory when the
    /// database cannot be opened.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the HTTP client cannot be built.
    pub async fn new_sqlite(config: &ClientConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = match Storage::sqlite(&config.db_url).await {
            Ok(storage) => storage,
            Err(err) => {
                tracing::warn!(
                    db_url = %config.db_url,
                    error = %err,
                    "timer persistence unavailable; using in-memory storage"
                );
                Storage::in_memory()
            }
        };
        Self::new(config, storage, clock)
    }

    /// # Errors
    ///
    /// Returns `AppServicesError` if the HTTP client cannot be built.
    pub fn new(
        config: &ClientConfig,
        storage: Storage,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let auth = config
            .tokens
            .clone()
            .map_or_else(AuthContext::new, AuthContext::with_tokens);
        let api = ApiContext::new(config.api.clone(), auth)?;
        let quiz_api: Arc<dyn QuizApi> = Arc::new(HttpQuizApi::new(api.clone()));
        Ok(Self::with_api(api, quiz_api, storage, clock))
    }

    /// Assemble around an existing gateway.
    #[must_use]
    pub fn with_api(
        api: ApiContext,
        quiz_api: Arc<dyn QuizApi>,
        storage: Storage,
        clock: Clock,
    ) -> Self {
        let timers = TimerStore::new(Arc::clone(&storage.kv));
        let quiz_sessions = Arc::new(QuizSessionService::new(
            clock,
            Arc::clone(&quiz_api),
            timers,
        ));
        let results = Arc::new(ResultService::new(quiz_api));
        Self {
            api,
            quiz_sessions,
            results,
        }
    }

    #[must_use]
    pub fn api(&self) -> &ApiContext {
        &self.api
    }

    #[must_use]
    pub fn quiz_sessions(&self) -> Arc<QuizSessionService> {
        Arc::clone(&self.quiz_sessions)
    }

    #[must_use]
    pub fn results(&self) -> Arc<ResultService> {
        Arc::clone(&self.results)
    }
}
