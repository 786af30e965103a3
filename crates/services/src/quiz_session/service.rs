use std::sync::Arc;
use std::time::Duration;

use quiz_core::Clock;
use quiz_core::model::SessionKey;
use storage::TimerStore;

use crate::api::QuizApi;

use super::controller::QuizSessionController;
use super::ticker::TICK_PERIOD;

/// Builds quiz session controllers from shared dependencies.
#[derive(Clone)]
pub struct QuizSessionService {
    clock: Clock,
    api: Arc<dyn QuizApi>,
    timers: TimerStore,
    tick_period: Duration,
}

impl QuizSessionService {
    #[must_use]
    pub fn new(clock: Clock, api: Arc<dyn QuizApi>, timers: TimerStore) -> Self {
        Self {
            clock,
            api,
            timers,
            tick_period: TICK_PERIOD,
        }
    }

    /// Override the countdown period, for demos and tests.
    #[must_use]
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// A fresh controller for `key`, still loading.
    #[must_use]
    pub fn open(&self, key: SessionKey) -> QuizSessionController {
        QuizSessionController::new(
            key,
            Arc::clone(&self.api),
            self.timers.clone(),
            self.clock.clone(),
            self.tick_period,
        )
    }
}
