use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use quiz_core::Clock;
use quiz_core::model::{
    LoadOutcome, OptionOrder, QuestionId, QuizSession, SessionError, SessionKey, SessionStatus,
    SubmitTrigger, TickOutcome,
};
use storage::TimerStore;

use crate::api::QuizApi;
use crate::error::ControllerError;

use super::events::{SessionEvent, SessionHandle, SessionOutcome, SessionSnapshot};
use super::ticker::Ticker;

/// Whether the controller keeps consuming events after one was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFlow {
    Continue,
    Finished(SessionOutcome),
}

/// Drives one [`QuizSession`] against the API, the timer store and a ticker.
///
/// All inputs arrive on a single queue, so the countdown, answer selection and
/// the submission gate never race each other. Once [`run`](Self::run) starts,
/// the queue stays open only while a [`SessionHandle`] exists; dropping the last
/// one unmounts the session.
pub struct QuizSessionController {
    session: QuizSession,
    api: Arc<dyn QuizApi>,
    timers: TimerStore,
    clock: Clock,
    tick_period: Duration,
    events_tx: Option<mpsc::UnboundedSender<SessionEvent>>,
    events_weak: mpsc::WeakUnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    updates: watch::Sender<SessionSnapshot>,
    ticker: Option<Ticker>,
    persist_failing: bool,
}

impl QuizSessionController {
    pub(crate) fn new(
        key: SessionKey,
        api: Arc<dyn QuizApi>,
        timers: TimerStore,
        clock: Clock,
        tick_period: Duration,
    ) -> Self {
        let session = QuizSession::new(key);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (updates, _) = watch::channel(SessionSnapshot::of(&session));
        let events_weak = events_tx.downgrade();
        Self {
            session,
            api,
            timers,
            clock,
            tick_period,
            events_tx: Some(events_tx),
            events_weak,
            events_rx,
            updates,
            ticker: None,
            persist_failing: false,
        }
    }

    #[must_use]
    pub fn key(&self) -> SessionKey {
        self.session.key()
    }

    #[must_use]
    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    /// A sender for this session's queue.
    ///
    /// While the session runs, it ends as unmounted when every handle is gone.
    /// A handle taken after that reports `ControllerError::Closed`.
    #[must_use]
    pub fn session_handle(&self) -> SessionHandle {
        let events = match &self.events_tx {
            Some(tx) => tx.clone(),
            None => self
                .events_weak
                .upgrade()
                .unwrap_or_else(|| mpsc::unbounded_channel().0),
        };
        SessionHandle::new(events)
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::of(&self.session)
    }

    /// Fetch the quiz and resume or start its countdown.
    ///
    /// A quiz the student already submitted goes straight to `Submitted` without
    /// touching the timer store. A countdown that ran out while away is submitted
    /// before this returns.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Load` if the quiz cannot be fetched (the session
    /// is then `Error`), or `ControllerError::Session` if it was already loaded.
    pub async fn load(&mut self) -> Result<LoadOutcome, ControllerError> {
        if self.session.status() != SessionStatus::Loading {
            return Err(SessionError::InvalidTransition {
                from: self.session.status(),
                event: "load quiz",
            }
            .into());
        }
        let key = self.key();

        let quiz = match self.api.fetch_module_quiz(key).await {
            Ok(quiz) => quiz,
            Err(err) => {
                tracing::error!(%key, error = %err, class = ?err.class(), "failed to load quiz");
                self.session.load_failed(err.to_string())?;
                self.publish();
                return Err(ControllerError::Load(err));
            }
        };

        let resumed = if quiz.prior_submission().is_some() {
            None
        } else {
            let now = self.clock.now();
            match self.timers.rehydrate(key, now, quiz.time_limit_secs()).await {
                Ok(resumed) => resumed,
                Err(err) => {
                    tracing::warn!(%key, error = %err, "timer store unreadable; starting a fresh countdown");
                    None
                }
            }
        };

        let outcome = self.session.load_succeeded(quiz, resumed)?;
        self.publish();

        match outcome {
            LoadOutcome::Started {
                remaining_secs,
                resumed,
            } => {
                tracing::info!(%key, remaining_secs, resumed, "quiz started");
                self.persist(remaining_secs).await;
            }
            LoadOutcome::Expired => {
                tracing::info!(%key, "countdown ran out while away");
                self.submit(SubmitTrigger::Expired).await?;
            }
            LoadOutcome::AlreadySubmitted(result_id) => {
                tracing::info!(%key, %result_id, "quiz already submitted");
            }
        }
        Ok(outcome)
    }

    /// Apply one event.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Session` for events the current state rejects;
    /// the session is left unchanged.
    pub async fn handle(&mut self, event: SessionEvent) -> Result<EventFlow, ControllerError> {
        match event {
            SessionEvent::Tick => self.tick().await,
            SessionEvent::Select { question, order } => {
                self.select(question, order)?;
                Ok(EventFlow::Continue)
            }
            SessionEvent::Submit => self.submit(SubmitTrigger::Manual).await,
            SessionEvent::Unmount => {
                self.stop_ticker();
                tracing::debug!(key = %self.key(), status = %self.session.status(), "session unmounted");
                Ok(EventFlow::Finished(
                    SessionOutcome::from_terminal(&self.session)
                        .unwrap_or(SessionOutcome::Unmounted),
                ))
            }
        }
    }

    /// Load if needed, then consume events until the session ends, is unmounted,
    /// or loses its last handle.
    pub async fn run(&mut self) -> SessionOutcome {
        if self.session.status() == SessionStatus::Loading {
            // A load failure leaves the session in its terminal error state.
            let _ = self.load().await;
        }
        if let Some(outcome) = SessionOutcome::from_terminal(&self.session) {
            return outcome;
        }

        if self.session.status() == SessionStatus::InProgress {
            self.start_ticker();
        }
        self.events_tx = None;

        loop {
            let Some(event) = self.events_rx.recv().await else {
                self.stop_ticker();
                tracing::debug!(key = %self.key(), "all session handles dropped; unmounting");
                return SessionOutcome::Unmounted;
            };
            match self.handle(event).await {
                Ok(EventFlow::Continue) => {}
                Ok(EventFlow::Finished(outcome)) => return outcome,
                Err(err) => {
                    tracing::debug!(key = %self.key(), ?event, error = %err, "event rejected");
                }
            }
        }
    }

    async fn tick(&mut self) -> Result<EventFlow, ControllerError> {
        match self.session.tick() {
            TickOutcome::Ticked { remaining_secs } => {
                tracing::trace!(key = %self.key(), remaining_secs, "tick");
                self.persist(remaining_secs).await;
                self.publish();
                Ok(EventFlow::Continue)
            }
            TickOutcome::Expired => {
                tracing::info!(key = %self.key(), "time is up; submitting");
                self.submit(SubmitTrigger::Expired).await
            }
            TickOutcome::Ignored => Ok(EventFlow::Continue),
        }
    }

    fn select(&mut self, question: QuestionId, order: OptionOrder) -> Result<(), ControllerError> {
        let selected = self.session.select(question, order)?;
        tracing::debug!(key = %self.key(), %question, selected = ?selected, "answer toggled");
        self.publish();
        Ok(())
    }

    async fn submit(&mut self, trigger: SubmitTrigger) -> Result<EventFlow, ControllerError> {
        let request = self.session.begin_submission(trigger)?;
        let key = self.key();

        self.stop_ticker();
        if let Err(err) = self.timers.clear(key).await {
            tracing::warn!(%key, error = %err, "could not clear quiz timer");
        }
        self.publish();

        match self.api.submit(&request).await {
            Ok(result_id) => {
                self.session.submission_succeeded(result_id)?;
                tracing::info!(%key, %result_id, ?trigger, "submission accepted");
            }
            Err(err) => {
                tracing::error!(%key, error = %err, class = ?err.class(), "submission failed");
                self.session.submission_failed(err.to_string())?;
            }
        }
        self.publish();

        Ok(SessionOutcome::from_terminal(&self.session)
            .map_or(EventFlow::Continue, EventFlow::Finished))
    }

    /// Best effort; the countdown keeps running in memory when the store fails.
    async fn persist(&mut self, remaining_secs: u32) {
        let key = self.key();
        match self.timers.save(key, remaining_secs, self.clock.now()).await {
            Ok(()) => self.persist_failing = false,
            Err(err) if !self.persist_failing => {
                self.persist_failing = true;
                tracing::warn!(%key, error = %err, "could not persist quiz timer");
            }
            Err(err) => tracing::trace!(%key, error = %err, "timer store still failing"),
        }
    }

    fn start_ticker(&mut self) {
        if self.ticker.is_none() {
            self.ticker = Some(Ticker::spawn(self.tick_period, self.events_weak.clone()));
        }
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }

    fn publish(&self) {
        self.updates.send_replace(SessionSnapshot::of(&self.session));
    }
}
