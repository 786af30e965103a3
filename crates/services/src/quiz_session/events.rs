use tokio::sync::mpsc;

use quiz_core::model::{
    FailurePhase, OptionOrder, QuestionId, QuizResultId, QuizSession, SessionState,
    SessionStatus, SubmittedVia,
};

use crate::error::ControllerError;

/// Input to a running quiz session. Events are applied strictly in queue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Tick,
    Select {
        question: QuestionId,
        order: OptionOrder,
    },
    Submit,
    /// The view went away; stop counting without submitting.
    Unmount,
}

/// Cloneable sender for posting events into a session queue.
#[derive(Clone)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    pub(crate) fn new(events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { events }
    }

    /// # Errors
    ///
    /// Returns `ControllerError::Closed` once the controller is gone.
    pub fn select(&self, question: QuestionId, order: OptionOrder) -> Result<(), ControllerError> {
        self.post(SessionEvent::Select { question, order })
    }

    /// # Errors
    ///
    /// Returns `ControllerError::Closed` once the controller is gone.
    pub fn submit(&self) -> Result<(), ControllerError> {
        self.post(SessionEvent::Submit)
    }

    /// # Errors
    ///
    /// Returns `ControllerError::Closed` once the controller is gone.
    pub fn unmount(&self) -> Result<(), ControllerError> {
        self.post(SessionEvent::Unmount)
    }

    /// # Errors
    ///
    /// Returns `ControllerError::Closed` once the controller is gone.
    pub fn post(&self, event: SessionEvent) -> Result<(), ControllerError> {
        self.events.send(event).map_err(|_| ControllerError::Closed)
    }
}

/// What the view renders after every state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub remaining_secs: u32,
    pub answered: usize,
    pub total: usize,
    pub result_id: Option<QuizResultId>,
    pub error: Option<String>,
}

impl SessionSnapshot {
    #[must_use]
    pub fn of(session: &QuizSession) -> Self {
        let progress = session.progress();
        let error = match session.state() {
            SessionState::Failed(failure) => Some(failure.message.clone()),
            _ => None,
        };
        Self {
            status: session.status(),
            remaining_secs: progress.remaining_secs,
            answered: progress.answered,
            total: progress.total,
            result_id: session.result_id(),
            error,
        }
    }
}

/// How a controller run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Submitted {
        result_id: QuizResultId,
        via: SubmittedVia,
    },
    LoadFailed {
        message: String,
    },
    SubmissionFailed {
        message: String,
    },
    /// Unmounted mid-attempt; the persisted countdown is left for the next mount.
    Unmounted,
}

impl SessionOutcome {
    /// Final outcome for a session in a terminal state.
    #[must_use]
    pub fn from_terminal(session: &QuizSession) -> Option<Self> {
        match session.state() {
            SessionState::Submitted { result_id, via } => Some(Self::Submitted {
                result_id: *result_id,
                via: *via,
            }),
            SessionState::Failed(failure) => Some(match failure.phase {
                FailurePhase::Load => Self::LoadFailed {
                    message: failure.message.clone(),
                },
                FailurePhase::Submission => Self::SubmissionFailed {
                    message: failure.message.clone(),
                },
            }),
            _ => None,
        }
    }
}
