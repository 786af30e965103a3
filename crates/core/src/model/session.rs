use std::fmt;
use std::mem;

use thiserror::Error;

use crate::model::ids::{OptionOrder, QuestionId, QuizId, QuizResultId, SessionKey};
use crate::model::quiz::Quiz;
use crate::model::selection::{SelectedOptions, SelectionTracker};

//
// ─── STATES ────────────────────────────────────────────────────────────────────
//

/// What pushed the session through the submission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    Expired,
}

/// How the session came to be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmittedVia {
    Manual,
    Expired,
    /// The server already held a submission when the quiz was loaded.
    Prior,
}

impl From<SubmitTrigger> for SubmittedVia {
    fn from(trigger: SubmitTrigger) -> Self {
        match trigger {
            SubmitTrigger::Manual => Self::Manual,
            SubmitTrigger::Expired => Self::Expired,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePhase {
    Load,
    Submission,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFailure {
    pub phase: FailurePhase,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    InProgress,
    /// Countdown hit zero; only the submission gate is reachable from here.
    Expired,
    Submitting {
        trigger: SubmitTrigger,
    },
    Submitted {
        result_id: QuizResultId,
        via: SubmittedVia,
    },
    Failed(SessionFailure),
}

/// Field-less projection of [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Loading,
    InProgress,
    Submitting,
    Submitted,
    Expired,
    Error,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Loading => "loading",
            Self::InProgress => "in progress",
            Self::Submitting => "submitting",
            Self::Submitted => "submitted",
            Self::Expired => "expired",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

impl SessionState {
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        match self {
            Self::Loading => SessionStatus::Loading,
            Self::InProgress => SessionStatus::InProgress,
            Self::Expired => SessionStatus::Expired,
            Self::Submitting { .. } => SessionStatus::Submitting,
            Self::Submitted { .. } => SessionStatus::Submitted,
            Self::Failed(_) => SessionStatus::Error,
        }
    }

    /// True once nothing else can happen to the session.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Submitted { .. } | Self::Failed(_))
    }
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("cannot {event} while session is {from}")]
    InvalidTransition {
        from: SessionStatus,
        event: &'static str,
    },

    #[error("submission already started for this session")]
    AlreadySubmitted,

    #[error("answers cannot change while session is {0}")]
    SelectionLocked(SessionStatus),

    #[error("question {0} is not part of this quiz")]
    UnknownQuestion(QuestionId),

    #[error("question {question} has no option {order}")]
    UnknownOption {
        question: QuestionId,
        order: OptionOrder,
    },
}

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Started { remaining_secs: u32, resumed: bool },
    /// Rehydration found no time left; the caller must submit.
    Expired,
    AlreadySubmitted(QuizResultId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Ticked { remaining_secs: u32 },
    Expired,
    /// The session is not counting down; the tick had no effect.
    Ignored,
}

/// Payload handed to the submission gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub quiz_id: QuizId,
    pub selected_options: SelectedOptions,
    pub trigger: SubmitTrigger,
}

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    pub answered: usize,
    pub total: usize,
    pub remaining_secs: u32,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One timed attempt at a module quiz.
///
/// Pure state machine: persistence, networking and scheduling belong to the
/// services layer, which feeds events in and acts on the returned outcomes.
pub struct QuizSession {
    key: SessionKey,
    quiz: Option<Quiz>,
    remaining_secs: u32,
    state: SessionState,
    selections: SelectionTracker,
}

impl QuizSession {
    #[must_use]
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            quiz: None,
            remaining_secs: 0,
            state: SessionState::Loading,
            selections: SelectionTracker::new(),
        }
    }

    #[must_use]
    pub fn key(&self) -> SessionKey {
        self.key
    }

    #[must_use]
    pub fn quiz(&self) -> Option<&Quiz> {
        self.quiz.as_ref()
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.state.status()
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    #[must_use]
    pub fn selections(&self) -> &SelectionTracker {
        &self.selections
    }

    #[must_use]
    pub fn result_id(&self) -> Option<QuizResultId> {
        match self.state {
            SessionState::Submitted { result_id, .. } => Some(result_id),
            _ => None,
        }
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            answered: self.selections.answered_count(),
            total: self.quiz.as_ref().map_or(0, |quiz| quiz.questions().len()),
            remaining_secs: self.remaining_secs,
        }
    }

    /// Apply fetched quiz data.
    ///
    /// `resumed_secs` is the rehydrated countdown, if a persisted one was usable.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is loading.
    pub fn load_succeeded(
        &mut self,
        quiz: Quiz,
        resumed_secs: Option<u32>,
    ) -> Result<LoadOutcome, SessionError> {
        self.expect(SessionStatus::Loading, "load quiz")?;

        if let Some(prior) = quiz.prior_submission() {
            self.quiz = Some(quiz);
            self.state = SessionState::Submitted {
                result_id: prior.result_id,
                via: SubmittedVia::Prior,
            };
            return Ok(LoadOutcome::AlreadySubmitted(prior.result_id));
        }

        let limit = quiz.time_limit_secs();
        self.remaining_secs = resumed_secs.map_or(limit, |secs| secs.min(limit));
        self.quiz = Some(quiz);

        if self.remaining_secs == 0 {
            self.state = SessionState::Expired;
            return Ok(LoadOutcome::Expired);
        }

        self.state = SessionState::InProgress;
        Ok(LoadOutcome::Started {
            remaining_secs: self.remaining_secs,
            resumed: resumed_secs.is_some(),
        })
    }

    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is loading.
    pub fn load_failed(&mut self, message: impl Into<String>) -> Result<(), SessionError> {
        self.expect(SessionStatus::Loading, "fail loading")?;
        self.state = SessionState::Failed(SessionFailure {
            phase: FailurePhase::Load,
            message: message.into(),
        });
        Ok(())
    }

    /// Advance the countdown by one second.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state != SessionState::InProgress {
            return TickOutcome::Ignored;
        }

        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.state = SessionState::Expired;
            return TickOutcome::Expired;
        }
        TickOutcome::Ticked {
            remaining_secs: self.remaining_secs,
        }
    }

    /// Toggle an answer. Returns the question's selection after the toggle.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SelectionLocked` outside `InProgress`, or
    /// `UnknownQuestion`/`UnknownOption` for answers that are not in the quiz.
    pub fn select(
        &mut self,
        question: QuestionId,
        order: OptionOrder,
    ) -> Result<Option<OptionOrder>, SessionError> {
        if self.state != SessionState::InProgress {
            return Err(SessionError::SelectionLocked(self.status()));
        }
        let quiz = self
            .quiz
            .as_ref()
            .ok_or(SessionError::SelectionLocked(SessionStatus::Loading))?;
        let Some(entry) = quiz.question(question) else {
            return Err(SessionError::UnknownQuestion(question));
        };
        if !entry.has_option(order) {
            return Err(SessionError::UnknownOption { question, order });
        }

        self.selections.select(question, order);
        Ok(self.selections.selected(question))
    }

    /// Pass the one-way submission gate.
    ///
    /// Selections are drained into the returned request; every question is listed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadySubmitted` once the gate has been passed, and
    /// `SessionError::InvalidTransition` while loading or after a load failure.
    pub fn begin_submission(
        &mut self,
        trigger: SubmitTrigger,
    ) -> Result<SubmissionRequest, SessionError> {
        match self.state {
            SessionState::InProgress | SessionState::Expired => {}
            SessionState::Submitting { .. } | SessionState::Submitted { .. } => {
                return Err(SessionError::AlreadySubmitted);
            }
            SessionState::Failed(SessionFailure {
                phase: FailurePhase::Submission,
                ..
            }) => return Err(SessionError::AlreadySubmitted),
            _ => {
                return Err(SessionError::InvalidTransition {
                    from: self.status(),
                    event: "submit",
                });
            }
        }

        let quiz = self.quiz.as_ref().ok_or(SessionError::InvalidTransition {
            from: SessionStatus::Loading,
            event: "submit",
        })?;
        let selected_options = mem::take(&mut self.selections).into_payload(quiz.questions());
        let quiz_id = quiz.id();

        self.state = SessionState::Submitting { trigger };
        Ok(SubmissionRequest {
            quiz_id,
            selected_options,
            trigger,
        })
    }

    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless a submission is in flight.
    pub fn submission_succeeded(&mut self, result_id: QuizResultId) -> Result<(), SessionError> {
        let SessionState::Submitting { trigger } = self.state else {
            return Err(SessionError::InvalidTransition {
                from: self.status(),
                event: "complete submission",
            });
        };
        self.state = SessionState::Submitted {
            result_id,
            via: trigger.into(),
        };
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless a submission is in flight.
    pub fn submission_failed(&mut self, message: impl Into<String>) -> Result<(), SessionError> {
        self.expect(SessionStatus::Submitting, "fail submission")?;
        self.state = SessionState::Failed(SessionFailure {
            phase: FailurePhase::Submission,
            message: message.into(),
        });
        Ok(())
    }

    fn expect(&self, status: SessionStatus, event: &'static str) -> Result<(), SessionError> {
        if self.status() == status {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                from: self.status(),
                event,
            })
        }
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("key", &self.key)
            .field("quiz_id", &self.quiz.as_ref().map(Quiz::id))
            .field("state", &self.state)
            .field("remaining_secs", &self.remaining_secs)
            .field("answered", &self.selections.answered_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::{CourseId, ModuleId};
    use crate::model::quiz::{PriorSubmission, fixtures};

    fn key() -> SessionKey {
        SessionKey::new(CourseId::new(5), ModuleId::new(8))
    }

    fn started(limit: u32) -> QuizSession {
        let mut session = QuizSession::new(key());
        session
            .load_succeeded(fixtures::quiz(limit, 2, 3), None)
            .unwrap();
        session
    }

    #[test]
    fn fresh_load_starts_at_time_limit() {
        let mut session = QuizSession::new(key());
        let outcome = session
            .load_succeeded(fixtures::quiz(600, 2, 3), None)
            .unwrap();
        assert_eq!(
            outcome,
            LoadOutcome::Started {
                remaining_secs: 600,
                resumed: false
            }
        );
        assert_eq!(session.status(), SessionStatus::InProgress);
    }

    #[test]
    fn resumed_countdown_is_capped_by_limit() {
        let mut session = QuizSession::new(key());
        session
            .load_succeeded(fixtures::quiz(300, 1, 2), Some(900))
            .unwrap();
        assert_eq!(session.remaining_secs(), 300);
    }

    #[test]
    fn resuming_with_no_time_left_expires() {
        let mut session = QuizSession::new(key());
        let outcome = session
            .load_succeeded(fixtures::quiz(300, 1, 2), Some(0))
            .unwrap();
        assert_eq!(outcome, LoadOutcome::Expired);
        assert_eq!(session.status(), SessionStatus::Expired);
    }

    #[test]
    fn prior_submission_skips_in_progress() {
        let mut session = QuizSession::new(key());
        let quiz = Quiz::new(
            QuizId::new(3),
            "Done",
            600,
            Vec::new(),
            Some(PriorSubmission {
                result_id: QuizResultId::new(44),
            }),
        )
        .unwrap();
        let outcome = session.load_succeeded(quiz, None).unwrap();
        assert_eq!(outcome, LoadOutcome::AlreadySubmitted(QuizResultId::new(44)));
        assert_eq!(session.result_id(), Some(QuizResultId::new(44)));
        assert_eq!(session.tick(), TickOutcome::Ignored);
    }

    #[test]
    fn ticks_count_down_then_expire() {
        let mut session = started(3);
        assert_eq!(session.tick(), TickOutcome::Ticked { remaining_secs: 2 });
        assert_eq!(session.tick(), TickOutcome::Ticked { remaining_secs: 1 });
        assert_eq!(session.tick(), TickOutcome::Expired);
        assert_eq!(session.tick(), TickOutcome::Ignored);
        assert_eq!(session.remaining_secs(), 0);
    }

    #[test]
    fn ticks_before_load_are_ignored() {
        let mut session = QuizSession::new(key());
        assert_eq!(session.tick(), TickOutcome::Ignored);
    }

    #[test]
    fn gate_admits_exactly_one_submission() {
        let mut session = started(600);
        let request = session.begin_submission(SubmitTrigger::Manual).unwrap();
        assert_eq!(request.quiz_id, QuizId::new(1));
        assert_eq!(
            session.begin_submission(SubmitTrigger::Expired),
            Err(SessionError::AlreadySubmitted)
        );
        assert_eq!(session.tick(), TickOutcome::Ignored);
    }

    #[test]
    fn gate_stays_closed_after_failed_submission() {
        let mut session = started(600);
        session.begin_submission(SubmitTrigger::Manual).unwrap();
        session.submission_failed("boom").unwrap();
        assert_eq!(session.status(), SessionStatus::Error);
        assert_eq!(
            session.begin_submission(SubmitTrigger::Manual),
            Err(SessionError::AlreadySubmitted)
        );
    }

    #[test]
    fn selections_drain_into_request() {
        let mut session = started(600);
        let q1 = QuestionId::new(1);
        let q2 = QuestionId::new(2);
        session.select(q1, OptionOrder::new(2)).unwrap();
        session.select(q2, OptionOrder::new(1)).unwrap();
        assert_eq!(session.select(q1, OptionOrder::new(2)).unwrap(), None);

        let request = session.begin_submission(SubmitTrigger::Manual).unwrap();
        assert_eq!(request.selected_options[&q1], None);
        assert_eq!(request.selected_options[&q2], Some(OptionOrder::new(1)));
        assert!(session.selections().is_empty());
    }

    #[test]
    fn selections_lock_outside_in_progress() {
        let mut session = started(1);
        assert_eq!(session.tick(), TickOutcome::Expired);
        assert_eq!(
            session.select(QuestionId::new(1), OptionOrder::new(1)),
            Err(SessionError::SelectionLocked(SessionStatus::Expired))
        );
    }

    #[test]
    fn rejects_unknown_answers() {
        let mut session = started(600);
        assert_eq!(
            session.select(QuestionId::new(9), OptionOrder::new(1)),
            Err(SessionError::UnknownQuestion(QuestionId::new(9)))
        );
        assert_eq!(
            session.select(QuestionId::new(1), OptionOrder::new(7)),
            Err(SessionError::UnknownOption {
                question: QuestionId::new(1),
                order: OptionOrder::new(7)
            })
        );
    }

    #[test]
    fn expiry_submission_records_trigger() {
        let mut session = started(1);
        session.tick();
        let request = session.begin_submission(SubmitTrigger::Expired).unwrap();
        assert_eq!(request.trigger, SubmitTrigger::Expired);
        session.submission_succeeded(QuizResultId::new(12)).unwrap();
        assert_eq!(
            session.state(),
            &SessionState::Submitted {
                result_id: QuizResultId::new(12),
                via: SubmittedVia::Expired
            }
        );
    }

    #[test]
    fn load_failure_is_terminal() {
        let mut session = QuizSession::new(key());
        session.load_failed("offline").unwrap();
        assert!(session.state().is_terminal());
        assert!(matches!(
            session.begin_submission(SubmitTrigger::Manual),
            Err(SessionError::InvalidTransition { .. })
        ));
        assert!(session.load_failed("again").is_err());
    }
}
