//! Orchestration of a timed quiz attempt: loading, countdown, answers and the
//! one-way submission gate.

mod controller;
mod events;
mod service;
mod ticker;

pub use controller::{EventFlow, QuizSessionController};
pub use events::{SessionEvent, SessionHandle, SessionOutcome, SessionSnapshot};
pub use service::QuizSessionService;
pub use ticker::{TICK_PERIOD, Ticker};
