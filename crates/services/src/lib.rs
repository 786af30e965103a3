#![forbid(unsafe_code)]

pub mod api;
pub mod app_services;
pub mod config;
pub mod error;
pub mod quiz_session;
pub mod results;

pub use quiz_core::Clock;

pub use api::{ApiConfig, ApiContext, AuthContext, AuthTokens, HttpQuizApi, QuizApi};
pub use app_services::AppServices;
pub use config::ClientConfig;
pub use error::{ApiError, AppServicesError, ConfigError, ControllerError, FailureClass};
pub use quiz_session::{
    EventFlow, QuizSessionController, QuizSessionService, SessionEvent, SessionHandle,
    SessionOutcome, SessionSnapshot,
};
pub use results::ResultService;
