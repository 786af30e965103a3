//! Shared error types for the services crate.

use reqwest::StatusCode;
use thiserror::Error;

use quiz_core::model::{QuizError, SessionError};

/// Coarse classification of a failed API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Network,
    Validation,
    Server,
}

/// Errors emitted by the REST API layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("not authenticated")]
    Unauthorized,
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: StatusCode, message: String },
    #[error("server error with status {0}")]
    Server(StatusCode),
    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("no quiz is published for this module")]
    NoQuiz,
    #[error(transparent)]
    InvalidQuiz(#[from] QuizError),
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl ApiError {
    #[must_use]
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Transport(_) => FailureClass::Network,
            Self::Unauthorized
            | Self::Rejected { .. }
            | Self::NoQuiz
            | Self::InvalidQuiz(_)
            | Self::Url(_) => FailureClass::Validation,
            Self::Server(_) | Self::Decode(_) | Self::Malformed(_) => FailureClass::Server,
        }
    }
}

/// Errors emitted by the quiz session controller and its handles.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ControllerError {
    #[error("quiz could not be loaded: {0}")]
    Load(#[source] ApiError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("quiz session has ended")]
    Closed,
}

/// Errors emitted while reading client configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("{var} must be a positive integer, got {raw:?}")]
    InvalidNumber { var: &'static str, raw: String },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
