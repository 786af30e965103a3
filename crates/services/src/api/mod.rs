//! REST API access: one explicit context carrying client, endpoints and tokens.

mod context;
pub mod quiz;

pub use context::{
    ApiConfig, ApiContext, AuthContext, AuthTokens, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT,
};
pub use quiz::{HttpQuizApi, QuizApi};
