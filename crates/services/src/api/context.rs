use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

use crate::error::ApiError;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/v1/";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const REFRESH_PATH: &str = "user/token/refresh/";
const MAX_ERROR_BODY: usize = 200;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: Url,
    pub request_timeout: Duration,
}

impl ApiConfig {
    /// Endpoint paths are joined onto `base_url`, so it always ends with a slash.
    #[must_use]
    pub fn new(mut base_url: Url, request_timeout: Duration) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            request_timeout,
        }
    }

    /// # Errors
    ///
    /// Returns `ApiError::Url` if `path` cannot be joined onto the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }
}

/// Access and refresh tokens for the authenticated user.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AuthTokens {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

impl AuthTokens {
    #[must_use]
    pub fn new(access: impl Into<String>, refresh: Option<String>) -> Self {
        Self {
            access: access.into(),
            refresh,
        }
    }
}

impl fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access", &"<redacted>")
            .field("refresh", &self.refresh.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Token holder shared by every request issued through one [`ApiContext`].
#[derive(Clone, Default)]
pub struct AuthContext {
    tokens: Arc<RwLock<Option<AuthTokens>>>,
}

impl AuthContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tokens(tokens: AuthTokens) -> Self {
        Self {
            tokens: Arc::new(RwLock::new(Some(tokens))),
        }
    }

    pub async fn install(&self, tokens: AuthTokens) {
        *self.tokens.write().await = Some(tokens);
    }

    pub async fn clear(&self) {
        *self.tokens.write().await = None;
    }

    pub async fn tokens(&self) -> Option<AuthTokens> {
        self.tokens.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.tokens.read().await.is_some()
    }

    async fn access_token(&self) -> Option<String> {
        self.tokens.read().await.as_ref().map(|t| t.access.clone())
    }

    async fn refresh_token(&self) -> Option<String> {
        self.tokens
            .read()
            .await
            .as_ref()
            .and_then(|t| t.refresh.clone())
    }
}

/// HTTP client, endpoint configuration and credentials for the REST API.
#[derive(Clone)]
pub struct ApiContext {
    client: Client,
    config: Arc<ApiConfig>,
    auth: AuthContext,
}

impl ApiContext {
    /// # Errors
    ///
    /// Returns `ApiError::Transport` if the HTTP client cannot be built.
    pub fn new(config: ApiConfig, auth: AuthContext) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            config: Arc::new(config),
            auth,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    #[must_use]
    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    /// # Errors
    ///
    /// Returns `ApiError` if the request fails, is rejected, or the body does not decode.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let body = self.send(Method::GET, path, None).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// # Errors
    ///
    /// Returns `ApiError` if the request fails, is rejected, or the body does not decode.
    pub async fn post_json<B, T>(&self, path: &str, payload: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_value(payload)?;
        let body = self.send(Method::POST, path, Some(&payload)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Issue a request, refreshing the access token and replaying once on 401.
    async fn send(
        &self,
        method: Method,
        path: &str,
        payload: Option<&serde_json::Value>,
    ) -> Result<String, ApiError> {
        let url = self.config.endpoint(path)?;

        let response = self.dispatch(method.clone(), url.clone(), payload).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return read_body(response).await;
        }

        tracing::debug!(%url, "access token rejected; refreshing");
        self.refresh().await?;

        let response = self.dispatch(method, url, payload).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.auth.clear().await;
            return Err(ApiError::Unauthorized);
        }
        read_body(response).await
    }

    async fn dispatch(
        &self,
        method: Method,
        url: Url,
        payload: Option<&serde_json::Value>,
    ) -> Result<Response, ApiError> {
        tracing::debug!(method = ?method, uri = %url, "Sending API request");
        let mut request = self.client.request(method, url);
        if let Some(access) = self.auth.access_token().await {
            request = request.bearer_auth(access);
        }
        if let Some(payload) = payload {
            request = request.json(payload);
        }
        Ok(request.send().await?)
    }

    async fn refresh(&self) -> Result<(), ApiError> {
        let Some(refresh) = self.auth.refresh_token().await else {
            self.auth.clear().await;
            return Err(ApiError::Unauthorized);
        };

        let url = self.config.endpoint(REFRESH_PATH)?;
        let response = self
            .client
            .post(url)
            .json(&RefreshRequest { refresh: &refresh })
            .send()
            .await;

        let renewed = match response {
            Ok(response) if response.status().is_success() => {
                response.json::<RefreshResponse>().await.ok()
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "token refresh rejected");
                None
            }
            Err(err) => {
                tracing::warn!(error = %err, "token refresh failed");
                None
            }
        };

        let Some(renewed) = renewed else {
            self.auth.clear().await;
            return Err(ApiError::Unauthorized);
        };

        self.auth
            .install(AuthTokens::new(
                renewed.access,
                renewed.refresh.or(Some(refresh)),
            ))
            .await;
        tracing::debug!("access token refreshed");
        Ok(())
    }
}

async fn read_body(response: Response) -> Result<String, ApiError> {
    let status = response.status();
    if status.is_server_error() {
        return Err(ApiError::Server(status));
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::Rejected {
            status,
            message: truncate(&body),
        });
    }
    Ok(body)
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_owned(),
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let config = ApiConfig::new(
            Url::parse("https://lms.example.com/api/v1").unwrap(),
            DEFAULT_REQUEST_TIMEOUT,
        );
        assert_eq!(
            config.endpoint("courses/quiz/submit/").unwrap().as_str(),
            "https://lms.example.com/api/v1/courses/quiz/submit/"
        );
    }

    #[test]
    fn default_config_targets_local_backend() {
        let config = ApiConfig::new(
            Url::parse(DEFAULT_API_BASE_URL).unwrap(),
            DEFAULT_REQUEST_TIMEOUT,
        );
        assert_eq!(
            config.endpoint("/user/token/refresh/").unwrap().as_str(),
            "http://localhost:8000/api/v1/user/token/refresh/"
        );
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn debug_output_hides_tokens() {
        let tokens = AuthTokens::new("secret-access", Some("secret-refresh".into()));
        let printed = format!("{tokens:?}");
        assert!(!printed.contains("secret"));
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(500);
        let message = truncate(&body);
        assert_eq!(message.len(), MAX_ERROR_BODY + 3);
        assert_eq!(truncate("  short "), "short");
    }

    #[tokio::test]
    async fn auth_context_installs_and_clears() {
        let auth = AuthContext::new();
        assert!(!auth.is_authenticated().await);

        auth.install(AuthTokens::new("a1", Some("r1".into()))).await;
        let shared = auth.clone();
        assert_eq!(shared.access_token().await.as_deref(), Some("a1"));
        assert_eq!(shared.refresh_token().await.as_deref(), Some("r1"));

        shared.clear().await;
        assert!(!auth.is_authenticated().await);
    }
}
