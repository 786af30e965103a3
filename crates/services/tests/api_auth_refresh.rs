use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

use quiz_core::model::{CourseId, ModuleId, QuizId, SessionKey};
use services::api::{ApiConfig, ApiContext, AuthContext, AuthTokens, HttpQuizApi, QuizApi};
use services::{ApiError, FailureClass};

const QUIZ_BODY: &str = r#"{"quizzes":[{"id":3,"title":"Traits","time_limit":300,"questions":[{"id":1,"question_text":"Is Send auto?","options":[{"id":1,"option_text":"Yes","order":1},{"id":2,"option_text":"No","order":2}]}]}]}"#;

type RequestLog = Arc<Mutex<Vec<String>>>;

/// Minimal HTTP/1.1 backend: one request per connection.
async fn start_backend() -> (Url, RequestLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = Url::parse(&format!(
        "http://{}/api/v1/",
        listener.local_addr().unwrap()
    ))
    .unwrap();
    let log = RequestLog::default();
    let requests = Arc::clone(&log);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(answer(socket, Arc::clone(&requests)));
        }
    });
    (base, log)
}

async fn answer(mut socket: TcpStream, log: RequestLog) {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 1024];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + 4 + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end + 4..]).to_string();

    let request_line = head.lines().next().unwrap_or_default().to_owned();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_uppercase();
    let path = parts.next().unwrap_or_default().to_owned();
    log.lock().unwrap().push(format!("{method} {path}"));

    let (status, payload) = route(&method, &path, &head, &body);
    let response = format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{payload}",
        payload.len()
    );
    socket.write_all(response.as_bytes()).await.unwrap();
    socket.shutdown().await.ok();
}

fn route(method: &str, path: &str, head: &str, body: &str) -> (&'static str, String) {
    let fresh = head.contains("authorization: bearer fresh");
    match (method, path) {
        ("POST", "/api/v1/user/token/refresh/") if body.contains("\"r1\"") => {
            ("200 OK", r#"{"access":"fresh"}"#.to_owned())
        }
        ("POST", "/api/v1/user/token/refresh/") => ("401 Unauthorized", "{}".to_owned()),
        ("GET", "/api/v1/courses/enrollments/4/modules/2/quizzes/") if fresh => {
            ("200 OK", QUIZ_BODY.to_owned())
        }
        ("GET", "/api/v1/courses/enrollments/5/modules/1/quizzes/") => {
            ("502 Bad Gateway", String::new())
        }
        _ => ("401 Unauthorized", r#"{"detail":"token expired"}"#.to_owned()),
    }
}

fn key(course: u64, module: u64) -> SessionKey {
    SessionKey::new(CourseId::new(course), ModuleId::new(module))
}

fn gateway(base: Url, tokens: AuthTokens) -> (AuthContext, HttpQuizApi) {
    let auth = AuthContext::with_tokens(tokens);
    let ctx = ApiContext::new(
        ApiConfig::new(base, services::api::DEFAULT_REQUEST_TIMEOUT),
        auth.clone(),
    )
    .unwrap();
    (auth, HttpQuizApi::new(ctx))
}

#[tokio::test]
async fn expired_access_token_is_refreshed_once() {
    let (base, log) = start_backend().await;
    let (auth, api) = gateway(base, AuthTokens::new("stale", Some("r1".into())));

    let quiz = api.fetch_module_quiz(key(4, 2)).await.unwrap();
    assert_eq!(quiz.id(), QuizId::new(3));
    assert_eq!(quiz.time_limit_secs(), 300);

    assert_eq!(
        auth.tokens().await,
        Some(AuthTokens::new("fresh", Some("r1".into())))
    );
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "GET /api/v1/courses/enrollments/4/modules/2/quizzes/",
            "POST /api/v1/user/token/refresh/",
            "GET /api/v1/courses/enrollments/4/modules/2/quizzes/",
        ]
    );
}

#[tokio::test]
async fn failed_refresh_logs_out() {
    let (base, log) = start_backend().await;
    let (auth, api) = gateway(base, AuthTokens::new("stale", Some("revoked".into())));

    let err = api.fetch_module_quiz(key(4, 2)).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
    assert_eq!(err.class(), FailureClass::Validation);
    assert!(!auth.is_authenticated().await);
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn server_errors_are_server_class() {
    let (base, _log) = start_backend().await;
    let (_auth, api) = gateway(base, AuthTokens::new("fresh", None));

    let err = api.fetch_module_quiz(key(5, 1)).await.unwrap_err();
    assert!(matches!(err, ApiError::Server(_)));
    assert_eq!(err.class(), FailureClass::Server);
}
