use std::fmt;

use quiz_core::model::{CourseId, ModuleId, QuizResultId, SessionKey};
use services::{AppServices, ClientConfig, Clock, SessionOutcome};
use tracing_subscriber::EnvFilter;

mod console;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidId { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_id<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let raw = require_value(args, flag)?;
    raw.parse().map_err(|_| ArgsError::InvalidId { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- quiz   --course <id> --module <id> [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- result --course <id> --module <id> --result <id>");
    eprintln!();
    eprintln!("Quiz commands (stdin):");
    eprintln!("  select <question-id> <order>   toggle an answer");
    eprintln!("  submit                         submit now");
    eprintln!("  status                         show time left and progress");
    eprintln!("  quit                           leave; the countdown resumes next time");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_API_BASE_URL, QUIZ_DB_URL, QUIZ_ACCESS_TOKEN, QUIZ_REFRESH_TOKEN,");
    eprintln!("  QUIZ_REQUEST_TIMEOUT_SECS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Quiz,
    Result,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "quiz" => Some(Self::Quiz),
            "result" => Some(Self::Result),
            _ => None,
        }
    }
}

struct Args {
    key: SessionKey,
    db_url: Option<String>,
    result_id: Option<QuizResultId>,
}

impl Args {
    fn parse(cmd: Command, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut course: Option<CourseId> = None;
        let mut module: Option<ModuleId> = None;
        let mut db_url = None;
        let mut result_id = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--course" => course = Some(parse_id(args, "--course")?),
                "--module" => module = Some(parse_id(args, "--module")?),
                "--result" if cmd == Command::Result => {
                    result_id = Some(parse_id(args, "--result")?);
                }
                "--db" if cmd == Command::Quiz => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = Some(normalize_sqlite_url(value));
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let course = course.ok_or(ArgsError::MissingFlag { flag: "--course" })?;
        let module = module.ok_or(ArgsError::MissingFlag { flag: "--module" })?;
        if cmd == Command::Result && result_id.is_none() {
            return Err(ArgsError::MissingFlag { flag: "--result" });
        }

        Ok(Self {
            key: SessionKey::new(course, module),
            db_url,
            result_id,
        })
    }
}

fn is_in_memory_url(db_url: &str) -> bool {
    db_url == "sqlite::memory:" || db_url.starts_with("sqlite:file:")
}

fn normalize_sqlite_url(raw: String) -> String {
    if is_in_memory_url(&raw) || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Make sure the database file exists so the pool can open it.
fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if is_in_memory_url(db_url) {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_quiz(services: &AppServices, key: SessionKey) -> Result<(), Box<dyn std::error::Error>> {
    let mut controller = services.quiz_sessions().open(key);
    controller.load().await?;

    let finished = SessionOutcome::from_terminal(controller.session());
    let outcome = match finished {
        Some(outcome) => {
            println!("{}", console::render_status(&controller.snapshot()));
            outcome
        }
        None => {
            if let Some(quiz) = controller.session().quiz() {
                println!("{}", console::render_quiz(quiz));
            }
            println!("{}", console::render_status(&controller.snapshot()));

            let printer = tokio::spawn(console::follow_updates(controller.subscribe()));
            let _input =
                console::spawn_stdin_reader(controller.session_handle(), controller.subscribe());

            let outcome = controller.run().await;
            drop(controller);
            let _ = printer.await;
            outcome
        }
    };

    match outcome {
        SessionOutcome::Submitted { result_id, via } => {
            tracing::info!(%key, %result_id, ?via, "quiz finished");
            let result = services.results().load(key, result_id).await?;
            println!("{}", console::render_result(&result));
            Ok(())
        }
        SessionOutcome::Unmounted => {
            println!("Left the quiz. The timer keeps counting from where it stopped.");
            Ok(())
        }
        SessionOutcome::LoadFailed { message } | SessionOutcome::SubmissionFailed { message } => {
            Err(message.into())
        }
    }
}

async fn run_result(
    services: &AppServices,
    key: SessionKey,
    result_id: QuizResultId,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = services.results().load(key, result_id).await?;
    println!("{}", console::render_result(&result));
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let mut iter = argv.into_iter().skip(1);
    let parsed = Args::parse(cmd, &mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let mut config = ClientConfig::from_env()?;
    if let Some(db_url) = parsed.db_url {
        config.db_url = db_url;
    }
    if config.tokens.is_none() {
        tracing::warn!("QUIZ_ACCESS_TOKEN is not set; requests are sent anonymously");
    }

    let clock = Clock::default_clock();
    let services = match cmd {
        Command::Quiz => {
            if let Err(err) = prepare_sqlite_file(&config.db_url) {
                tracing::warn!(db_url = %config.db_url, error = %err, "could not create database file");
            }
            AppServices::new_sqlite(&config, clock).await?
        }
        Command::Result => AppServices::new(&config, storage::Storage::in_memory(), clock)?,
    };

    match (cmd, parsed.result_id) {
        (Command::Result, Some(result_id)) => run_result(&services, parsed.key, result_id).await,
        _ => run_quiz(&services, parsed.key).await,
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
