use std::fmt;
use std::io::{BufRead, Write as _};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use exam_core::Clock;
use exam_core::model::ExamDefinition;
use services::{
    AppServices, EventOutcome, ExamSessionError, ExamSessionService, HttpSubmissionService,
    SessionEvent, StaticSubmission, SubmissionApi, SubmissionConfig,
};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidApiUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidApiUrl { raw } => write!(f, "invalid --api value: {raw}"),
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- run   [--db <sqlite_url>] [--api <base_url>] [--applicant <token>]");
    eprintln!("  cargo run -p app -- reset [--db <sqlite_url>]   # drop the resident session");
    eprintln!();
    eprintln!("Defaults for run:");
    eprintln!("  --db sqlite:exam.sqlite3");
    eprintln!("  --api (none: submissions are accepted locally)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_DB_URL, EXAM_API_BASE_URL, EXAM_APPLICANT");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Reset,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "run" => Some(Self::Run),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    api_url: Option<String>,
    applicant: Option<String>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("EXAM_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://exam.sqlite3".into(), normalize_sqlite_url);
        let mut api_url = std::env::var("EXAM_API_BASE_URL").ok();
        let mut applicant = std::env::var("EXAM_APPLICANT").ok();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--api" => {
                    let value = require_value(args, "--api")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidApiUrl { raw: value });
                    }
                    api_url = Some(value);
                }
                "--applicant" => {
                    applicant = Some(require_value(args, "--applicant")?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            api_url,
            applicant,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
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

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
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

fn build_submission(api_url: Option<&str>) -> Result<Arc<dyn SubmissionApi>, ArgsError> {
    match api_url {
        Some(raw) => {
            let base_url = raw.trim().parse().map_err(|_| ArgsError::InvalidApiUrl {
                raw: raw.to_string(),
            })?;
            Ok(Arc::new(HttpSubmissionService::new(SubmissionConfig {
                base_url,
            })))
        }
        None => Ok(Arc::new(StaticSubmission::accepting(
            "exam result recorded locally",
        ))),
    }
}

fn show_question(service: &ExamSessionService) {
    let session = service.session();
    let cursor = session.cursor();
    let Some(section) = session.definition().section(cursor.section) else {
        return;
    };
    let Some(question) = session.definition().question(cursor.section, cursor.question) else {
        return;
    };

    let remaining = service.time_remaining();
    println!();
    println!(
        "[{}] question {}/{} — {:02}:{:02} left — {:.0}% answered",
        section.name(),
        cursor.question + 1,
        section.len(),
        remaining.num_minutes(),
        remaining.num_seconds() % 60,
        session.progress_percent(),
    );
    println!("{}", question.prompt());
    for (index, option) in question.options().iter().enumerate() {
        let marker = if session.answer_for(cursor) == Some(index) {
            "*"
        } else {
            " "
        };
        println!("  {marker}{}) {option}", index + 1);
    }
    print!("answer 1-{}, (n)ext, (p)rev, s<i> section, ack, quit > ", question.options().len());
    let _ = std::io::stdout().flush();
}

async fn dispatch(
    service: &mut ExamSessionService,
    event: SessionEvent,
) -> Result<bool, Box<dyn std::error::Error>> {
    match service.apply(event).await {
        Ok(EventOutcome::Submitted(receipt)) => {
            println!("submitted: {}", receipt.message);
            return Ok(true);
        }
        Ok(EventOutcome::SubmissionFailed(message)) => {
            println!("submission failed (answers kept, retry with 'n'): {message}");
        }
        Ok(EventOutcome::WarningRaised(warning)) => {
            println!("integrity warning: {} — type 'ack' to continue", warning.event);
        }
        Ok(EventOutcome::Expired { submitted }) => {
            if submitted {
                println!("time is up; partial answers were submitted");
            } else {
                println!("time is up; auto-submit failed, answers are preserved");
            }
            return Ok(true);
        }
        Ok(_) => {}
        Err(ExamSessionError::WarningPending) => {
            println!("acknowledge the integrity warning first ('ack')");
        }
        Err(ExamSessionError::Session(err)) => {
            println!("{err}");
        }
        Err(err) => return Err(err.into()),
    }
    Ok(false)
}

async fn run_exam(mut service: ExamSessionService) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        // The 1 Hz tick is driven by the prompt loop here; a UI host would
        // use a real interval.
        if dispatch(&mut service, SessionEvent::Tick).await? {
            return Ok(());
        }
        show_question(&service);

        let Some(line) = lines.next() else {
            println!("input closed; session stays resident for resume");
            return Ok(());
        };
        let line = line?;
        let input = line.trim();

        let event = match input {
            "" => continue,
            "quit" | "q" => {
                println!("session stays resident; run again to resume");
                return Ok(());
            }
            "n" => SessionEvent::Next,
            "p" => SessionEvent::Previous,
            "ack" => SessionEvent::AcknowledgeWarning,
            _ => {
                if let Some(section) = input.strip_prefix('s').and_then(|s| s.parse::<usize>().ok())
                {
                    SessionEvent::JumpToSection(section.saturating_sub(1))
                } else if let Ok(option) = input.parse::<usize>() {
                    SessionEvent::Answer(option.saturating_sub(1))
                } else {
                    println!("unrecognized input: {input}");
                    continue;
                }
            }
        };

        if dispatch(&mut service, event).await? {
            return Ok(());
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Run,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Run,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so
    // core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let submission = build_submission(parsed.api_url.as_deref())?;
    let services =
        AppServices::new_sqlite(&parsed.db_url, Clock::default_clock(), submission).await?;

    match cmd {
        Command::Reset => {
            services.sessions().clear_session().await?;
            println!("resident session cleared (db={})", parsed.db_url);
            Ok(())
        }
        Command::Run => {
            if let Some(token) = parsed.applicant.as_deref() {
                services.verify_applicant(token).await?;
            }

            let service = match services.start_exam(ExamDefinition::sample()).await {
                Ok(service) => service,
                Err(ExamSessionError::MissingIdentity) => {
                    eprintln!(
                        "no applicant identity; pass --applicant <token> (stands in for the verification step)"
                    );
                    std::process::exit(2);
                }
                Err(err) => return Err(err.into()),
            };

            run_exam(service).await
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
