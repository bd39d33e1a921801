use std::fmt;
use std::path::PathBuf;

use quiz_core::model::{LeaderboardEntry, UserId};
use services::{AppServices, Clock, EngineConfig, OpenAiExtractor};
use tracing_subscriber::{EnvFilter, fmt as log_fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingCommand,
    UnknownArg(String),
    UnknownCommand(String),
    InvalidDbUrl { raw: String },
    InvalidCreator { raw: String },
    MissingFile,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingCommand => write!(f, "a subcommand is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidCreator { raw } => write!(f, "invalid --creator value: {raw:?}"),
            ArgsError::MissingFile => write!(f, "import requires a file path"),
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

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Leaderboard { watch: bool },
    Questions { all: bool },
    ResetStats,
    Import { file: PathBuf, creator: UserId },
}

#[derive(Debug)]
struct Args {
    db_url: String,
    command: Command,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--db <sqlite_url>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  leaderboard [--watch]               Print the participation ranking");
    eprintln!("  questions [--all]                   List practice questions (--all adds hidden)");
    eprintln!("  reset-stats                         Clear answers, ratings and counters");
    eprintln!("  import <file> --creator <uid>       Extract questions from a text file");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:quiz.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_BATCH_SIZE, QUIZ_SELECTION, QUIZ_RATING_ATTEMPTS,");
    eprintln!("  QUIZ_ANSWER_ATTEMPTS, QUIZ_ANSWER_RETRY_MS, QUIZ_AI_API_KEY, QUIZ_AI_BASE_URL,");
    eprintln!("  QUIZ_AI_MODEL, RUST_LOG");
}

impl Args {
    fn parse(argv: impl IntoIterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUIZ_DB_URL")
            .ok()
            .map_or_else(|| normalize_sqlite_url("sqlite:quiz.sqlite3".into()), normalize_sqlite_url);

        let mut args = argv.into_iter();
        let mut command = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => {
                    command = Some(Self::parse_command(&arg, &mut args, &mut db_url)?);
                    break;
                }
            }
        }

        Ok(Self {
            db_url,
            command: command.ok_or(ArgsError::MissingCommand)?,
        })
    }

    fn parse_command(
        name: &str,
        args: &mut impl Iterator<Item = String>,
        db_url: &mut String,
    ) -> Result<Command, ArgsError> {
        let mut watch = false;
        let mut all = false;
        let mut file = None;
        let mut creator = None;

        while let Some(arg) = args.next() {
            match (name, arg.as_str()) {
                (_, "--db") => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    *db_url = normalize_sqlite_url(value);
                }
                ("leaderboard", "--watch") => watch = true,
                ("questions", "--all") => all = true,
                ("import", "--creator") => {
                    let value = require_value(args, "--creator")?;
                    creator = Some(
                        UserId::new(value.clone())
                            .map_err(|_| ArgsError::InvalidCreator { raw: value })?,
                    );
                }
                ("import", path) if !path.starts_with("--") && file.is_none() => {
                    file = Some(PathBuf::from(path));
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        match name {
            "leaderboard" => Ok(Command::Leaderboard { watch }),
            "questions" => Ok(Command::Questions { all }),
            "reset-stats" => Ok(Command::ResetStats),
            "import" => Ok(Command::Import {
                file: file.ok_or(ArgsError::MissingFile)?,
                creator: creator.ok_or(ArgsError::MissingValue { flag: "--creator" })?,
            }),
            other => Err(ArgsError::UnknownCommand(other.to_string())),
        }
    }
}

/// Every pooled connection must see the same in-memory database.
const SHARED_MEMORY_URL: &str = "sqlite:file:quiz-cli?mode=memory&cache=shared";

fn normalize_sqlite_url(raw: String) -> String {
    let trimmed = raw.trim().to_string();
    if trimmed == "sqlite::memory:" || trimmed == ":memory:" {
        return SHARED_MEMORY_URL.to_string();
    }
    if trimmed.starts_with("sqlite://") || trimmed.starts_with("sqlite:file:") {
        return trimmed;
    }

    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        // in-memory and `sqlite:file:` URLs need no file on disk
        return Ok(());
    };
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

fn print_leaderboard(entries: &[LeaderboardEntry]) {
    if entries.is_empty() {
        println!("(nobody has answered yet)");
        return;
    }
    for (place, entry) in entries.iter().enumerate() {
        println!(
            "{:>3}. {:<24} {:>6}",
            place + 1,
            entry.display_name,
            entry.total_answered
        );
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&args.db_url)?;
    let config = EngineConfig::from_env();
    let app = AppServices::new_sqlite(&args.db_url, Clock::system(), config).await?;
    tracing::debug!(db = %args.db_url, ?config, "engine ready");

    match args.command {
        Command::Leaderboard { watch: false } => {
            print_leaderboard(&app.leaderboard().snapshot().await?);
        }
        Command::Leaderboard { watch: true } => {
            let _subscription = app.leaderboard().subscribe(|entries| {
                println!("--- leaderboard ---");
                print_leaderboard(&entries);
            });
            tokio::signal::ctrl_c().await?;
        }
        Command::Questions { all } => {
            let questions = if all {
                app.questions().list_all().await?
            } else {
                app.questions().list_visible().await?
            };
            let authors: Vec<UserId> = questions.iter().map(|q| q.created_by().clone()).collect();
            let names = app.profiles().display_names(&authors).await?;
            for q in &questions {
                let author = names
                    .get(q.created_by())
                    .map_or(q.created_by().as_str(), String::as_str);
                let marker = if q.is_hidden() { " [hidden]" } else { "" };
                println!(
                    "#{} {}{} (avg {:.1} from {} ratings, answered {}x, by {})",
                    q.id(),
                    q.text(),
                    marker,
                    q.avg_rating(),
                    q.ratings().len(),
                    q.times_answered(),
                    author
                );
                for (i, option) in q.options().iter().enumerate() {
                    let tick = if i == q.correct_option_index() { '*' } else { ' ' };
                    println!("    {tick} {i}. {option}");
                }
            }
            println!("{} of {} questions", questions.len(), app.questions().count().await?);
        }
        Command::ResetStats => {
            let report = app.maintenance().reset_statistics().await?;
            println!(
                "reset {} users, {} questions, deleted {} answers",
                report.users, report.questions, report.answers_deleted
            );
        }
        Command::Import { file, creator } => {
            let text = std::fs::read_to_string(&file)?;
            let extractor = OpenAiExtractor::from_env();
            if !extractor.enabled() {
                return Err("QUIZ_AI_API_KEY is not set".into());
            }
            let written = app
                .questions()
                .import_from_text(&extractor, &text, &creator)
                .await?;
            println!("imported {written} questions from {}", file.display());
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(log_fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
