use std::fmt;

use chrono::{DateTime, Utc};
use quiz_core::model::{NewQuestion, QuestionDraft, UserId, UserProfile};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    users: u32,
    questions: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUsers { raw: String },
    InvalidQuestions { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUsers { raw } => write!(f, "invalid --users value: {raw}"),
            ArgsError::InvalidQuestions { raw } => write!(f, "invalid --questions value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("QUIZ_DB_URL").unwrap_or_else(|_| "sqlite:quiz.sqlite3?mode=rwc".into());
        let mut users = std::env::var("QUIZ_SEED_USERS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(3);
        let mut questions = std::env::var("QUIZ_SEED_QUESTIONS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(5);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--users" => {
                    let value = require_value(&mut args, "--users")?;
                    users = value
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or(ArgsError::InvalidUsers { raw: value })?;
                }
                "--questions" => {
                    let value = require_value(&mut args, "--questions")?;
                    questions = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidQuestions { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
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
            users: users.max(1),
            questions,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:quiz.sqlite3?mode=rwc)");
    eprintln!("  --users <n>               Number of learner profiles to create (default: 3)");
    eprintln!("  --questions <n>           Number of sample questions to insert (default: 5)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  QUIZ_DB_URL, QUIZ_SEED_USERS, QUIZ_SEED_QUESTIONS");
}

const SAMPLES: [(&str, [&str; 4], usize); 5] = [
    (
        "Which keyword moves a value into a closure?",
        ["ref", "move", "mut", "static"],
        1,
    ),
    (
        "What does the ? operator do on an Err?",
        ["Panics", "Ignores it", "Returns it early", "Logs it"],
        2,
    ),
    (
        "Which type gives shared ownership across threads?",
        ["Rc", "Box", "Cell", "Arc"],
        3,
    ),
    (
        "Which trait allows a type to be printed with {}?",
        ["Display", "Debug", "ToOwned", "Default"],
        0,
    ),
    (
        "What is the size of a u16 in bytes?",
        ["1", "2", "4", "8"],
        1,
    ),
];

fn learner(i: u32, now: DateTime<Utc>) -> Result<UserProfile, quiz_core::Error> {
    let uid = UserId::new(format!("seed-user-{i}"))?;
    Ok(UserProfile::new(
        uid,
        format!("Learner {i}"),
        format!("learner{i}@example.com"),
        now,
    )?)
}

fn sample_question(
    i: usize,
    author: UserId,
    now: DateTime<Utc>,
) -> Result<NewQuestion, quiz_core::Error> {
    let (text, options, correct) = SAMPLES[i % SAMPLES.len()];
    let draft = QuestionDraft::new(
        text,
        options.iter().map(|o| (*o).to_string()).collect(),
        correct,
    );
    Ok(draft.validate(author, now)?)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let mut uids = Vec::with_capacity(args.users as usize);
    for i in 1..=args.users {
        let profile = learner(i, now)?;
        storage.profiles.insert_profile(&profile).await?;
        uids.push(profile.uid().clone());
    }

    let mut drafts = Vec::with_capacity(args.questions as usize);
    for i in 0..args.questions as usize {
        let author = uids[i % uids.len()].clone();
        drafts.push(sample_question(i, author, now)?);
    }
    let ids = storage.questions.insert_questions(&drafts).await?;

    println!(
        "Seeded {} users and {} questions into {}",
        uids.len(),
        ids.len(),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
