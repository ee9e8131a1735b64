use std::fmt;

use chrono::NaiveDate;
use learn_core::model::{Domain, QuizResult, Statistics, SubjectId, parse_date};
use services::{Clock, ProgressService, ProgressServices};
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_URL: &str = "sqlite://progress.sqlite3";
const DEFAULT_LOG_FILTER: &str = "app=info,services=info,storage=warn";
const DEFAULT_ACTIVITY_DAYS: u32 = 30;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArg { name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidDbUrl { raw: String },
    InvalidDomain { raw: String },
    InvalidDate { raw: String },
    InvalidNumber { name: &'static str, raw: String },
    InvalidSubject { raw: String },
    InvalidStats(String),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArg { name } => write!(f, "missing <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidDomain { raw } => write!(f, "invalid --domain value: {raw}"),
            ArgsError::InvalidDate { raw } => write!(f, "invalid date (expected YYYY-MM-DD): {raw}"),
            ArgsError::InvalidNumber { name, raw } => write!(f, "invalid <{name}>: {raw}"),
            ArgsError::InvalidSubject { raw } => write!(f, "invalid subject: {raw:?}"),
            ArgsError::InvalidStats(err) => write!(f, "invalid stats json: {err}"),
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
    eprintln!("  app [--db <sqlite_url>] [--domain general|finance] [--today <date>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  learn <subject> <date> <item>");
    eprintln!("  term <subject> <date> <item> <term>        # finance only");
    eprintln!("  quiz <subject> <score> <total>");
    eprintln!("  stats <subject> [--replace <json>]");
    eprintln!("  progress <subject> [--date <date|all>]");
    eprintln!("  achievements <subject>");
    eprintln!("  today <subject>");
    eprintln!("  activity <subject> [--days <n>]");
    eprintln!("  terms <subject> [--date <date|all>]         # finance only");
    eprintln!("  reset <subject>");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!("  --domain general");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LEARN_DB_URL, LEARN_DOMAIN, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Learn {
        subject: SubjectId,
        date: NaiveDate,
        item: u32,
    },
    Term {
        subject: SubjectId,
        date: NaiveDate,
        item: u32,
        term: String,
    },
    Quiz {
        subject: SubjectId,
        result: QuizResult,
    },
    Stats {
        subject: SubjectId,
        replace: Option<Statistics>,
    },
    Progress {
        subject: SubjectId,
        date_filter: Option<String>,
    },
    Achievements {
        subject: SubjectId,
    },
    Today {
        subject: SubjectId,
    },
    Activity {
        subject: SubjectId,
        days: u32,
    },
    Terms {
        subject: SubjectId,
        date_filter: Option<String>,
    },
    Reset {
        subject: SubjectId,
    },
}

#[derive(Debug)]
struct Args {
    db_url: String,
    domain: Domain,
    today: Option<NaiveDate>,
    command: Command,
}

fn parse_subject(raw: Option<String>) -> Result<SubjectId, ArgsError> {
    let raw = raw.ok_or(ArgsError::MissingArg { name: "subject" })?;
    raw.parse()
        .map_err(|_| ArgsError::InvalidSubject { raw: raw.clone() })
}

fn parse_day(raw: Option<String>) -> Result<NaiveDate, ArgsError> {
    let raw = raw.ok_or(ArgsError::MissingArg { name: "date" })?;
    parse_date(&raw).map_err(|_| ArgsError::InvalidDate { raw: raw.clone() })
}

fn parse_number(raw: Option<String>, name: &'static str) -> Result<u32, ArgsError> {
    let raw = raw.ok_or(ArgsError::MissingArg { name })?;
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { name, raw: raw.clone() })
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("LEARN_DB_URL")
            .ok()
            .map_or_else(|| normalize_sqlite_url(DEFAULT_DB_URL.into()), normalize_sqlite_url);
        let mut domain = match std::env::var("LEARN_DOMAIN") {
            Ok(raw) => raw
                .parse::<Domain>()
                .map_err(|_| ArgsError::InvalidDomain { raw })?,
            Err(_) => Domain::General,
        };
        let mut today = None;
        let mut date_filter = None;
        let mut days = DEFAULT_ACTIVITY_DAYS;
        let mut replace = None;
        let mut positional = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--domain" => {
                    let value = require_value(&mut args, "--domain")?;
                    domain = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidDomain { raw: value.clone() })?;
                }
                "--today" => today = Some(parse_day(Some(require_value(&mut args, "--today")?))?),
                "--date" => date_filter = Some(require_value(&mut args, "--date")?),
                "--days" => days = parse_number(Some(require_value(&mut args, "--days")?), "days")?,
                "--replace" => {
                    let value = require_value(&mut args, "--replace")?;
                    let stats = Statistics::decode(&value)
                        .map_err(|err| ArgsError::InvalidStats(err.to_string()))?;
                    replace = Some(stats);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let name = positional.next().ok_or(ArgsError::MissingArg { name: "command" })?;
        let command = match name.as_str() {
            "learn" => Command::Learn {
                subject: parse_subject(positional.next())?,
                date: parse_day(positional.next())?,
                item: parse_number(positional.next(), "item")?,
            },
            "term" => Command::Term {
                subject: parse_subject(positional.next())?,
                date: parse_day(positional.next())?,
                item: parse_number(positional.next(), "item")?,
                term: positional.next().ok_or(ArgsError::MissingArg { name: "term" })?,
            },
            "quiz" => Command::Quiz {
                subject: parse_subject(positional.next())?,
                result: QuizResult::new(
                    parse_number(positional.next(), "score")?,
                    parse_number(positional.next(), "total")?,
                ),
            },
            "stats" => Command::Stats {
                subject: parse_subject(positional.next())?,
                replace,
            },
            "progress" => Command::Progress {
                subject: parse_subject(positional.next())?,
                date_filter,
            },
            "achievements" => Command::Achievements {
                subject: parse_subject(positional.next())?,
            },
            "today" => Command::Today {
                subject: parse_subject(positional.next())?,
            },
            "activity" => Command::Activity {
                subject: parse_subject(positional.next())?,
                days,
            },
            "terms" => Command::Terms {
                subject: parse_subject(positional.next())?,
                date_filter,
            },
            "reset" => Command::Reset {
                subject: parse_subject(positional.next())?,
            },
            _ => return Err(ArgsError::UnknownCommand(name)),
        };
        if let Some(extra) = positional.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Self {
            db_url,
            domain,
            today,
            command,
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

fn print_json(value: &impl serde::Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn execute(
    service: &ProgressService,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    let queries = service.queries();
    match command {
        Command::Learn {
            subject,
            date,
            item,
        } => print_json(&service.recorder().record_item_learned(&subject, date, item).await?),
        Command::Term {
            subject,
            date,
            item,
            term,
        } => print_json(
            &service
                .recorder()
                .record_term_learned(&subject, date, item, &term)
                .await?,
        ),
        Command::Quiz { subject, result } => {
            print_json(&service.quiz().record_quiz_result(&subject, result).await?)
        }
        Command::Stats { subject, replace } => match replace {
            Some(stats) => print_json(&service.replace_stats(&subject, stats).await?),
            None => print_json(&queries.get_stats(&subject).await?),
        },
        Command::Progress {
            subject,
            date_filter,
        } => {
            if service.domain().tracks_terms() {
                print_json(&queries.composite_view(&subject, date_filter.as_deref()).await?)
            } else {
                print_json(&queries.progress_on(&subject, date_filter.as_deref()).await?)
            }
        }
        Command::Achievements { subject } => {
            print_json(&service.achievements().evaluate(&subject).await?)
        }
        Command::Today { subject } => print_json(&queries.today_summary(&subject).await?),
        Command::Activity { subject, days } => {
            print_json(&queries.daily_activity(&subject, days).await?)
        }
        Command::Terms {
            subject,
            date_filter,
        } => print_json(&queries.learned_terms(&subject, date_filter.as_deref()).await?),
        Command::Reset { subject } => {
            let removed = service.reset_subject(&subject).await?;
            print_json(&serde_json::json!({ "removed": removed }))
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    if argv.is_empty() {
        print_usage();
        return Ok(());
    }

    let parsed = Args::parse(argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let clock = parsed.today.map_or_else(Clock::default, Clock::fixed_on);
    let services = ProgressServices::new_sqlite(&parsed.db_url, clock).await?;
    tracing::debug!(db_url = %parsed.db_url, domain = %parsed.domain, "services ready");

    execute(&services.for_domain(parsed.domain), parsed.command).await
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
