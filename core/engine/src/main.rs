use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use worklog_engine::{
    Database, Engine, EngineConfig, IdentityStore, JsonFileSource, LLMNarrator, NewMeeting,
    SourceClient,
};
use worklog_schemas::{Identity, MeetingId, MeetingPlatform, Role, SourceKind, SummaryId};

#[derive(Parser, Debug)]
#[command(name = "worklog")]
#[command(about = "Generate and read work summaries across activity sources")]
struct Cli {
    /// Path to SQLite database file (overrides WORKLOG_DB_PATH)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// JSON export of activity records to serve as every source
    #[arg(long, global = true)]
    activity_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage identities
    #[command(subcommand)]
    Identity(IdentityCommand),

    /// Generate (or fetch) a daily summary
    Daily {
        #[arg(long = "as")]
        requester: String,
        owner: String,
        date: NaiveDate,
    },

    /// Roll dailies up into a weekly summary
    Weekly {
        #[arg(long = "as")]
        requester: String,
        owner: String,
        week_start: NaiveDate,
    },

    /// Roll dailies up into a monthly summary
    Monthly {
        #[arg(long = "as")]
        requester: String,
        owner: String,
        year: i32,
        month: u32,
    },

    /// Roll monthlies up into a yearly summary
    Yearly {
        #[arg(long = "as")]
        requester: String,
        owner: String,
        year: i32,
    },

    /// Show one summary
    Show {
        #[arg(long = "as")]
        requester: String,
        id: String,
    },

    /// List an owner's summaries in a date range
    List {
        #[arg(long = "as")]
        requester: String,
        owner: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    /// Summaries of a manager's direct reports in a date range
    Team {
        #[arg(long = "as")]
        requester: String,
        manager: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    /// Re-run narrative generation for a summary
    Regenerate {
        #[arg(long = "as")]
        requester: String,
        id: String,
    },

    /// Meeting minutes
    #[command(subcommand)]
    Meeting(MeetingCommand),

    /// Check whether one identity may see another
    CanAccess { requester: String, target: String },
}

#[derive(Subcommand, Debug)]
enum IdentityCommand {
    /// Register or update an identity
    Add(IdentityArgs),
}

#[derive(Args, Debug)]
struct IdentityArgs {
    username: String,

    #[arg(long)]
    role: Role,

    #[arg(long)]
    manager: Option<String>,

    #[arg(long)]
    display_name: Option<String>,

    /// Per-source account, e.g. `code_host=alice-gh`
    #[arg(long = "handle", value_parser = parse_handle)]
    handles: Vec<(SourceKind, String)>,
}

#[derive(Subcommand, Debug)]
enum MeetingCommand {
    /// Generate minutes from a transcript file
    Record {
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "other")]
        platform: MeetingPlatform,

        /// RFC 3339 start time
        #[arg(long)]
        date: DateTime<Utc>,

        #[arg(long)]
        duration_minutes: Option<u32>,

        #[arg(long)]
        meeting_ref: Option<String>,

        #[arg(long)]
        transcript_file: PathBuf,

        #[arg(long = "participant")]
        participants: Vec<String>,
    },

    /// Show minutes
    Show {
        #[arg(long = "as")]
        requester: String,
        id: String,
    },

    /// Re-run minutes generation from the stored transcript
    Regenerate {
        #[arg(long = "as")]
        requester: String,
        id: String,
    },

    /// Meetings a user attended in a date range
    List {
        #[arg(long = "as")]
        requester: String,
        username: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    /// Meetings attended by a manager's direct reports
    Team {
        #[arg(long = "as")]
        requester: String,
        manager: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    /// A user's meetings mentioning a phrase
    Search {
        #[arg(long = "as")]
        requester: String,
        username: String,
        query: String,
        start: NaiveDate,
        end: NaiveDate,
    },
}

fn parse_handle(raw: &str) -> Result<(SourceKind, String), String> {
    let (source, handle) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SOURCE=HANDLE, got '{}'", raw))?;
    Ok((source.parse()?, handle.to_string()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = EngineConfig::from_env()?;
    if let Some(path) = cli.db_path {
        config.db_path = path;
    }

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let db = Arc::new(Database::new(&config.db_path)?);
    info!("Database: {}", config.db_path.display());

    let sources: Vec<Box<dyn SourceClient>> = match &cli.activity_file {
        Some(path) => JsonFileSource::all_sources(path)?,
        None => Vec::new(),
    };
    let narrator = Arc::new(LLMNarrator::new(config.llm.clone())?);
    let engine = Engine::with_database(db.clone(), sources, narrator, &config)?;

    match cli.command {
        Command::Identity(IdentityCommand::Add(args)) => {
            let mut identity = Identity::new(args.username, args.role);
            identity.display_name = args.display_name;
            identity.manager = args.manager;
            for (source, handle) in args.handles {
                identity = identity.with_handle(source, handle);
            }
            db.upsert_identity(&identity)?;
            print_json(&identity)?;
        }
        Command::Daily {
            requester,
            owner,
            date,
        } => {
            print_json(&engine.generate_daily_for(&requester, &owner, date).await?)?;
        }
        Command::Weekly {
            requester,
            owner,
            week_start,
        } => {
            print_json(&engine.generate_weekly_for(&requester, &owner, week_start).await?)?;
        }
        Command::Monthly {
            requester,
            owner,
            year,
            month,
        } => {
            print_json(&engine.generate_monthly_for(&requester, &owner, year, month).await?)?;
        }
        Command::Yearly {
            requester,
            owner,
            year,
        } => {
            print_json(&engine.generate_yearly_for(&requester, &owner, year).await?)?;
        }
        Command::Show { requester, id } => {
            print_json(&engine.summary_for(&requester, &SummaryId(id))?)?;
        }
        Command::List {
            requester,
            owner,
            start,
            end,
        } => {
            print_json(&engine.summaries_for(&requester, &owner, start, end)?)?;
        }
        Command::Team {
            requester,
            manager,
            start,
            end,
        } => {
            print_json(&engine.team_summaries_for(&requester, &manager, start, end)?)?;
        }
        Command::Regenerate { requester, id } => {
            print_json(&engine.regenerate_summary_for(&requester, &SummaryId(id)).await?)?;
        }
        Command::Meeting(MeetingCommand::Record {
            title,
            platform,
            date,
            duration_minutes,
            meeting_ref,
            transcript_file,
            participants,
        }) => {
            let transcript = std::fs::read_to_string(&transcript_file)
                .with_context(|| format!("Failed to read transcript {}", transcript_file.display()))?;
            let minutes = engine
                .meetings()
                .generate(NewMeeting {
                    meeting_ref,
                    title,
                    platform,
                    meeting_date: date,
                    duration_minutes,
                    transcript,
                    participants,
                })
                .await?;
            print_json(&minutes)?;
        }
        Command::Meeting(MeetingCommand::Show { requester, id }) => {
            print_json(&engine.meeting_for(&requester, &MeetingId(id))?)?;
        }
        Command::Meeting(MeetingCommand::Regenerate { requester, id }) => {
            print_json(&engine.regenerate_meeting_for(&requester, &MeetingId(id)).await?)?;
        }
        Command::Meeting(MeetingCommand::List {
            requester,
            username,
            start,
            end,
        }) => {
            print_json(&engine.meetings_for(&requester, &username, start, end)?)?;
        }
        Command::Meeting(MeetingCommand::Team {
            requester,
            manager,
            start,
            end,
        }) => {
            print_json(&engine.team_meetings_for(&requester, &manager, start, end)?)?;
        }
        Command::Meeting(MeetingCommand::Search {
            requester,
            username,
            query,
            start,
            end,
        }) => {
            print_json(&engine.search_meetings_for(&requester, &username, &query, start, end)?)?;
        }
        Command::CanAccess { requester, target } => {
            let granted = engine.can_access(&requester, &target)?;
            print_json(&serde_json::json!({
                "requester": requester,
                "target": target,
                "granted": granted,
            }))?;
        }
    }

    Ok(())
}
