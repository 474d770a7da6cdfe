pub mod output;
pub mod process;

use std::{env, fmt::Display, path::PathBuf};

use anyhow::Result;
use chrono::{Duration, Local};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use now::DateTimeNow;
use process::{kill_previous_servers, restart_server};
use tracing::level_filters::LevelFilter;

use crate::{
    cli::output::{
        extract_sessions_between,
        render::{render_aggregate, render_history_line, render_session},
        ExtractConfig,
    },
    daemon::{start_daemon, stats::SessionStats, storage::stats_storage::{StatsStorage, StatsStorageImpl}},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Sipwatch", version, long_about = None)]
#[command(about = "Hydration reminders that adapt to your keyboard and mouse activity", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon for the application")]
    Init {},
    #[command(about = "Show reminder and activity statistics for one day or week")]
    Stats {
        #[arg(
            long,
            help = "Day to show. Examples are \"yesterday\", \"15/03/2025\", \"last friday\". Defaults to today"
        )]
        date: Option<String>,
        #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
        date_style: DateStyle,
        #[arg(long, help = "Aggregate the whole week around the chosen day")]
        week: bool,
    },
    #[command(about = "List individual reminders and how they were answered")]
    History {
        #[arg(
            long = "start",
            short,
            help = "Start of the range. Examples are \"yesterday\", \"15/03/2025\", \"last friday\". Defaults to a week ago"
        )]
        start_date: Option<String>,
        #[arg(
            long = "end",
            short,
            help = "End of the range. Examples are \"yesterday\", \"15/03/2025\". Defaults to today"
        )]
        end_date: Option<String>,
        #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
        date_style: DateStyle,
    },
    #[command(
        about = "Run a daemon directly in current console. Used for creating a daemon internally and for debugging"
    )]
    Serve {
        #[arg(
            long,
            help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
    },
    #[command(about = "Stop currently running daemon.")]
    Stop {},
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let app_dir = create_application_default_path()?;
    enable_logging(CLI_PREFIX, &app_dir, logging_level, args.log)?;

    match args.commands {
        Commands::Init {} => {
            restart_server()?;
            Ok(())
        }
        Commands::Stop {} => {
            let process_name = env::current_exe().expect("Can't operate without an executable");
            kill_previous_servers(&process_name);
            Ok(())
        }
        Commands::Serve { dir } => {
            start_daemon(dir.map_or(app_dir, |v| v)).await?;
            Ok(())
        }
        Commands::Stats {
            date,
            date_style,
            week,
        } => process_stats_command(app_dir, date, date_style, week).await,
        Commands::History {
            start_date,
            end_date,
            date_style,
        } => process_history_command(app_dir, start_date, end_date, date_style).await,
    }
}

fn parse_date_arg(
    value: Option<String>,
    date_style: DateStyle,
    fallback: chrono::DateTime<Local>,
) -> Result<chrono::DateTime<Local>> {
    let now = Local::now();
    match value.map(|s| parse_date_string(&s, now, date_style.into())) {
        Some(Ok(v)) => Ok(v.with_timezone(&Local)),
        Some(Err(e)) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to valiate date {e}"),
            )
            .into()),
        None => Ok(fallback),
    }
}

async fn process_stats_command(
    app_dir: PathBuf,
    date: Option<String>,
    date_style: DateStyle,
    week: bool,
) -> Result<()> {
    let reference = parse_date_arg(date, date_style, Local::now())?;
    let storage = StatsStorageImpl::new(app_dir.join("sessions"))?;

    if week {
        let start = reference.beginning_of_week().date_naive();
        let end = reference.end_of_week().date_naive();

        let sessions = extract_sessions_between(storage, ExtractConfig { start, end });
        tokio::pin!(sessions);

        let mut merged = SessionStats::default();
        let mut seen = 0u32;
        while let Some(session) = sessions.next().await {
            merged.merge(&session?.stats);
            seen += 1;
        }

        if seen == 0 {
            println!("No sessions recorded between {start} and {end}");
        } else {
            print!("{}", render_aggregate(&format!("Week {start} - {end}"), &merged));
        }
    } else {
        let date = reference.date_naive();
        match storage.load_session(date).await? {
            Some(record) => print!("{}", render_session(&record)),
            None => println!("No session recorded for {date}"),
        }
    }
    Ok(())
}

const DEFAULT_HISTORY_DAYS: i64 = 7;

async fn process_history_command(
    app_dir: PathBuf,
    start_date: Option<String>,
    end_date: Option<String>,
    date_style: DateStyle,
) -> Result<()> {
    let now = Local::now();
    let start = parse_date_arg(
        start_date,
        date_style,
        (now - Duration::days(DEFAULT_HISTORY_DAYS - 1)).beginning_of_day(),
    )?;
    let end = parse_date_arg(end_date, date_style, now)?;

    let storage = StatsStorageImpl::new(app_dir.join("sessions"))?;
    let sessions = extract_sessions_between(
        storage,
        ExtractConfig {
            start: start.date_naive(),
            end: end.date_naive(),
        },
    );
    tokio::pin!(sessions);

    let mut printed_any = false;
    while let Some(session) = sessions.next().await {
        let session = session?;
        if session.history.is_empty() {
            continue;
        }
        printed_any = true;

        println!(
            "{}",
            ansi_term::Style::new().bold().paint(session.date.to_string())
        );
        for record in &session.history {
            println!("{}", render_history_line(record));
        }
        println!();
    }

    if !printed_any {
        println!("No reminders recorded in the selected range");
    }
    Ok(())
}
