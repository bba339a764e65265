use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::grid::WeekStart;
use crate::model::EventType;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "calio",
    version,
    about = "Calio: a personal calendar with lunar dates, entries, events and tasks",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "caliorc", global = true)]
    pub caliorc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sign in, registering the email on first use.
    Login { email: String },
    Logout,
    Whoami,
    /// Month grid (default command).
    Month {
        /// YYYY-MM or a day expression such as `today` or `+1m`.
        month: Option<String>,
        #[arg(
            long = "week-start",
            value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<WeekStart>())
        )]
        week_start: Option<WeekStart>,
    },
    /// Everything recorded on one day.
    Day { date: Option<String> },
    /// Tasks grouped by due date; unscheduled ones last.
    Tasks(RangeArgs),
    #[command(subcommand)]
    Entry(EntryAction),
    #[command(subcommand)]
    Event(EventAction),
    #[command(subcommand)]
    Task(TaskAction),
    #[command(subcommand)]
    Category(CategoryAction),
}

#[derive(Args, Debug, Clone, Default)]
pub struct RangeArgs {
    #[arg(long)]
    pub start: Option<String>,
    #[arg(long)]
    pub end: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum EntryAction {
    Add {
        content: String,
        #[arg(long, default_value = "today")]
        date: String,
        /// Category name or id prefix.
        #[arg(long)]
        category: String,
        #[arg(long)]
        title: Option<String>,
    },
    Edit {
        id: String,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, conflicts_with = "clear_title")]
        title: Option<String>,
        #[arg(long)]
        clear_title: bool,
    },
    Rm { id: String },
    List(RangeArgs),
}

#[derive(Subcommand, Debug, Clone)]
pub enum EventAction {
    Add {
        title: String,
        #[arg(long, default_value = "today")]
        date: String,
        /// Start time as HH:MM; omit for an all-day event.
        #[arg(long)]
        time: Option<String>,
        #[arg(
            long = "type",
            default_value = "appointment",
            value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<EventType>())
        )]
        event_type: EventType,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        content: Option<String>,
        /// The date was picked on the lunar calendar.
        #[arg(long)]
        lunar: bool,
        #[arg(long)]
        yearly: bool,
    },
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long, conflicts_with = "all_day")]
        time: Option<String>,
        #[arg(long)]
        all_day: bool,
        #[arg(
            long = "type",
            value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<EventType>())
        )]
        event_type: Option<EventType>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        yearly: Option<bool>,
    },
    Rm { id: String },
    List(RangeArgs),
}

#[derive(Subcommand, Debug, Clone)]
pub enum TaskAction {
    Add {
        title: String,
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "no_due")]
        due: Option<String>,
        #[arg(long)]
        no_due: bool,
        #[arg(long)]
        notes: Option<String>,
    },
    Done { id: String },
    Undo { id: String },
    Rm { id: String },
    List(RangeArgs),
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategoryAction {
    Add {
        name: String,
        #[arg(long)]
        bg: Option<String>,
        #[arg(long)]
        fg: Option<String>,
        #[arg(long)]
        order: Option<i32>,
    },
    Edit {
        /// Category name or id prefix.
        category: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        bg: Option<String>,
        #[arg(long)]
        fg: Option<String>,
        #[arg(long)]
        order: Option<i32>,
    },
    Rm { category: String },
    List,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}
