use crate::model::{EntityId, EventCategory, Quadrant, TaskCategory, TaskStatus};
use crate::schedule::ClockTime;
use crate::storage::StoreKey;
use crate::timer::TimerMode;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "focusflow",
    version,
    about = "Terminal planner: tasks, habits, priority matrix, day schedule and pomodoro timer"
)]
pub struct Cli {
    /// Data directory (overrides FOCUSFLOW_DATA_DIR and .focusflow discovery)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a .focusflow data directory in the current directory
    Init,
    /// Daily planner tasks
    #[command(subcommand)]
    Task(TaskCommand),
    /// Landing-page quick tasks
    #[command(subcommand)]
    Quick(QuickCommand),
    /// Urgent/important priority matrix
    #[command(subcommand)]
    Matrix(MatrixCommand),
    /// Habit tracker
    #[command(subcommand)]
    Habit(HabitCommand),
    /// Day planner events
    #[command(subcommand)]
    Event(EventCommand),
    /// Month calendar with task counts
    Calendar {
        /// Month to show (YYYY-MM, defaults to this month)
        #[arg(long, value_parser = parse_month)]
        month: Option<NaiveDate>,
    },
    /// Pomodoro settings and round counter
    #[command(subcommand)]
    Pomodoro(PomodoroCommand),
    /// Inspect or wipe stored data
    #[command(subcommand)]
    Data(DataCommand),
    /// Launch the interactive TUI
    Tui,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Add a task to a day (defaults to today)
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum, default_value = "today")]
        category: TaskCategory,
        /// Day in YYYY-MM-DD
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List tasks for a day
    List {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, value_enum)]
        status: Option<TaskStatus>,
    },
    /// Set a task's status
    Status {
        id: EntityId,
        #[arg(value_enum)]
        status: TaskStatus,
    },
    /// Edit a task's fields
    Edit {
        id: EntityId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum)]
        category: Option<TaskCategory>,
    },
    /// Delete a task
    Delete { id: EntityId },
}

#[derive(Subcommand, Debug)]
pub enum QuickCommand {
    Add { title: String },
    List,
    /// Flip a quick task between open and done
    Toggle { id: EntityId },
    Delete { id: EntityId },
}

#[derive(Subcommand, Debug)]
pub enum MatrixCommand {
    Add {
        title: String,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long, value_enum, default_value = "urgent-important")]
        quadrant: Quadrant,
    },
    List,
    Edit {
        id: EntityId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Move a task to another quadrant
    Move {
        id: EntityId,
        #[arg(value_enum)]
        quadrant: Quadrant,
    },
    Toggle { id: EntityId },
    Delete { id: EntityId },
}

#[derive(Subcommand, Debug)]
pub enum HabitCommand {
    Add { name: String },
    /// Show the habit grid for a month
    List {
        #[arg(long, value_parser = parse_month)]
        month: Option<NaiveDate>,
    },
    /// Toggle completion of a habit on a day (defaults to today)
    Toggle {
        id: EntityId,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Move a habit to another habit's position
    Reorder { id: EntityId, target: EntityId },
    Rename { id: EntityId, name: String },
    /// Delete a habit and all of its completions
    Delete {
        id: EntityId,
        #[arg(long)]
        yes: bool,
    },
    /// Monthly statistics
    Stats {
        #[arg(long, value_parser = parse_month)]
        month: Option<NaiveDate>,
    },
}

#[derive(Args, Debug)]
pub struct EventFields {
    #[arg(long)]
    pub start: Option<ClockTime>,
    #[arg(long)]
    pub end: Option<ClockTime>,
    #[arg(long, value_enum)]
    pub category: Option<EventCategory>,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum EventCommand {
    /// Add an event (defaults 09:00-10:00, work, today)
    Add {
        title: String,
        #[command(flatten)]
        fields: EventFields,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show the day timeline
    List {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Edit {
        id: EntityId,
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        fields: EventFields,
    },
    /// Move an event to a new start hour, keeping its length
    Move { id: EntityId, hour: u32 },
    Delete { id: EntityId },
}

#[derive(Subcommand, Debug)]
pub enum PomodoroCommand {
    /// Show settings and the round counter
    Status,
    /// Change durations (minutes) and switches
    Settings {
        #[arg(long)]
        focus: Option<u32>,
        #[arg(long)]
        short_break: Option<u32>,
        #[arg(long)]
        long_break: Option<u32>,
        #[arg(long)]
        deep_work: Option<u32>,
        #[arg(long)]
        rounds_until_long_break: Option<u32>,
        #[arg(long)]
        auto_next: Option<bool>,
        #[arg(long)]
        sound: Option<bool>,
    },
    /// Reset the round counter to zero
    ResetRounds,
    /// Run a countdown in the TUI starting in this mode
    Run {
        #[arg(value_enum, default_value = "focus")]
        mode: TimerMode,
    },
}

#[derive(Subcommand, Debug)]
pub enum DataCommand {
    /// Print every store
    Dump {
        /// Only print item counts
        #[arg(long)]
        summary: bool,
    },
    /// Remove one store
    Clear {
        #[arg(value_parser = parse_store_key)]
        store: StoreKey,
        #[arg(long)]
        yes: bool,
    },
    /// Remove all stores
    Reset {
        #[arg(long)]
        yes: bool,
    },
}

fn parse_month(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d")
        .map_err(|_| format!("invalid month (use YYYY-MM): {}", raw))
}

fn parse_store_key(raw: &str) -> Result<StoreKey, String> {
    StoreKey::from_suffix(raw.trim()).ok_or_else(|| {
        let known: Vec<&str> = StoreKey::ALL.iter().map(|k| k.suffix()).collect();
        format!("unknown store {} (one of: {})", raw, known.join(", "))
    })
}
