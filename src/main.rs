mod cli;
mod collection;
mod commands;
mod config;
mod dates;
mod diagnostics;
mod ledger;
mod model;
mod schedule;
mod storage;
mod timer;
mod ui;
mod views;

use anyhow::Result;
use clap::Parser;
use commands::Workspace;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // stderr keeps log lines out of command output and off the TUI's screen
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Cli::parse();
    let command = args.command.unwrap_or(cli::Command::Tui);
    // init creates the data directory, so it runs before any workspace lookup
    let data_dir = args.data_dir;
    let open = || Workspace::open(data_dir.clone());

    match command {
        cli::Command::Init => commands::init(),
        cli::Command::Task(cmd) => commands::task(&open()?, cmd),
        cli::Command::Quick(cmd) => commands::quick(&open()?, cmd),
        cli::Command::Matrix(cmd) => commands::matrix(&open()?, cmd),
        cli::Command::Habit(cmd) => commands::habit(&open()?, cmd),
        cli::Command::Event(cmd) => commands::event(&open()?, cmd),
        cli::Command::Calendar { month } => commands::calendar(&open()?, month),
        cli::Command::Pomodoro(cmd) => commands::pomodoro(&open()?, cmd),
        cli::Command::Data(cmd) => commands::data(&open()?, cmd),
        cli::Command::Tui => commands::tui(&open()?),
    }
}
