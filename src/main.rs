mod cli;
mod commands;
mod config;
mod progress;
mod resource;
mod transport;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, ConnectionArgs};
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub config: Option<String>,
    pub connection: ConnectionArgs,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        quiet: cli.quiet,
        config: cli.config,
        connection: cli.connection,
    };

    let failed = match cli.command {
        Command::Apply(args) => commands::apply::run(&ctx, args)?,
        Command::Plan(args) => commands::plan::run(&ctx, args)?,
        Command::Parse(args) => {
            commands::parse::run(args)?;
            false
        }
        Command::Catalog { kind } => {
            commands::catalog::run(kind.as_deref())?;
            false
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "ddctl", &mut io::stdout());
            false
        }
    };

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
