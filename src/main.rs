mod cli;
mod commands;
mod document;
mod settings;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use settings::Settings;
use std::io;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub settings: Settings,
}

fn main() -> Result<()> {
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

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "firstboot", &mut io::stdout());
        return Ok(());
    }

    let ctx = Context {
        quiet: cli.quiet,
        settings: Settings::load(cli.settings.as_deref())?,
    };

    match cli.command {
        Command::FetchConfig(args) => commands::fetch_config::run(&ctx, args),
        Command::Files(args) => commands::files::run(&ctx, args),
        Command::Completions { .. } => Ok(()),
    }
}
