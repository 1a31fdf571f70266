// src/bin/fonk.rs

use anyhow::Result;
use colored::*;
use fonk::{
    cli::{self, ParsedArgs, help},
    constants::{EXIT_FAILURE, EXIT_SUCCESS, FLAG_HELP},
    core::{
        config_loader,
        report::{self, ConsoleReporter},
        resolver::CommandError,
        session::{Mode, RunStatus, Session, SessionOptions},
    },
};
use std::env;

/// The main entry point of the `fonk` application.
/// It sets up logging, runs the CLI and maps errors to exit statuses.
fn main() {
    env_logger::init();

    match run_cli() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // Usage errors and clap's own output keep clap's formatting and status.
            if let Some(clap_error) = e.downcast_ref::<clap::Error>() {
                clap_error.exit();
            }

            eprintln!("\n{}: {}", "Error".red().bold(), e);
            std::process::exit(cli::exit_status(&e));
        }
    }
}

/// Loads the project, parses the command line and runs what was asked for.
/// Returns the process exit status.
fn run_cli() -> Result<i32> {
    let cwd = env::current_dir()?;
    let config = config_loader::load_config(&cwd)?;
    let ParsedArgs {
        mut runnables,
        mut flags,
    } = cli::parse_args(&config, env::args_os().skip(1))?;

    if flags.contains(FLAG_HELP) {
        let use_colors = colored::control::SHOULD_COLORIZE.should_colorize();
        if runnables.is_empty() {
            print!("{}", help::render_help(&config, use_colors));
        } else {
            for name in &runnables {
                print!("{}", help::render_runnable_help(&config, name, use_colors));
            }
        }
        return Ok(EXIT_SUCCESS);
    }

    if runnables.is_empty() {
        let default = config.default.as_ref().ok_or(CommandError::NoRunnables)?;
        log::debug!("No runnables given, using default '{}'", default.command);
        runnables.push(default.command.clone());
        // `insert` keeps an existing entry, so flags typed by the user win.
        for flag in config.activate(&default.flags)? {
            flags.insert(flag);
        }
    }

    let options = SessionOptions::from_flags(&flags)?;
    let mut session = Session::new(&config, options, report::shared(ConsoleReporter::new()));

    match options.mode {
        Mode::Sequential => {
            if let RunStatus::Aborted { command, code } = session.run_runnables(&runnables, &flags)? {
                log::debug!("Fail-quick: '{}' returned {}, exiting", command, code);
                return Ok(EXIT_FAILURE);
            }
        }
        Mode::Concurrent { limit } => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(session.run_runnables_concurrently(&runnables, &flags, limit))?;
        }
    }

    Ok(session.finish())
}
