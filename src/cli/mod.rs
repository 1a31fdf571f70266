//! # Command Line
//!
//! fonk has no fixed set of options: every flag in the project's catalog becomes a
//! `--name` (and `-s`) option, so the parser is assembled at runtime from the loaded
//! [`Config`] with clap's builder API.
use crate::{
    constants::{
        EXIT_COMMAND_ERROR, EXIT_CONFIGURATION_ERROR, EXIT_FAILURE, EXIT_LAUNCH_ERROR,
        FLAG_CONCURRENT,
    },
    core::{config_loader::ConfigError, resolver::CommandError, session::SessionError},
    models::{ActiveFlag, ActiveFlags, Config, FlagKind, OptionInstance},
    system::executor::ExecutionError,
};
use anyhow::Result;
use clap::{Arg, ArgAction};
use std::ffi::OsString;

/// Project and per-runnable help.
pub mod help;

// Not a valid flag name, so it can never collide with a catalog flag.
const RUNNABLES_ID: &str = "<runnables>";

/// What was typed on the command line, checked against the catalog.
#[derive(Debug, Clone, Default)]
pub struct ParsedArgs {
    /// Commands and aliases, in the order given.
    pub runnables: Vec<String>,
    /// The flags given, options bound to their values.
    pub flags: ActiveFlags,
}

/// Builds the parser for a project's flag catalog.
///
/// Switches take no value. Options with a default take an optional value; the bare
/// flag uses the default. `--concurrent` only takes its value as `--concurrent=N`, so
/// `-j lint` runs `lint`. Options without a default always need a value.
pub fn build_parser(config: &Config) -> clap::Command {
    let mut parser = clap::Command::new("fonk")
        .no_binary_name(true)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .about(t!("cli.about"))
        .arg(
            Arg::new(RUNNABLES_ID)
                .value_name("RUNNABLE")
                .action(ArgAction::Append)
                .num_args(0..),
        );

    for flag in &config.flags {
        let mut arg = Arg::new(flag.name.clone()).long(flag.name.clone());
        if let Some(shorthand) = flag.shorthand {
            arg = arg.short(shorthand);
        }
        if let Some(description) = &flag.description {
            arg = arg.help(description.clone());
        }
        arg = match &flag.kind {
            FlagKind::Switch => arg.action(ArgAction::SetTrue),
            FlagKind::Option {
                default: Some(default),
                ..
            } => arg
                .action(ArgAction::Set)
                .num_args(0..=1)
                .require_equals(flag.name == FLAG_CONCURRENT)
                .default_missing_value(default.clone()),
            FlagKind::Option { default: None, .. } => arg.action(ArgAction::Set).num_args(1),
        };
        parser = parser.arg(arg);
    }

    parser
}

/// Parses `args` (without the program name) against the catalog of `config`.
///
/// # Errors
/// A `clap::Error` for unknown flags or missing values, and a `ConfigError` for an
/// option value that does not coerce to the option's type.
pub fn parse_args<I, T>(config: &Config, args: I) -> Result<ParsedArgs>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = build_parser(config).try_get_matches_from(args)?;

    let runnables = matches
        .get_many::<String>(RUNNABLES_ID)
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let mut flags = ActiveFlags::new();
    for flag in &config.flags {
        match &flag.kind {
            FlagKind::Switch => {
                if matches.get_flag(&flag.name) {
                    flags.insert(ActiveFlag::Switch(flag.clone()));
                }
            }
            FlagKind::Option { .. } => {
                if let Some(raw) = matches.get_one::<String>(&flag.name) {
                    flags.insert(ActiveFlag::Option(OptionInstance::new(flag, raw)?));
                }
            }
        }
    }

    log::debug!(
        "Parsed runnables {:?} with flags {:?}",
        runnables,
        flags.iter().map(ActiveFlag::name).collect::<Vec<_>>()
    );
    Ok(ParsedArgs { runnables, flags })
}

/// The exit status for an error that ended the run.
pub fn exit_status(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<ConfigError>().is_some() {
        return EXIT_CONFIGURATION_ERROR;
    }
    if let Some(command_error) = error.downcast_ref::<CommandError>() {
        return command_status(command_error);
    }
    if error.downcast_ref::<ExecutionError>().is_some() {
        return EXIT_LAUNCH_ERROR;
    }
    match error.downcast_ref::<SessionError>() {
        Some(SessionError::Command(command_error)) => command_status(command_error),
        Some(SessionError::Execution(_)) => EXIT_LAUNCH_ERROR,
        None => EXIT_FAILURE,
    }
}

fn command_status(error: &CommandError) -> i32 {
    match error {
        CommandError::Config(_) => EXIT_CONFIGURATION_ERROR,
        _ => EXIT_COMMAND_ERROR,
    }
}
