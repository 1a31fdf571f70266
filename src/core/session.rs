//! # Session
//!
//! One invocation of fonk: resolves what was asked for, prepares every command,
//! hands them to the sequential or the concurrent executor and keeps the tally
//! of failures that decides the exit status.
use crate::{
    constants::{
        EXIT_FAILURE, EXIT_SUCCESS, FLAG_CONCURRENT, FLAG_FAIL_QUICK, FLAG_QUIET, FLAG_TIMEOUT,
        FLAG_VERBOSE,
    },
    core::{
        config_loader::ConfigError,
        mutator::{self, PreparedCommand},
        report::{self, SharedReporter},
        resolver::{CommandError, Resolver},
    },
    models::{ActiveFlag, ActiveFlags, Config, OptionValue},
    system::{
        concurrent,
        executor::{self, ExecutionError, ExecutionPolicy},
    },
};
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use thiserror::Error;

/// Errors that end a session early. Failing commands are not errors; they are tallied.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Resolution or argument preparation failed. Nothing was launched.
    #[error(transparent)]
    Command(#[from] CommandError),
    /// A process could not be launched or tracked.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// How the prepared commands are run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// One after the other, in the foreground.
    #[default]
    Sequential,
    /// In the background, at most `limit` at a time; `None` means no limit.
    Concurrent {
        /// The job limit.
        limit: Option<usize>,
    },
}

/// The built-in flags, read once from the top-level flag set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionOptions {
    /// `--quiet`
    pub quiet: bool,
    /// `--verbose`
    pub verbose: bool,
    /// `--fail-quick`
    pub fail_quick: bool,
    /// `--timeout`, per command.
    pub timeout: Option<Duration>,
    /// `--concurrent`
    pub mode: Mode,
}

impl SessionOptions {
    /// Reads the built-in flags out of `flags`.
    ///
    /// # Errors
    /// `ConfigError::InvalidOptionValue` for a negative job limit or a timeout that is
    /// not a positive number of seconds.
    pub fn from_flags(flags: &ActiveFlags) -> Result<Self, ConfigError> {
        let invalid = |flag: &str, value: &OptionValue| ConfigError::InvalidOptionValue {
            flag: flag.to_string(),
            value: value.to_string(),
        };

        let timeout = match flags.get(FLAG_TIMEOUT).and_then(ActiveFlag::option_value) {
            None => None,
            Some(value @ OptionValue::Float(seconds)) => Some(
                Duration::try_from_secs_f64(*seconds)
                    .ok()
                    .filter(|limit| !limit.is_zero())
                    .ok_or_else(|| invalid(FLAG_TIMEOUT, value))?,
            ),
            Some(other) => return Err(invalid(FLAG_TIMEOUT, other)),
        };

        let mode = match flags.get(FLAG_CONCURRENT) {
            None => Mode::Sequential,
            Some(flag) => match flag.option_value() {
                None | Some(OptionValue::Int(0)) => Mode::Concurrent { limit: None },
                Some(value @ OptionValue::Int(n)) => Mode::Concurrent {
                    limit: Some(usize::try_from(*n).map_err(|_| invalid(FLAG_CONCURRENT, value))?),
                },
                Some(other) => return Err(invalid(FLAG_CONCURRENT, other)),
            },
        };

        Ok(Self {
            quiet: flags.contains(FLAG_QUIET),
            verbose: flags.contains(FLAG_VERBOSE),
            fail_quick: flags.contains(FLAG_FAIL_QUICK),
            timeout,
            mode,
        })
    }

    fn policy(&self) -> ExecutionPolicy {
        ExecutionPolicy {
            quiet: self.quiet,
            verbose: self.verbose,
            timeout: self.timeout,
        }
    }
}

/// How a sequential run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Every command ran, whatever their exit codes.
    Completed,
    /// Fail-quick stopped the run after `command` exited with `code`.
    Aborted {
        /// The command that failed.
        command: String,
        /// Its exit code.
        code: i32,
    },
}

/// Runs runnables against a configuration and tallies the failures.
#[derive(Debug)]
pub struct Session<'a> {
    config: &'a Config,
    options: SessionOptions,
    reporter: SharedReporter,
    failed: BTreeMap<String, i32>,
}

impl<'a> Session<'a> {
    /// Starts a session, printing the header unless quiet.
    pub fn new(config: &'a Config, options: SessionOptions, reporter: SharedReporter) -> Self {
        if !options.quiet {
            report::lock(&reporter).header();
        }
        Self {
            config,
            options,
            reporter,
            failed: BTreeMap::new(),
        }
    }

    /// Resolves `names` and prepares every resulting command. All of it happens before
    /// anything is launched, so a bad runnable or rule never leaves a batch half run.
    fn prepare(
        &self,
        names: &[String],
        flags: &ActiveFlags,
    ) -> Result<Vec<PreparedCommand>, CommandError> {
        Resolver::new(self.config)
            .resolve_many(names, flags)?
            .iter()
            .map(|invocation| mutator::mutate(invocation.command, &invocation.flags))
            .collect()
    }

    /// Runs the commands behind `names` one after the other.
    ///
    /// A command that exits non-zero is recorded and the run goes on, unless
    /// fail-quick is set, in which case the run stops there.
    ///
    /// # Errors
    /// `SessionError::Command` if resolution or preparation fails, and
    /// `SessionError::Execution` if a process cannot be launched.
    pub fn run_runnables(
        &mut self,
        names: &[String],
        flags: &ActiveFlags,
    ) -> Result<RunStatus, SessionError> {
        let policy = self.options.policy();

        for prepared in self.prepare(names, flags)? {
            let code = executor::run_command(&prepared, &policy, &self.reporter)?;
            if code == 0 {
                continue;
            }

            self.failed.insert(prepared.name.clone(), code);
            if self.options.fail_quick {
                log::debug!("Stopping after '{}' failed with code {}", prepared.name, code);
                return Ok(RunStatus::Aborted {
                    command: prepared.name,
                    code,
                });
            }
        }

        Ok(RunStatus::Completed)
    }

    /// Runs the commands behind `names` concurrently, at most `limit` at a time.
    ///
    /// # Errors
    /// Same as [`Session::run_runnables`].
    pub async fn run_runnables_concurrently(
        &mut self,
        names: &[String],
        flags: &ActiveFlags,
        limit: Option<usize>,
    ) -> Result<(), SessionError> {
        let prepared = self.prepare(names, flags)?;
        let failed = concurrent::run_many(
            prepared,
            self.options.policy(),
            limit,
            Arc::clone(&self.reporter),
        )
        .await?;
        self.failed.extend(failed);
        Ok(())
    }

    /// Failed commands so far, by name.
    pub fn failed(&self) -> &BTreeMap<String, i32> {
        &self.failed
    }

    /// Prints the summary and returns the process exit status.
    pub fn finish(&self) -> i32 {
        report::lock(&self.reporter).summary(&self.failed, self.options.quiet);
        if self.failed.is_empty() {
            EXIT_SUCCESS
        } else {
            EXIT_FAILURE
        }
    }
}
