// src/system/executor.rs

use crate::{
    constants::TIMEOUT_EXIT_CODE,
    core::{
        mutator::PreparedCommand,
        report::{self, SharedReporter},
    },
};
use std::io::ErrorKind;
use std::process::{Child, Command as StdCommand, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Failures to launch or track a process. A command that runs and exits non-zero is
/// not an error here; its code is returned.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The process could not be started.
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, std::io::Error),
    /// The process started but its status could not be collected.
    #[error("Lost track of command '{0}': {1}")]
    Wait(String, std::io::Error),
    /// A background task running a command did not finish normally.
    #[error("A background command panicked or was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),
    /// The job limit's semaphore closed before every command got a slot.
    #[error("The job scheduler was shut down before every command was launched.")]
    SchedulerClosed,
}

/// How commands are run and reported, shared by both executors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionPolicy {
    /// Suppress progress lines, and the output of commands that succeed.
    pub quiet: bool,
    /// Echo each argument vector before it runs.
    pub verbose: bool,
    /// Kill a command that runs longer than this.
    pub timeout: Option<Duration>,
}

/// Builds the process for `arguments`, with nothing but the program and its arguments set.
/// Returns `None` when there is no program to run.
pub fn build_process(arguments: &[String]) -> Option<StdCommand> {
    let (program, args) = arguments.split_first()?;
    let mut command = StdCommand::new(program);
    command.args(args);
    Some(command)
}

/// The `cmd /C` form of `arguments`, for Windows built-ins such as `echo` that are
/// not programs on their own.
pub fn shell_fallback(arguments: &[String]) -> StdCommand {
    let mut command = StdCommand::new("cmd");
    command.arg("/C").args(arguments);
    command
}

/// Runs one prepared command to completion, in the foreground.
///
/// The child inherits the terminal. With a timeout in the policy, the child is polled
/// and killed at the deadline, which is reported and counted as exit code 124.
///
/// # Errors
/// `ExecutionError::CommandFailed` if the process cannot be started, and
/// `ExecutionError::Wait` if its status cannot be collected.
pub fn run_command(
    prepared: &PreparedCommand,
    policy: &ExecutionPolicy,
    reporter: &SharedReporter,
) -> Result<i32, ExecutionError> {
    {
        let mut reporter = report::lock(reporter);
        if !policy.quiet {
            reporter.running(&prepared.name, &prepared.applied);
        }
        if policy.verbose {
            reporter.command_line(&prepared.arguments);
        }
    }

    let Some(mut child) = spawn_inherited(prepared)? else {
        // An empty command is a success, not an error.
        log::debug!("'{}' has no arguments, nothing to run", prepared.name);
        return Ok(0);
    };
    log::debug!("Started '{}' (PID: {})", prepared.name, child.id());

    let code = match policy.timeout {
        None => {
            let status = child
                .wait()
                .map_err(|e| ExecutionError::Wait(prepared.name.clone(), e))?;
            exit_code(status)
        }
        Some(limit) => match wait_with_deadline(&mut child, limit, &prepared.name)? {
            Some(status) => exit_code(status),
            None => {
                report::lock(reporter).timed_out(&prepared.name, limit);
                TIMEOUT_EXIT_CODE
            }
        },
    };

    log::debug!("'{}' exited with code {}", prepared.name, code);
    Ok(code)
}

fn spawn_inherited(prepared: &PreparedCommand) -> Result<Option<Child>, ExecutionError> {
    let launch_error = |e| ExecutionError::CommandFailed(prepared.name.clone(), e);

    let Some(mut command) = build_process(&prepared.arguments) else {
        return Ok(None);
    };
    command
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    // Windows built-ins like `echo` only exist inside `cmd`.
    let child = match command.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound && cfg!(target_os = "windows") => {
            log::debug!("'{}' not found. Retrying with cmd /C.", prepared.name);
            shell_fallback(&prepared.arguments)
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .spawn()
                .map_err(launch_error)?
        }
        Err(e) => return Err(launch_error(e)),
    };
    Ok(Some(child))
}

/// Waits for `child` until `limit` has elapsed. Returns `None` if the child had to be killed.
fn wait_with_deadline(
    child: &mut Child,
    limit: Duration,
    name: &str,
) -> Result<Option<ExitStatus>, ExecutionError> {
    let deadline = Instant::now() + limit;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {
                if Instant::now() >= deadline {
                    log::debug!(
                        "'{}' exceeded {:?}, killing child process (PID: {})...",
                        name,
                        limit,
                        child.id()
                    );
                    if let Err(e) = child.kill() {
                        log::warn!("Failed to kill child process {}: {}", child.id(), e);
                    }
                    // Reap it so it does not linger as a zombie.
                    child.wait().ok();
                    return Ok(None);
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return Err(ExecutionError::Wait(name.to_string(), e)),
        }
    }
}

/// The code recorded for a finished process: its exit code, or 128 plus the signal
/// that killed it on Unix.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
