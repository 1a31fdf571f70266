//! # Concurrent Executor
//!
//! Runs a batch of prepared commands as background children, with at most `limit`
//! of them alive at once. Output is captured and only reported once a command has
//! finished, inside the shared reporter's lock, so two commands never interleave.
use crate::{
    constants::{FORCE_COLOR_ENV, TIMEOUT_EXIT_CODE},
    core::{
        mutator::PreparedCommand,
        report::{self, SharedReporter, Stream},
    },
    system::executor::{ExecutionError, ExecutionPolicy, build_process, exit_code, shell_fallback},
};
use std::{
    collections::BTreeMap,
    io::ErrorKind,
    process::{Output, Stdio},
    sync::Arc,
    time::Duration,
};
use tokio::{
    process::{Child, Command as TokioCommand},
    sync::Semaphore,
    task::JoinSet,
};

/// How a background command came to an end.
#[derive(Debug)]
enum Finished {
    Exited(Output),
    TimedOut(Duration),
}

impl Finished {
    fn code(&self) -> i32 {
        match self {
            Self::Exited(output) => exit_code(output.status),
            Self::TimedOut(_) => TIMEOUT_EXIT_CODE,
        }
    }
}

/// Runs every command in `commands` and returns the non-zero exit codes by command name.
///
/// Commands are launched in input order. A launch waits for one of `limit` permits;
/// `None` or `Some(0)` means no limit. A permit is held until the command's report has
/// been printed. When two commands share a name, the later one's code is kept.
///
/// # Errors
/// Fails on the first command that cannot be launched or waited for. Children still
/// running at that point are killed.
pub async fn run_many(
    commands: Vec<PreparedCommand>,
    policy: ExecutionPolicy,
    limit: Option<usize>,
    reporter: SharedReporter,
) -> Result<BTreeMap<String, i32>, ExecutionError> {
    let permits = match limit {
        Some(n) if n > 0 => n.min(Semaphore::MAX_PERMITS),
        _ => Semaphore::MAX_PERMITS,
    };
    let semaphore = Arc::new(Semaphore::new(permits));
    let mut tasks = JoinSet::new();

    log::debug!(
        "Running {} command(s) concurrently, limit: {:?}",
        commands.len(),
        limit.filter(|n| *n > 0)
    );

    for (index, prepared) in commands.into_iter().enumerate() {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ExecutionError::SchedulerClosed)?;
        let Some(child) = spawn_captured(&prepared)? else {
            log::debug!("'{}' has no arguments, nothing to run", prepared.name);
            continue;
        };
        log::debug!("Started '{}' in the background", prepared.name);

        let reporter = Arc::clone(&reporter);
        tasks.spawn(async move {
            let result = finish(child, &prepared, &policy, &reporter).await;
            drop(permit);
            (index, prepared.name, result)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (index, name, result) = joined?;
        results.push((index, name, result?));
    }
    results.sort_by_key(|(index, _, _)| *index);

    let mut failures = BTreeMap::new();
    for (_, name, code) in results {
        if code != 0 {
            failures.insert(name, code);
        }
    }
    Ok(failures)
}

fn spawn_captured(prepared: &PreparedCommand) -> Result<Option<Child>, ExecutionError> {
    let launch_error = |e| ExecutionError::CommandFailed(prepared.name.clone(), e);

    let Some(command) = build_process(&prepared.arguments) else {
        return Ok(None);
    };
    let child = match captured(command).spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound && cfg!(target_os = "windows") => {
            log::debug!("'{}' not found. Retrying with cmd /C.", prepared.name);
            captured(shell_fallback(&prepared.arguments))
                .spawn()
                .map_err(launch_error)?
        }
        Err(e) => return Err(launch_error(e)),
    };
    Ok(Some(child))
}

/// Output is piped, so children are told to keep their colors.
fn captured(command: std::process::Command) -> TokioCommand {
    let mut command = TokioCommand::from(command);
    command
        .env(FORCE_COLOR_ENV, "1")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

async fn finish(
    child: Child,
    prepared: &PreparedCommand,
    policy: &ExecutionPolicy,
    reporter: &SharedReporter,
) -> Result<i32, ExecutionError> {
    let wait_error = |e| ExecutionError::Wait(prepared.name.clone(), e);

    let finished = match policy.timeout {
        None => Finished::Exited(child.wait_with_output().await.map_err(wait_error)?),
        // Dropping the timed out future drops the child, which kills it.
        Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(output) => Finished::Exited(output.map_err(wait_error)?),
            Err(_) => Finished::TimedOut(limit),
        },
    };

    let code = finished.code();
    log::debug!("'{}' exited with code {}", prepared.name, code);

    let mut reporter = report::lock(reporter);
    if !policy.quiet {
        reporter.ran(&prepared.name, &prepared.applied);
    }
    if policy.verbose {
        reporter.command_line(&prepared.arguments);
    }
    match &finished {
        Finished::Exited(output) => {
            if !policy.quiet || code != 0 {
                let streams = [
                    (Stream::Stdout, &output.stdout),
                    (Stream::Stderr, &output.stderr),
                ];
                for (stream, bytes) in streams {
                    let text = String::from_utf8_lossy(bytes);
                    let text = text.trim_end();
                    if !text.is_empty() {
                        reporter.output(stream, text);
                    }
                }
            }
        }
        Finished::TimedOut(limit) => reporter.timed_out(&prepared.name, *limit),
    }

    Ok(code)
}
