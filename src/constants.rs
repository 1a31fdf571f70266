// src/constants.rs

/// The manifest fonk reads its configuration from.
pub const MANIFEST_FILENAME: &str = "pyproject.toml";

/// The placeholder in an `add` literal that is replaced by an option's value.
pub const ARG_PLACEHOLDER: &str = "{arg}";

/// Set for children of a concurrent run, whose output is captured rather than a TTY.
pub const FORCE_COLOR_ENV: &str = "FORCE_COLOR";

// --- Built-in flag names ---

/// Suppress output.
pub const FLAG_QUIET: &str = "quiet";
/// Print each command line before running it.
pub const FLAG_VERBOSE: &str = "verbose";
/// Stop at the first failing command.
pub const FLAG_FAIL_QUICK: &str = "fail-quick";
/// Show help instead of running anything.
pub const FLAG_HELP: &str = "help";
/// Run concurrently; the value is the job limit.
pub const FLAG_CONCURRENT: &str = "concurrent";
/// Per-command deadline, in seconds.
pub const FLAG_TIMEOUT: &str = "timeout";

// --- Process exit statuses ---

/// Every command succeeded.
pub const EXIT_SUCCESS: i32 = 0;
/// At least one command failed.
pub const EXIT_FAILURE: i32 = 1;
/// The manifest or an option value is invalid.
pub const EXIT_CONFIGURATION_ERROR: i32 = 2;
/// A runnable could not be resolved or its arguments could not be built.
pub const EXIT_COMMAND_ERROR: i32 = 3;
/// A process could not be launched.
pub const EXIT_LAUNCH_ERROR: i32 = 4;

/// Recorded for a command killed after exceeding its deadline, as coreutils `timeout` does.
pub const TIMEOUT_EXIT_CODE: i32 = 124;
