// src/core/mod.rs

/// Finding, reading and validating `pyproject.toml`.
pub mod config_loader;
/// Turning a command and its flags into an argument vector.
pub mod mutator;
/// Progress and result output.
pub mod report;
/// Expanding runnable names into commands.
pub mod resolver;
/// One run of fonk, start to summary.
pub mod session;
