//! # fonk
//!
//! A `pyproject.toml` driven task runner. Commands, aliases and flags are declared
//! in the project's `[tool.fonk]` table; fonk expands aliases, rewrites each command's
//! arguments for the active flags and runs the result one by one or concurrently.
//!
//! The pipeline, leaf first:
//!
//! - [`models`]: the flag catalog, commands, aliases and the validated [`models::Config`].
//! - [`core::config_loader`]: finds and validates the manifest.
//! - [`core::resolver`]: expands runnable names into (command, flags) invocations.
//! - [`core::mutator`]: computes the final argument vector of an invocation.
//! - [`system`]: runs prepared commands, sequentially or concurrently.
//! - [`core::session`]: ties it together and keeps the failure tally.

include!(concat!(env!("OUT_DIR"), "/translations.rs"));

pub mod cli;
/// Fixed names, placeholders and exit statuses.
pub mod constants;
/// Configuration, resolution, argument rewriting and sessions.
pub mod core;
/// The flag catalog and the validated project configuration.
pub mod models;
pub mod system;
