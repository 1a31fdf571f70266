//! # System Interaction Layer
//!
//! The boundary between fonk's logic and the operating system's processes.
//!
//! ## Modules
//!
//! - **`executor`**: runs one command in the foreground with the terminal inherited,
//!   with an optional deadline and the `cmd.exe` fallback on Windows.
//! - **`concurrent`**: runs a batch of commands in the background on the tokio runtime,
//!   with a bounded number of live children and captured, non-interleaved output.

/// Batches run in the background.
pub mod concurrent;
/// One command in the foreground.
pub mod executor;
