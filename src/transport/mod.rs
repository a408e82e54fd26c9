//! Transport module - worker subprocess handling.
//!
//! Provides:
//! - Spawning a worker with piped stdin/stdout/stderr
//! - Forwarding worker stderr to logs
//! - A [`ShellChannel`](crate::channel::ShellChannel) over the pipes

mod process;

pub use process::{ProcessChannel, ShellProcess};
