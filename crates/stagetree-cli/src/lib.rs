//! stagetree command-line driver
//!
//! Library half of the `stagetree` binary: the clap command tree, the
//! subcommand implementations and subscriber setup.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cli;
pub mod commands;
pub mod logging;

pub use commands::{Content, Context, ScenarioEnd, ScenarioReport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
