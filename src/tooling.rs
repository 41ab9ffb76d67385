//! Tooling & Integration Layer
//!
//! The `Sandbox` façade that wires a connection to the sync engine, poller
//! and session multiplexer, and the CLI built on top of it.

pub mod cli;
pub mod sandbox;

pub use cli::{format_event, import_directory, Cli, CliContext, Commands};
pub use sandbox::Sandbox;
