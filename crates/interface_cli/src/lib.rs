//! Command line interface for the CSA billing engine
//!
//! Configuration loading and operator commands. The `csa-billing` binary
//! only wires them to stdout.

pub mod commands;
pub mod config;

pub use commands::{run, Cli, Command};
pub use config::CliConfig;
