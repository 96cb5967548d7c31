//! CLI Module Organization
//!
//! - args: command and argument definitions
//! - commands: command execution
//! - output: console rendering of results

pub mod args;
pub mod commands;
pub mod output;

pub use args::*;
pub use commands::*;
