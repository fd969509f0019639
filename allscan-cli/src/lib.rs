//! Allscan CLI -- command-line front end for the scan orchestrator
//!
//! The binary in `main.rs` is a thin wrapper; every subcommand lives in
//! [`commands`] so it can be exercised from integration tests.

pub mod cli;
pub mod commands;
pub mod env_check;
pub mod error;
pub mod logging;
pub mod output;
pub mod summary;
