//! `comfymeta-cli` library crate.
//!
//! Holds the command's argument parsing, configuration and batch driver so
//! they can be exercised by integration tests. The binary entrypoint lives
//! in `main.rs`.

pub mod args;
pub mod collect;
pub mod config;
pub mod output;
pub mod runner;
