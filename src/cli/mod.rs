//! CLI module for RagBuddy
//!
//! Handles command-line argument parsing.

pub mod args;

pub use args::{Args, Commands, IngestSource, Verbosity};
