//! Presentation layer for assay
//!
//! This crate contains CLI definitions, output formatters
//! and progress reporters.

pub mod cli;
pub mod output;
pub mod progress;

// Re-export commonly used types
pub use cli::commands::{
    Cli, CollectArgs, Command, ConsistencyArgs, EvaluateArgs, OutputFormat, PlanArgs,
    RegisterArgs, ScoreArgs, StatusArgs,
};
pub use output::console::ConsoleFormatter;
pub use progress::reporter::{ProgressReporter, SimpleProgress};
