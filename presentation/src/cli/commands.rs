//! CLI command definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// CLI arguments for assay
#[derive(Parser, Debug)]
#[command(name = "assay")]
#[command(author, version, about = "Multi-LLM evidence collection and pooled evaluation")]
#[command(long_about = r#"
Assay collects evidence about a subject from several LLM providers, has
every evaluator rate the pooled evidence, and turns the ratings into
category scores, a final grade and an evaluator consistency report.

Runs are resumable: collection fills only cells below quota, pooling only
rates (item, evaluator) pairs without a record. Re-running after an
interruption never duplicates work.

Configuration files are loaded from (in priority order):
1. --config <path>               Explicit config file
2. ASSAY_* environment variables (ASSAY_STORE__PATH=...)
3. ./assay.toml or ./.assay.toml  Project-level config
4. ~/.config/assay/config.toml    Global config

Example:
  assay register --subject jdoe --name "Jane Doe" --meta role=Mayor
  assay plan --test-mode
  assay collect --subject jdoe --test-mode
  assay evaluate --subject jdoe
  assay score --subject jdoe --output json
  assay consistency --export consistency.json
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// SQLite database path (":memory:" for a throwaway run)
    #[arg(long, value_name = "PATH", global = true)]
    pub db: Option<PathBuf>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Also write diagnostics to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register a subject (or update its name and metadata)
    Register(RegisterArgs),

    /// Print the quota plan without calling any provider
    Plan(PlanArgs),

    /// Collect evidence until every cell reaches its quota
    Collect(CollectArgs),

    /// Have every evaluator rate the pooled evidence
    Evaluate(EvaluateArgs),

    /// Show collection and pooling progress for a subject
    Status(StatusArgs),

    /// Compute pooled category scores, final score and grade
    Score(ScoreArgs),

    /// Compare evaluators across subjects
    Consistency(ConsistencyArgs),
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Stable subject identifier
    #[arg(long, value_name = "ID")]
    pub subject: String,

    /// Display name used in prompts
    #[arg(long)]
    pub name: String,

    /// Metadata entry (repeatable)
    #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub meta: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Plan for the reduced test-mode target
    #[arg(long)]
    pub test_mode: bool,

    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Args, Debug)]
pub struct CollectArgs {
    #[arg(long, value_name = "ID")]
    pub subject: String,

    /// Restrict to one category
    #[arg(long)]
    pub category: Option<String>,

    /// Restrict to one collector
    #[arg(long)]
    pub rater: Option<String>,

    /// Process cells one at a time
    #[arg(long)]
    pub sequential: bool,

    /// Use the reduced test-mode target
    #[arg(long)]
    pub test_mode: bool,

    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[arg(long, value_name = "ID")]
    pub subject: String,

    /// Restrict to one category
    #[arg(long)]
    pub category: Option<String>,

    /// Restrict to one evaluator
    #[arg(long)]
    pub rater: Option<String>,

    /// Process pairs one at a time
    #[arg(long)]
    pub sequential: bool,

    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[arg(long, value_name = "ID")]
    pub subject: String,

    /// Compare against the test-mode quotas
    #[arg(long)]
    pub test_mode: bool,

    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Args, Debug)]
pub struct ScoreArgs {
    #[arg(long, value_name = "ID")]
    pub subject: String,

    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Args, Debug)]
pub struct ConsistencyArgs {
    /// Subjects to include (repeatable); all stored subjects when omitted
    #[arg(long = "subject", value_name = "ID")]
    pub subjects: Vec<String>,

    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Write the JSON report to this file
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.trim().to_string()))
}
