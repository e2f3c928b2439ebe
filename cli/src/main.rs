//! CLI entrypoint for assay
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use assay_application::{
    AnalyzeConsistencyUseCase, CollectEvidenceInput, CollectEvidenceUseCase, ConversationLogger,
    EvaluatePoolInput, EvaluatePoolUseCase, InspectStatusUseCase, LlmGateway, NoProgress,
    PipelineConfig, ProgressNotifier, RegisterSubjectUseCase, RunStatus, ScoreSubjectUseCase,
};
use assay_domain::{Category, Rater, Subject, SubjectId};
use assay_infrastructure::{
    ConfigLoader, FileConfig, JsonlConversationLogger, RoutingGateway, SqliteEvidenceStore,
};
use assay_presentation::{Cli, Command, ConsoleFormatter, OutputFormat, ProgressReporter};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit code when a run ended with cells or pairs still missing.
const EXIT_INCOMPLETE: u8 = 2;
/// Exit code after Ctrl-C, following the shell convention for SIGINT.
const EXIT_CANCELLED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match init_tracing(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Diagnostics go to stderr, and additionally to `log_file` when given.
///
/// `RUST_LOG` overrides the verbosity flags.
fn init_tracing(verbose: u8, quiet: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("log file path '{}' has no file name", path.display()))?;
            std::fs::create_dir_all(directory)
                .with_context(|| format!("creating log directory {}", directory.display()))?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let (file_config, pipeline) = ConfigLoader::load_validated(cli.config.as_deref(), cli.no_config)
        .context("loading configuration")?;
    let config = Arc::new(pipeline);
    info!(version = %config.version, "Starting assay");

    // Planning needs neither the store nor any provider.
    if let Command::Plan(args) = &cli.command {
        let plan = config.plan(args.test_mode)?;
        let output = match args.output {
            OutputFormat::Text => ConsoleFormatter::format_plan(&plan, args.test_mode),
            OutputFormat::Json => ConsoleFormatter::format_json(&plan),
        };
        println!("{}", output);
        return Ok(ExitCode::SUCCESS);
    }

    // === Dependency Injection ===
    let store = Arc::new(open_store(cli.db.as_deref(), &file_config)?);
    let quiet = cli.quiet;

    match cli.command {
        Command::Plan(_) => Ok(ExitCode::SUCCESS),

        Command::Register(args) => {
            let subject = args
                .meta
                .into_iter()
                .fold(Subject::new(args.subject, args.name), |s, (k, v)| {
                    s.with_metadata(k, v)
                });
            let id = subject.id.clone();
            let is_new = RegisterSubjectUseCase::new(store).execute(subject).await?;
            println!(
                "{} subject '{}'",
                if is_new { "Registered" } else { "Updated" },
                id
            );
            Ok(ExitCode::SUCCESS)
        }

        Command::Collect(args) => {
            let rater = args.rater.as_deref().map(Rater::from);
            let needed = roster(
                config.collectors.iter().map(|c| c.rater.clone()),
                rater.as_ref(),
            );
            let gateway = Arc::new(connect_gateway(&file_config, &config, &needed).await?);
            let cancel = cancel_on_ctrl_c();

            let use_case = CollectEvidenceUseCase::new(gateway, store, Arc::clone(&config))
                .with_cancellation(cancel);
            let use_case = match provider_logger(&file_config) {
                Some(logger) => use_case.with_logger(logger),
                None => use_case,
            };

            let mut input = CollectEvidenceInput::new(args.subject);
            input.category = args.category.as_deref().map(Category::new);
            input.rater = rater;
            input.test_mode = args.test_mode;
            input.parallel = args.sequential.then_some(false);

            let progress = progress_notifier(quiet);
            let summary = use_case
                .execute_with_progress(input, progress.as_ref())
                .await?;

            let output = match args.output {
                OutputFormat::Text => ConsoleFormatter::format_collection(&summary),
                OutputFormat::Json => ConsoleFormatter::format_json(&summary),
            };
            println!("{}", output);
            Ok(run_exit_code(&summary.status, summary.cancelled))
        }

        Command::Evaluate(args) => {
            let evaluator = args.rater.as_deref().map(Rater::from);
            let needed = roster(config.evaluators.iter().cloned(), evaluator.as_ref());
            let gateway = Arc::new(connect_gateway(&file_config, &config, &needed).await?);
            let cancel = cancel_on_ctrl_c();

            let use_case = EvaluatePoolUseCase::new(gateway, store, Arc::clone(&config))
                .with_cancellation(cancel);
            let use_case = match provider_logger(&file_config) {
                Some(logger) => use_case.with_logger(logger),
                None => use_case,
            };

            let mut input = EvaluatePoolInput::new(args.subject);
            input.category = args.category.as_deref().map(Category::new);
            input.evaluator = evaluator;
            input.parallel = args.sequential.then_some(false);

            let progress = progress_notifier(quiet);
            let summary = use_case
                .execute_with_progress(input, progress.as_ref())
                .await?;

            let output = match args.output {
                OutputFormat::Text => ConsoleFormatter::format_pooling(&summary),
                OutputFormat::Json => ConsoleFormatter::format_json(&summary),
            };
            println!("{}", output);
            Ok(run_exit_code(&summary.status, summary.cancelled))
        }

        Command::Status(args) => {
            let subject = SubjectId::from(args.subject);
            let status = InspectStatusUseCase::new(store, config)
                .execute(&subject, args.test_mode)
                .await?;
            let output = match args.output {
                OutputFormat::Text => ConsoleFormatter::format_status(&status),
                OutputFormat::Json => ConsoleFormatter::format_json(&status),
            };
            println!("{}", output);
            Ok(ExitCode::SUCCESS)
        }

        Command::Score(args) => {
            let subject = SubjectId::from(args.subject);
            let report = ScoreSubjectUseCase::new(store, config)
                .execute(&subject)
                .await?;
            let output = match args.output {
                OutputFormat::Text => ConsoleFormatter::format_score(&report),
                OutputFormat::Json => ConsoleFormatter::format_json(&report),
            };
            println!("{}", output);
            Ok(ExitCode::SUCCESS)
        }

        Command::Consistency(args) => {
            let subjects: Vec<SubjectId> = args.subjects.into_iter().map(SubjectId::from).collect();
            let report = AnalyzeConsistencyUseCase::new(store, config)
                .execute(&subjects)
                .await?;

            if let Some(path) = &args.export {
                std::fs::write(path, ConsoleFormatter::format_json(&report))
                    .with_context(|| format!("writing consistency report to {}", path.display()))?;
                info!(path = %path.display(), "Exported consistency report");
            }

            let output = match args.output {
                OutputFormat::Text => ConsoleFormatter::format_consistency(&report),
                OutputFormat::Json => ConsoleFormatter::format_json(&report),
            };
            println!("{}", output);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// `--db :memory:` opens a throwaway store; otherwise `--db` wins over `[store] path`.
fn open_store(db: Option<&Path>, file_config: &FileConfig) -> Result<SqliteEvidenceStore> {
    if db.is_some_and(|p| p.as_os_str() == ":memory:") {
        warn!("Using an in-memory store; nothing will be kept after this run");
        return Ok(SqliteEvidenceStore::open_in_memory()?);
    }
    let path = db
        .map(Path::to_path_buf)
        .unwrap_or_else(|| file_config.store.resolved_path());
    info!(path = %path.display(), "Opening evidence store");
    SqliteEvidenceStore::open(&path)
        .with_context(|| format!("opening evidence store at {}", path.display()))
}

/// Build the gateway and warn about roster raters it cannot reach.
///
/// Unreachable raters are not fatal: their cells and pairs fail and show up
/// in the run summary.
async fn connect_gateway(
    file_config: &FileConfig,
    config: &PipelineConfig,
    needed: &[Rater],
) -> Result<RoutingGateway> {
    let gateway = RoutingGateway::from_config(file_config, &config.raters())?;
    let available = gateway.available_raters().await?;

    let missing: Vec<String> = needed
        .iter()
        .filter(|r| !available.contains(r))
        .map(|r| r.to_string())
        .collect();
    if missing.len() == needed.len() && !needed.is_empty() {
        bail!(
            "no provider is configured for {}; set the API key environment variables or [providers] settings",
            missing.join(", ")
        );
    }
    if !missing.is_empty() {
        warn!(
            raters = %missing.join(", "),
            "No provider configured; these raters will be reported as unavailable"
        );
    }
    Ok(gateway)
}

/// Raters a run will call: the whole roster, or the one named on the command line.
fn roster(all: impl Iterator<Item = Rater>, only: Option<&Rater>) -> Vec<Rater> {
    all.filter(|r| only.is_none_or(|o| o == r)).collect()
}

fn provider_logger(file_config: &FileConfig) -> Option<Arc<dyn ConversationLogger>> {
    let path = file_config.logging.provider_log.as_ref()?;
    let logger = JsonlConversationLogger::new(path)?;
    info!(path = %logger.path().display(), run = logger.run_id(), "Logging provider traffic");
    Some(Arc::new(logger))
}

fn progress_notifier(quiet: bool) -> Box<dyn ProgressNotifier> {
    if quiet {
        Box::new(NoProgress)
    } else {
        Box::new(ProgressReporter::new())
    }
}

/// Cancel in-flight work on Ctrl-C. Completed cells and records stay stored.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing in-flight requests");
            trigger.cancel();
        }
    });
    token
}

fn run_exit_code(status: &RunStatus, cancelled: bool) -> ExitCode {
    if cancelled {
        ExitCode::from(EXIT_CANCELLED)
    } else if status.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_INCOMPLETE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_filters_to_requested_rater() {
        let all = vec![Rater::Claude, Rater::Gpt, Rater::Gemini];
        assert_eq!(roster(all.clone().into_iter(), None), all);
        assert_eq!(
            roster(all.into_iter(), Some(&Rater::Gpt)),
            vec![Rater::Gpt]
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(run_exit_code(&RunStatus::Complete, false), ExitCode::SUCCESS);
        assert_eq!(
            run_exit_code(&RunStatus::CompleteWithFlags(3), false),
            ExitCode::SUCCESS
        );
        let incomplete = RunStatus::Incomplete {
            missing: 4,
            categories: vec![Category::new("vision")],
        };
        assert_eq!(
            run_exit_code(&incomplete, false),
            ExitCode::from(EXIT_INCOMPLETE)
        );
        assert_eq!(
            run_exit_code(&RunStatus::Complete, true),
            ExitCode::from(EXIT_CANCELLED)
        );
    }
}
