//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use std::fmt::Write as FmtWrite;
use std::future::Future;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::agent::client::create_provider;
use crate::agent::config::ResearchConfig;
use crate::agent::orchestrator::Orchestrator;
use crate::agent::prompt::PromptSet;
use crate::agent::trace::{JsonlSink, LogSink, TraceSink};
use crate::cli::output::{OutputFormat, format_outcome, render_markdown};
use crate::cli::parser::{Cli, Commands};
use crate::core::{ResearchCategory, ResearchQuery, SearchMode};
use crate::error::{CommandError, ResearchError, Result};

/// Parameters for the run command.
#[derive(Debug, Clone)]
pub struct RunParams<'a> {
    /// The research query; read from stdin when absent.
    pub query: Option<&'a str>,
    /// Search mode name.
    pub search_mode: &'a str,
    /// Maximum number of drafts.
    pub max_iterations: usize,
    /// Quality threshold.
    pub min_quality: f64,
    /// Files for file search.
    pub files: &'a [PathBuf],
    /// Markdown output file.
    pub output: Option<&'a Path>,
    /// JSON-lines trace file.
    pub trace: Option<&'a Path>,
    /// Fallback category name.
    pub category: Option<&'a str>,
    /// Maximum planned searches.
    pub max_searches: Option<usize>,
    /// Maximum concurrent searches.
    pub concurrency: Option<usize>,
    /// Directory containing prompt template files.
    pub prompt_dir: Option<&'a Path>,
}

/// Executes the CLI command.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Run {
            query,
            search_mode,
            max_iterations,
            min_quality,
            files,
            output,
            trace,
            category,
            max_searches,
            concurrency,
            prompt_dir,
        } => {
            let params = RunParams {
                query: query.as_deref(),
                search_mode,
                max_iterations: *max_iterations,
                min_quality: *min_quality,
                files,
                output: output.as_deref(),
                trace: trace.as_deref(),
                category: category.as_deref(),
                max_searches: *max_searches,
                concurrency: *concurrency,
                prompt_dir: prompt_dir.as_deref(),
            };
            cmd_run(&params, format)
        }
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

/// Builds the validated research query from the command parameters.
fn build_query(params: &RunParams<'_>, text: String) -> Result<ResearchQuery> {
    let mode = SearchMode::parse(params.search_mode).ok_or_else(|| {
        CommandError::ExecutionFailed(format!(
            "Unknown search mode '{}' (expected web, file or web_and_file)",
            params.search_mode
        ))
    })?;

    let query = ResearchQuery::new(text)
        .with_search_mode(mode)
        .with_max_iterations(params.max_iterations)
        .with_min_quality(params.min_quality)
        .with_files(params.files.to_vec());
    query.validate()?;
    Ok(query)
}

/// Resolves configuration from the environment plus command overrides.
fn build_config(params: &RunParams<'_>) -> Result<ResearchConfig> {
    let mut builder = ResearchConfig::builder().from_env();
    if let Some(label) = params.category {
        let category = ResearchCategory::parse(label).ok_or_else(|| {
            CommandError::ExecutionFailed(format!("Unknown category '{label}'"))
        })?;
        builder = builder.default_category(category);
    }
    if let Some(n) = params.max_searches {
        builder = builder.max_searches(n);
    }
    if let Some(n) = params.concurrency {
        builder = builder.max_concurrency(n);
    }
    if let Some(dir) = params.prompt_dir {
        builder = builder.prompt_dir(dir);
    }

    builder.build().map_err(|e| {
        CommandError::ExecutionFailed(format!("Agent configuration error: {e}")).into()
    })
}

/// Reads the query from stdin when it was not given as an argument.
fn read_query(arg: Option<&str>, stdin: &mut impl Read) -> Result<String> {
    if let Some(q) = arg {
        return Ok(q.to_string());
    }
    let mut buf = String::new();
    stdin.read_to_string(&mut buf)?;
    let text = buf.trim().to_string();
    if text.is_empty() {
        return Err(CommandError::ExecutionFailed(
            "No query given: pass --query or pipe it on stdin".to_string(),
        )
        .into());
    }
    Ok(text)
}

fn cmd_run(params: &RunParams<'_>, format: OutputFormat) -> Result<String> {
    let text = read_query(params.query, &mut io::stdin())?;
    let query = build_query(params, text)?;
    let config = build_config(params)?;

    let provider = create_provider(&config).map_err(|e| {
        CommandError::ExecutionFailed(format!("Provider creation failed: {e}"))
    })?;
    let orchestrator = Orchestrator::new(provider, config);

    let sink: Arc<dyn TraceSink> = match params.trace {
        Some(path) => Arc::new(JsonlSink::create(path).map_err(|e| {
            CommandError::ExecutionFailed(format!(
                "Cannot create trace file {}: {e}",
                path.display()
            ))
        })?),
        None => Arc::new(LogSink),
    };

    // Create tokio runtime as sync/async bridge
    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}"))
    })?;

    let cancel = CancellationToken::new();
    let result = rt.block_on(async {
        let token = cancel.clone();
        tokio::spawn(watch_interrupts(tokio::signal::ctrl_c, token, || {
            std::process::exit(130)
        }));
        orchestrator
            .run_with_cancel(&query, sink.as_ref(), &cancel)
            .await
    });

    match result {
        Ok(outcome) => {
            if let Some(path) = params.output {
                write_report(path, &render_markdown(&outcome.report))?;
            }
            Ok(format_outcome(&outcome, format)?)
        }
        Err(ResearchError::Cancelled {
            stage,
            best: Some(best),
        }) => {
            if let Some(path) = params.output {
                write_report(path, &render_markdown(&best))?;
            }
            Err(ResearchError::Cancelled {
                stage,
                best: Some(best),
            }
            .into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Cancels `token` on the first interrupt and calls `force_exit` on the
/// second. Stops watching if the signal source fails.
async fn watch_interrupts<S, F>(mut next: S, token: CancellationToken, force_exit: impl FnOnce())
where
    S: FnMut() -> F,
    F: Future<Output = io::Result<()>>,
{
    if next().await.is_err() {
        return;
    }
    warn!("interrupt received, stopping at the next stage boundary (Ctrl-C again to quit)");
    token.cancel();

    if next().await.is_ok() {
        warn!("second interrupt received, exiting");
        force_exit();
    }
}

fn write_report(path: &Path, markdown: &str) -> Result<()> {
    std::fs::write(path, markdown).map_err(|e| {
        CommandError::ExecutionFailed(format!(
            "Failed to write report to {}: {e}",
            path.display()
        ))
        .into()
    })
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                let _ = writeln!(
                    output,
                    "  {}",
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("unknown")
                );
            }
            output.push_str("\nEdit these files to customize agent system prompts.\n");
            Ok(output)
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json)?)
        }
    }
}
