//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::core::query::{DEFAULT_MAX_ITERATIONS, DEFAULT_MIN_QUALITY};

/// research-rs: multi-agent research report generator.
///
/// Routes a query to a research category, plans and runs searches
/// concurrently, writes a structured report and refines it until it meets
/// the quality threshold.
#[derive(Parser, Debug)]
#[command(name = "research-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose (debug) logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research a topic and write a report.
    ///
    /// Requires an OpenAI-compatible API key (`OPENAI_API_KEY`). The query
    /// is read from stdin when `--query` is omitted. Ctrl-C stops the
    /// session at the next stage boundary.
    #[command(after_help = r#"Examples:
  research-rs run -q "History of quantum error correction"
  research-rs run -q "Compare Raft and Paxos" --max-iterations 2 --min-quality 8
  research-rs run -q "Summarize my notes" --search-mode file --files notes.md
  research-rs run -q "Rust async runtimes" --output report.md --trace trace.jsonl
  echo "Effects of microplastics on soil" | research-rs --format json run
"#)]
    Run {
        /// The research query.
        #[arg(short, long)]
        query: Option<String>,

        /// Search mode: web, file, web_and_file.
        #[arg(long, default_value = "web")]
        search_mode: String,

        /// Maximum number of drafts (0 behaves like 1).
        #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
        max_iterations: usize,

        /// Score every evaluator must reach (0-10).
        #[arg(long, default_value_t = DEFAULT_MIN_QUALITY)]
        min_quality: f64,

        /// Files for file search.
        #[arg(long, num_args = 1..)]
        files: Vec<PathBuf>,

        /// Also write the rendered markdown report to this file.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a JSON-lines trace of pipeline checkpoints to this file.
        #[arg(long)]
        trace: Option<PathBuf>,

        /// Category used when the router's answer is not recognised.
        #[arg(long)]
        category: Option<String>,

        /// Maximum number of planned searches.
        #[arg(long)]
        max_searches: Option<usize>,

        /// Maximum concurrent search dispatches.
        #[arg(long)]
        concurrency: Option<usize>,

        /// Directory containing prompt template files.
        #[arg(long, env = "RESEARCH_PROMPT_DIR")]
        prompt_dir: Option<PathBuf>,
    },

    /// Write the default prompt templates for customization.
    ///
    /// Existing files are never overwritten.
    #[command(after_help = r#"Examples:
  research-rs init-prompts
  research-rs init-prompts --dir ./prompts
"#)]
    InitPrompts {
        /// Target directory (default: ~/.config/research-rs/prompts).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}
