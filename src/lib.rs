//! # research-rs
//!
//! Multi-agent research report generator.
//!
//! A research session routes a query to a [`core::ResearchCategory`],
//! plans search tasks, fans them out concurrently to web and file search
//! agents, synthesizes a structured [`core::DraftReport`] and refines it
//! with an evaluator set until every evaluator passes or the iteration
//! budget runs out.
//!
//! ## Modules
//!
//! - [`core`]: Query, category, search, report and evaluation types
//! - [`agent`]: Agents, providers, capabilities and the orchestrator
//! - [`cli`]: Command-line interface
//! - [`error`]: Error types
//!
//! ## Example
//!
//! ```no_run
//! use research_rs::agent::{NoopSink, Orchestrator, ResearchConfig, create_provider};
//! use research_rs::core::ResearchQuery;
//!
//! # async fn example() -> research_rs::Result<()> {
//! let config = ResearchConfig::from_env()?;
//! let provider = create_provider(&config)?;
//! let orchestrator = Orchestrator::new(provider, config);
//! let outcome = orchestrator
//!     .run(&ResearchQuery::new("History of the transistor"), &NoopSink)
//!     .await?;
//! assert!(!outcome.report.markdown_report.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod error;

pub use error::{Error, Result};
