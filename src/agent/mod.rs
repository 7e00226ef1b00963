//! Agent system for research-rs.
//!
//! Provides the LLM-powered research pipeline. Every role is an
//! [`AgentSpec`] invoked through one generic function over a pluggable
//! provider abstraction backed by OpenAI-compatible APIs.
//!
//! # Architecture
//!
//! ```text
//! ResearchQuery → Orchestrator
//!   ├── Router (picks a ResearchCategory)
//!   ├── Planner (produces SearchTasks)
//!   ├── Fan-out → N concurrent web/file search agents
//!   │   └── Each task → SearchResult (failures recorded, not fatal)
//!   ├── Synthesizer (category writer) → DraftReport v0
//!   └── Refinement loop
//!       ├── EvaluatorSet (quality + standards, concurrent)
//!       └── Reviser → DraftReport v1, v2, ...
//! ```

pub mod agentic_loop;
pub mod client;
pub mod config;
pub mod corpus;
pub mod evaluator;
pub mod executor;
pub mod invoke;
pub mod message;
pub mod orchestrator;
pub mod planner;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod refinement;
pub mod retry;
pub mod roles;
pub mod router;
pub mod search;
pub mod spec;
pub mod synthesizer;
pub mod tool;
pub mod trace;
pub mod websearch;

// Re-export key types
pub use client::create_provider;
pub use config::{ResearchConfig, ResearchConfigBuilder};
pub use corpus::FileCorpus;
pub use evaluator::EvaluatorSet;
pub use executor::ToolExecutor;
pub use invoke::{AgentResponse, invoke, invoke_structured};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::{Orchestrator, ResearchOutcome};
pub use planner::PlannerAgent;
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use refinement::{Iteration, LoopState, RefinementState, RefinementStatus};
pub use retry::{RetryPolicy, RetryingProvider};
pub use roles::Roster;
pub use router::RouterAgent;
pub use search::SearchCoordinator;
pub use spec::{AgentSpec, Capability, OutputContract};
pub use synthesizer::SynthesizerAgent;
pub use tool::{ToolCall, ToolDefinition, ToolResult, ToolSet};
pub use trace::{JsonlSink, LogSink, NoopSink, TraceEvent, TraceSink};
pub use websearch::{WebHit, WebSearchBackend};
