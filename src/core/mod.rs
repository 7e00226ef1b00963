//! Core data model shared by the pipeline and the CLI.
//!
//! These types carry no behavior beyond validation and ordering, so the
//! reporting layer can consume them without touching the agent system.

pub mod category;
pub mod evaluation;
pub mod query;
pub mod report;
pub mod search;

pub use category::ResearchCategory;
pub use evaluation::{EvaluationResult, ScoreSummary, all_passed, clamp_score};
pub use query::{ResearchQuery, SearchMode};
pub use report::DraftReport;
pub use search::{SearchOrigin, SearchResult, SearchRound, SearchTask, TaskStatus};
