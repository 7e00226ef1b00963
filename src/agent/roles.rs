//! Role table and agent roster.
//!
//! Category-specific behavior is data: each [`ResearchCategory`] maps to a
//! [`RoleProfile`], and [`Roster`] turns the profile, the configuration
//! and the prompt set into [`AgentSpec`]s.

use super::config::ResearchConfig;
use super::evaluator::{QualityAssessment, StandardsAssessment};
use super::planner::SearchPlan;
use super::prompt::PromptSet;
use super::router::RouteDecision;
use super::spec::{AgentSpec, Capability, OutputContract};
use crate::core::{DraftReport, ResearchCategory};

/// Agent name of the router.
pub const ROUTER: &str = "router";
/// Agent name of the planner.
pub const PLANNER: &str = "planner";
/// Agent name of the web search agent.
pub const WEB_SEARCHER: &str = "web_searcher";
/// Agent name of the file search agent.
pub const FILE_SEARCHER: &str = "file_searcher";
/// Agent name of the synthesizer.
pub const WRITER: &str = "writer";
/// Agent name of the revision agent.
pub const REVISER: &str = "reviser";
/// Agent name of the general evaluator.
pub const QUALITY_EVALUATOR: &str = "quality_evaluator";
/// Agent name of the category-aware evaluator.
pub const STANDARDS_EVALUATOR: &str = "standards_evaluator";

/// Per-category writer settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoleProfile {
    /// Category this profile applies to.
    pub category: ResearchCategory,
    /// Capabilities granted to the writer and reviser.
    pub writer_capabilities: &'static [Capability],
    /// Sampling temperature for the writer and reviser.
    pub writer_temperature: f32,
}

/// One profile per category, in [`ResearchCategory::ALL`] order.
pub static ROLE_TABLE: [RoleProfile; 4] = [
    RoleProfile {
        category: ResearchCategory::Scientific,
        writer_capabilities: &[Capability::WebSearch],
        writer_temperature: 0.2,
    },
    RoleProfile {
        category: ResearchCategory::Technical,
        writer_capabilities: &[Capability::WebSearch],
        writer_temperature: 0.2,
    },
    RoleProfile {
        category: ResearchCategory::Humanities,
        writer_capabilities: &[],
        writer_temperature: 0.4,
    },
    RoleProfile {
        category: ResearchCategory::Interdisciplinary,
        writer_capabilities: &[Capability::WebSearch],
        writer_temperature: 0.3,
    },
];

/// Looks up the profile for `category`.
#[must_use]
pub fn profile(category: ResearchCategory) -> &'static RoleProfile {
    ROLE_TABLE
        .iter()
        .find(|p| p.category == category)
        .unwrap_or(&ROLE_TABLE[3])
}

/// Builds agent specs for one session.
#[derive(Debug, Clone, Copy)]
pub struct Roster<'a> {
    config: &'a ResearchConfig,
    prompts: &'a PromptSet,
    web: bool,
}

impl<'a> Roster<'a> {
    /// Creates a roster. `web` grants web search to the agents that use it.
    #[must_use]
    pub const fn new(config: &'a ResearchConfig, prompts: &'a PromptSet, web: bool) -> Self {
        Self {
            config,
            prompts,
            web,
        }
    }

    /// The router.
    #[must_use]
    pub fn router(&self) -> AgentSpec {
        AgentSpec::new(ROUTER, &self.config.router_model, &self.prompts.router)
            .with_output(OutputContract::structured::<RouteDecision>("RouteDecision"))
            .with_max_tokens(256)
    }

    /// The planner.
    #[must_use]
    pub fn planner(&self) -> AgentSpec {
        AgentSpec::new(PLANNER, &self.config.planner_model, &self.prompts.planner)
            .with_output(OutputContract::structured::<SearchPlan>("SearchPlan"))
            .with_max_tokens(self.config.planner_max_tokens)
    }

    /// The web search agent.
    #[must_use]
    pub fn web_searcher(&self) -> AgentSpec {
        AgentSpec::new(
            WEB_SEARCHER,
            &self.config.search_model,
            &self.prompts.web_search,
        )
        .with_capability(Capability::WebSearch)
        .with_max_tokens(self.config.search_max_tokens)
        .with_max_tool_iterations(self.config.max_tool_iterations)
        .requiring_tool_use()
    }

    /// The file search agent.
    #[must_use]
    pub fn file_searcher(&self) -> AgentSpec {
        AgentSpec::new(
            FILE_SEARCHER,
            &self.config.search_model,
            &self.prompts.file_search,
        )
        .with_capability(Capability::FileSearch)
        .with_max_tokens(self.config.search_max_tokens)
        .with_max_tool_iterations(self.config.max_tool_iterations)
        .requiring_tool_use()
    }

    /// The synthesizer for `category`.
    #[must_use]
    pub fn writer(&self, category: ResearchCategory) -> AgentSpec {
        self.drafting(WRITER, self.prompts.writer(category), category)
    }

    /// The revision agent for `category`.
    #[must_use]
    pub fn reviser(&self, category: ResearchCategory) -> AgentSpec {
        self.drafting(REVISER, self.prompts.reviser(category), category)
    }

    /// The general evaluator. Verifies claims on the web when available.
    #[must_use]
    pub fn quality_evaluator(&self) -> AgentSpec {
        let spec = AgentSpec::new(
            QUALITY_EVALUATOR,
            &self.config.evaluator_model,
            &self.prompts.quality_evaluator,
        )
        .with_output(OutputContract::structured::<QualityAssessment>(
            "QualityAssessment",
        ))
        .with_max_tokens(self.config.evaluator_max_tokens)
        .with_max_tool_iterations(self.config.max_tool_iterations);
        if self.web {
            spec.with_capability(Capability::WebSearch)
        } else {
            spec
        }
    }

    /// The category-aware evaluator.
    #[must_use]
    pub fn standards_evaluator(&self, category: ResearchCategory) -> AgentSpec {
        AgentSpec::new(
            STANDARDS_EVALUATOR,
            &self.config.evaluator_model,
            self.prompts.standards(category),
        )
        .with_output(OutputContract::structured::<StandardsAssessment>(
            "StandardsAssessment",
        ))
        .with_max_tokens(self.config.evaluator_max_tokens)
    }

    fn drafting(&self, name: &str, instructions: String, category: ResearchCategory) -> AgentSpec {
        let profile = profile(category);
        let mut spec = AgentSpec::new(name, &self.config.writer_model, instructions)
            .with_output(OutputContract::structured::<DraftReport>("DraftReport"))
            .with_temperature(profile.writer_temperature)
            .with_max_tokens(self.config.writer_max_tokens)
            .with_max_tool_iterations(self.config.max_tool_iterations);
        for &capability in profile.writer_capabilities {
            if capability != Capability::WebSearch || self.web {
                spec = spec.with_capability(capability);
            }
        }
        spec
    }
}
