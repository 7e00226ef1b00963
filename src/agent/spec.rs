//! Agent definitions.
//!
//! An agent is plain data: a name, model, instructions, capability list and
//! output contract. Every role in the pipeline is an [`AgentSpec`] handed to
//! [`invoke`](super::invoke::invoke); there is no per-role agent type.

use schemars::JsonSchema;

/// A tool capability an agent may use during its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Search the web.
    WebSearch,
    /// Search the user-supplied files.
    FileSearch,
}

impl Capability {
    /// Tool name exposed to the model.
    #[must_use]
    pub const fn tool_name(self) -> &'static str {
        match self {
            Self::WebSearch => "web_search",
            Self::FileSearch => "file_search",
        }
    }
}

/// Shape of the agent's final answer.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputContract {
    /// Free text.
    Text,
    /// A JSON object matching `schema`.
    Structured {
        /// Schema name used in prompts and errors.
        schema_name: String,
        /// JSON Schema of the expected object.
        schema: serde_json::Value,
    },
}

impl OutputContract {
    /// Structured contract for `T`, with the schema generated by `schemars`.
    #[must_use]
    pub fn structured<T: JsonSchema>(schema_name: &str) -> Self {
        let schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default();
        Self::Structured {
            schema_name: schema_name.to_string(),
            schema,
        }
    }

    /// Whether JSON output is required.
    #[must_use]
    pub const fn is_structured(&self) -> bool {
        matches!(self, Self::Structured { .. })
    }
}

/// Declarative description of one agent role.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    /// Agent name, used for logging and request routing.
    pub name: String,
    /// Model identifier.
    pub model: String,
    /// System instructions.
    pub instructions: String,
    /// Tools available to the agent.
    pub capabilities: Vec<Capability>,
    /// Expected output shape.
    pub output: OutputContract,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens in the final answer.
    pub max_tokens: u32,
    /// Maximum model/tool round-trips.
    pub max_tool_iterations: usize,
    /// The first completion must call a tool, and the answer only counts
    /// when at least one call succeeded.
    pub require_tool_use: bool,
}

impl AgentSpec {
    /// Creates a text agent with no capabilities.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            instructions: instructions.into(),
            capabilities: Vec::new(),
            output: OutputContract::Text,
            temperature: 0.0,
            max_tokens: 2048,
            max_tool_iterations: 1,
            require_tool_use: false,
        }
    }

    /// Sets the output contract.
    #[must_use]
    pub fn with_output(mut self, output: OutputContract) -> Self {
        self.output = output;
        self
    }

    /// Adds a capability.
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the max tokens.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the tool loop limit.
    #[must_use]
    pub const fn with_max_tool_iterations(mut self, n: usize) -> Self {
        self.max_tool_iterations = n;
        self
    }

    /// Requires the agent to gather evidence through its tools.
    #[must_use]
    pub const fn requiring_tool_use(mut self) -> Self {
        self.require_tool_use = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DraftReport;

    #[test]
    fn test_structured_contract_carries_schema() {
        let contract = OutputContract::structured::<DraftReport>("DraftReport");
        assert!(contract.is_structured());
        if let OutputContract::Structured {
            schema_name,
            schema,
        } = contract
        {
            assert_eq!(schema_name, "DraftReport");
            assert!(schema["properties"]["markdown_report"].is_object());
        }
    }

    #[test]
    fn test_capabilities_are_deduplicated() {
        let spec = AgentSpec::new("search", "m", "i")
            .with_capability(Capability::WebSearch)
            .with_capability(Capability::WebSearch);
        assert_eq!(spec.capabilities, vec![Capability::WebSearch]);
        assert!(!spec.output.is_structured());
    }
}
