use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use steward_core::{RequestState, StewardResult};

/// What kind of output an agent produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Plain text answers.
    ProducesText,
    /// JSON results in `agent_data`.
    ProducesStructuredData,
    /// Generated files such as charts.
    ProducesArtifact,
}

/// Static metadata for a registered agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Stable identifier used for routing, trust and events.
    pub id: String,
    /// Display name.
    pub name: String,
    /// One-line summary shown to reasoners and clients.
    pub description: String,
    /// Output kinds.
    pub capabilities: Vec<Capability>,
    /// Lower-case words or phrases that indicate this agent in a query.
    pub keywords: Vec<String>,
    /// Whether the agent needs at least one uploaded file to do useful work.
    #[serde(default)]
    pub requires_files: bool,
}

impl AgentDescriptor {
    /// Text-producing agent with no keywords.
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            capabilities: vec![Capability::ProducesText],
            keywords: Vec::new(),
            requires_files: false,
        }
    }

    /// Replace the capability list.
    pub fn with_capabilities(mut self, capabilities: Vec<Capability>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Routing keywords, lower-cased.
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords
            .into_iter()
            .map(|k| k.into().to_lowercase())
            .collect();
        self
    }

    /// Mark the agent as needing uploaded files.
    pub fn requiring_files(mut self) -> Self {
        self.requires_files = true;
        self
    }

    /// Whether `capability` is declared.
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// A specialized agent the execution graph can dispatch to.
///
/// `execute` receives its own copy of the request state and returns a new one,
/// setting either `agent_response`/`agent_data` or `error`. Returning
/// `Err(StewardError::AgentExecution(_))` is a handled failure; any other
/// error, a panic, or running past the engine's deadline is a fault.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Static metadata; `id` must be unique in the registry.
    fn descriptor(&self) -> &AgentDescriptor;

    /// Run the agent on its own copy of the state.
    async fn execute(&self, state: RequestState) -> StewardResult<RequestState>;
}
