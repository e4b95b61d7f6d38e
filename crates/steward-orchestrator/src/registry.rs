use crate::agent::{Agent, AgentDescriptor};
use std::collections::HashMap;
use std::sync::Arc;
use steward_core::{StewardError, StewardResult};
use tracing::info;

/// Agents available for routing, kept in declaration order.
///
/// Declaration order matters: the supervisor breaks score ties in favour of
/// the agent registered first.
pub struct AgentRegistry {
    agents: Vec<Arc<dyn Agent>>,
    index: HashMap<String, usize>,
}

impl AgentRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            agents: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Add an agent. Ids must be unique.
    pub fn register(&mut self, agent: Arc<dyn Agent>) -> StewardResult<()> {
        let id = agent.descriptor().id.clone();
        if id.is_empty() {
            return Err(StewardError::Validation("Agent id must not be empty".into()));
        }
        if self.index.contains_key(&id) {
            return Err(StewardError::Conflict(format!("Agent '{id}' is already registered")));
        }
        info!(agent_id = %id, "Registered agent");
        self.index.insert(id, self.agents.len());
        self.agents.push(agent);
        Ok(())
    }

    /// Agent registered as `agent_id`.
    pub fn get(&self, agent_id: &str) -> Option<&Arc<dyn Agent>> {
        self.index.get(agent_id).and_then(|&i| self.agents.get(i))
    }

    /// Whether `agent_id` is registered.
    pub fn contains(&self, agent_id: &str) -> bool {
        self.index.contains_key(agent_id)
    }

    /// Descriptors in declaration order.
    pub fn list(&self) -> Vec<&AgentDescriptor> {
        self.agents.iter().map(|a| a.descriptor()).collect()
    }

    /// Agent ids in declaration order.
    pub fn ids(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.descriptor().id.clone()).collect()
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no agents are registered.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use steward_core::RequestState;

    struct Named(AgentDescriptor);

    #[async_trait]
    impl Agent for Named {
        fn descriptor(&self) -> &AgentDescriptor {
            &self.0
        }

        async fn execute(&self, state: RequestState) -> StewardResult<RequestState> {
            Ok(state)
        }
    }

    fn agent(id: &str) -> Arc<dyn Agent> {
        Arc::new(Named(AgentDescriptor::new(id, id, "test agent")))
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = AgentRegistry::new();
        registry.register(agent("chart_agent")).unwrap();
        assert!(registry.get("chart_agent").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_list_keeps_declaration_order() {
        let mut registry = AgentRegistry::new();
        for id in ["zeta", "alpha", "mid"] {
            registry.register(agent(id)).unwrap();
        }
        let ids: Vec<&str> = registry.list().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_duplicate_and_empty_ids_rejected() {
        let mut registry = AgentRegistry::new();
        registry.register(agent("a")).unwrap();
        assert!(matches!(registry.register(agent("a")), Err(StewardError::Conflict(_))));
        assert!(matches!(registry.register(agent("")), Err(StewardError::Validation(_))));
    }

    #[test]
    fn test_descriptor_keywords_lowercased() {
        let d = AgentDescriptor::new("a", "A", "d").with_keywords(["Chart", "BAR chart"]);
        assert_eq!(d.keywords, vec!["chart", "bar chart"]);
        assert!(!d.requires_files);
        assert!(d.requiring_files().requires_files);
    }
}
