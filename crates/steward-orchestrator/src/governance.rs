use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use steward_core::StewardResult;
use uuid::Uuid;

/// Longest query prefix passed to a policy gate.
pub const POLICY_QUERY_EXCERPT: usize = 200;

/// What a policy gate is asked to decide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyRequest {
    /// Agent about to run.
    pub agent_id: String,
    /// Execution being gated.
    pub execution_id: Uuid,
    /// Requesting user, when known.
    pub user_id: Option<String>,
    /// First [`POLICY_QUERY_EXCERPT`] characters of the query.
    pub query_excerpt: String,
}

impl PolicyRequest {
    /// Request for `agent_id`, truncating `query` to the excerpt length.
    pub fn new(agent_id: &str, execution_id: Uuid, user_id: Option<String>, query: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            execution_id,
            user_id,
            query_excerpt: query.chars().take(POLICY_QUERY_EXCERPT).collect(),
        }
    }
}

/// Verdict of a [`PolicyGate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum PolicyDecision {
    /// The agent may run.
    Allow,
    /// The agent must not run.
    Deny {
        /// Why the gate refused.
        reason: String,
    },
}

/// Pre-execution governance check.
///
/// A gate that returns an error does not block execution; the engine logs the
/// failure and lets the agent run.
#[async_trait]
pub trait PolicyGate: Send + Sync {
    /// Decide whether `request` may proceed.
    async fn check(&self, request: &PolicyRequest) -> StewardResult<PolicyDecision>;
}

/// Rule-based gate with fixed deny lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticPolicyGate {
    /// Agents nobody may invoke.
    #[serde(default)]
    pub denied_agents: HashSet<String>,
    /// Users who may not invoke any agent.
    #[serde(default)]
    pub denied_users: HashSet<String>,
    /// Phrases that block a query for every agent, matched case-insensitively.
    #[serde(default)]
    pub blocked_terms: Vec<String>,
}

impl StaticPolicyGate {
    /// Gate that allows everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deny every execution of `agent_id`.
    pub fn deny_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.denied_agents.insert(agent_id.into());
        self
    }

    /// Deny every execution requested by `user_id`.
    pub fn deny_user(mut self, user_id: impl Into<String>) -> Self {
        self.denied_users.insert(user_id.into());
        self
    }

    /// Deny queries containing `term`.
    pub fn block_term(mut self, term: impl Into<String>) -> Self {
        self.blocked_terms.push(term.into().to_lowercase());
        self
    }
}

#[async_trait]
impl PolicyGate for StaticPolicyGate {
    async fn check(&self, request: &PolicyRequest) -> StewardResult<PolicyDecision> {
        if self.denied_agents.contains(&request.agent_id) {
            return Ok(PolicyDecision::Deny {
                reason: format!("agent '{}' is disabled by policy", request.agent_id),
            });
        }
        if let Some(user) = &request.user_id {
            if self.denied_users.contains(user) {
                return Ok(PolicyDecision::Deny {
                    reason: format!("user '{user}' may not invoke '{}'", request.agent_id),
                });
            }
        }
        let query = request.query_excerpt.to_lowercase();
        if let Some(term) = self.blocked_terms.iter().find(|t| query.contains(&t.to_lowercase())) {
            return Ok(PolicyDecision::Deny {
                reason: format!("query contains blocked term '{term}'"),
            });
        }
        Ok(PolicyDecision::Allow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(agent: &str, user: Option<&str>, query: &str) -> PolicyRequest {
        PolicyRequest::new(agent, Uuid::nil(), user.map(str::to_string), query)
    }

    #[tokio::test]
    async fn test_empty_gate_allows() {
        let gate = StaticPolicyGate::new();
        assert_eq!(
            gate.check(&request("chart_agent", None, "plot")).await.unwrap(),
            PolicyDecision::Allow
        );
    }

    #[tokio::test]
    async fn test_denied_agent_user_and_term() {
        let gate = StaticPolicyGate::new()
            .deny_agent("forecasting_agent")
            .deny_user("mallory")
            .block_term("SALARY");

        assert!(matches!(
            gate.check(&request("forecasting_agent", None, "x")).await.unwrap(),
            PolicyDecision::Deny { .. }
        ));
        assert!(matches!(
            gate.check(&request("chart_agent", Some("mallory"), "x")).await.unwrap(),
            PolicyDecision::Deny { .. }
        ));
        assert!(matches!(
            gate.check(&request("chart_agent", Some("alice"), "show salary by team"))
                .await
                .unwrap(),
            PolicyDecision::Deny { .. }
        ));
        assert_eq!(
            gate.check(&request("chart_agent", Some("alice"), "show revenue")).await.unwrap(),
            PolicyDecision::Allow
        );
    }

    #[test]
    fn test_query_excerpt_is_bounded() {
        let long = "é".repeat(500);
        let req = request("a", None, &long);
        assert_eq!(req.query_excerpt.chars().count(), POLICY_QUERY_EXCERPT);
    }

    #[test]
    fn test_decision_wire_shape() {
        let json = serde_json::to_value(PolicyDecision::Deny { reason: "r".into() }).unwrap();
        assert_eq!(json["decision"], "deny");
        assert_eq!(json["reason"], "r");
    }
}
