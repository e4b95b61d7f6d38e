use crate::agent::AgentDescriptor;
use crate::context::RequestContext;
use crate::registry::AgentRegistry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use steward_core::{StewardError, StewardResult};
use tracing::{debug, info, warn};

/// Agent used when nothing else clears the confidence threshold.
pub const DEFAULT_FALLBACK_AGENT: &str = "general_agent";
/// Minimum score a candidate needs to be selected without falling back.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;

/// External reasoning service consulted while scoring candidates.
///
/// Implementations return the raw verdict text; the supervisor validates it
/// into a [`RoutingDecision`] before acting on it.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Verdict text naming one of `candidates` for `query`.
    async fn route(
        &self,
        query: &str,
        context: &RequestContext,
        candidates: &[&AgentDescriptor],
        seed: u64,
    ) -> StewardResult<String>;
}

/// A reasoner verdict after validation against the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingDecision {
    /// A registered agent, with the reasoner's confidence in `[0, 1]`.
    Agent { agent_id: String, confidence: f64 },
    /// The verdict was unusable; route to the fallback agent.
    Fallback { reason: String },
}

#[derive(Deserialize)]
struct StructuredVerdict {
    #[serde(alias = "agent_id")]
    agent: String,
    #[serde(default)]
    confidence: Option<f64>,
}

impl RoutingDecision {
    /// Validate a raw verdict. Accepts a bare agent id (`"chart_agent"`), the id
    /// without its `_agent` suffix (`"chart"`), or a JSON object
    /// `{"agent": "...", "confidence": 0.9}`.
    pub fn parse(raw: &str, registry: &AgentRegistry) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with('{') {
            return match serde_json::from_str::<StructuredVerdict>(trimmed) {
                Ok(verdict) => {
                    Self::resolve(&verdict.agent, verdict.confidence.unwrap_or(1.0), registry)
                }
                Err(e) => RoutingDecision::Fallback {
                    reason: format!("unparseable reasoner verdict: {e}"),
                },
            };
        }
        Self::resolve(trimmed, 1.0, registry)
    }

    fn resolve(name: &str, confidence: f64, registry: &AgentRegistry) -> Self {
        let normalized = name
            .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '.') || c.is_whitespace())
            .to_lowercase();
        if normalized.is_empty() {
            return RoutingDecision::Fallback {
                reason: "empty reasoner verdict".into(),
            };
        }

        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        for candidate in [normalized.clone(), format!("{normalized}_agent")] {
            if registry.contains(&candidate) {
                return RoutingDecision::Agent {
                    agent_id: candidate,
                    confidence,
                };
            }
        }
        RoutingDecision::Fallback {
            reason: format!("reasoner named unknown agent '{normalized}'"),
        }
    }
}

/// Tunables for the [`Supervisor`].
#[derive(Clone)]
pub struct RoutingPolicy {
    /// Agent used when no candidate clears `min_confidence`. `None` disables
    /// the fallback, turning such requests into routing errors.
    pub default_agent: Option<String>,
    /// Lowest keyword or reasoner score accepted without falling back.
    pub min_confidence: f64,
    /// Decision seed forwarded to the reasoner.
    pub seed: u64,
    /// Optional reasoner consulted before keyword scoring decides.
    pub reasoner: Option<Arc<dyn Reasoner>>,
    /// Deadline for one reasoner call.
    pub reasoner_timeout: Duration,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            default_agent: Some(DEFAULT_FALLBACK_AGENT.to_string()),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            seed: 0,
            reasoner: None,
            reasoner_timeout: Duration::from_secs(5),
        }
    }
}

impl RoutingPolicy {
    /// Set or clear the fallback agent.
    pub fn with_default_agent(mut self, agent_id: Option<String>) -> Self {
        self.default_agent = agent_id;
        self
    }

    /// Set the confidence threshold.
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Set the decision seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Consult `reasoner`, giving up after `timeout`.
    pub fn with_reasoner(mut self, reasoner: Arc<dyn Reasoner>, timeout: Duration) -> Self {
        self.reasoner = Some(reasoner);
        self.reasoner_timeout = timeout;
        self
    }
}

/// Outcome of a routing decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    /// Selected agent.
    pub agent_id: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Why the fallback agent was chosen, when it was.
    pub fallback_reason: Option<String>,
}

impl Route {
    /// Whether the fallback agent was chosen.
    pub fn is_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// Keyword score of `descriptor` for `query`: `1 - 0.5^hits`, so one matching
/// keyword gives 0.5, two give 0.75 and so on.
pub fn keyword_score(query: &str, descriptor: &AgentDescriptor) -> f64 {
    let Some(haystack) = normalize(query) else {
        return 0.0;
    };
    let hits = descriptor
        .keywords
        .iter()
        .filter_map(|k| normalize(k))
        .filter(|needle| haystack.contains(needle.as_str()))
        .count();
    1.0 - 0.5f64.powi(hits.min(32) as i32)
}

/// Lower-cased words joined by single spaces and padded, so that
/// `contains(" bar chart ")` only matches whole words.
fn normalize(text: &str) -> Option<String> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(format!(" {} ", words.join(" ")))
    }
}

/// Deterministic routing policy: keyword metadata plus an optional reasoner,
/// ties broken by registry declaration order.
pub struct Supervisor {
    policy: RoutingPolicy,
}

impl Supervisor {
    /// Supervisor applying `policy`.
    pub fn new(policy: RoutingPolicy) -> Self {
        Self { policy }
    }

    /// The routing policy in use.
    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }

    /// Pick the agent for `query`.
    ///
    /// Fails with [`StewardError::Routing`] only when no candidate qualifies
    /// and no usable fallback agent is configured.
    pub async fn select(
        &self,
        query: &str,
        context: &RequestContext,
        registry: &AgentRegistry,
    ) -> StewardResult<Route> {
        let mut scores: Vec<(&AgentDescriptor, f64)> = registry
            .list()
            .into_iter()
            .map(|d| (d, keyword_score(query, d)))
            .collect();

        if let Some(reasoner) = &self.policy.reasoner {
            match self.consult(reasoner.as_ref(), query, context, registry).await {
                RoutingDecision::Agent {
                    agent_id,
                    confidence,
                } => {
                    for (descriptor, score) in &mut scores {
                        if descriptor.id == agent_id {
                            *score = score.max(confidence);
                        }
                    }
                }
                RoutingDecision::Fallback { reason } => return self.fallback(registry, reason),
            }
        }

        let mut best: Option<(&AgentDescriptor, f64)> = None;
        for (descriptor, score) in scores {
            let better = match best {
                None => true,
                Some((_, best_score)) => score > best_score,
            };
            if better {
                best = Some((descriptor, score));
            }
        }

        match best {
            Some((descriptor, score)) if score >= self.policy.min_confidence => {
                debug!(agent_id = %descriptor.id, confidence = score, "Routing decision");
                Ok(Route {
                    agent_id: descriptor.id.clone(),
                    confidence: score,
                    fallback_reason: None,
                })
            }
            Some((_, score)) => self.fallback(
                registry,
                format!(
                    "best candidate scored {score:.2}, below threshold {:.2}",
                    self.policy.min_confidence
                ),
            ),
            None => self.fallback(registry, "no agents registered".to_string()),
        }
    }

    async fn consult(
        &self,
        reasoner: &dyn Reasoner,
        query: &str,
        context: &RequestContext,
        registry: &AgentRegistry,
    ) -> RoutingDecision {
        let candidates = registry.list();
        let call = reasoner.route(query, context, &candidates, self.policy.seed);
        match tokio::time::timeout(self.policy.reasoner_timeout, call).await {
            Ok(Ok(raw)) => {
                let decision = RoutingDecision::parse(&raw, registry);
                debug!(reasoner = reasoner.name(), raw = %raw, decision = ?decision, "Reasoner verdict");
                decision
            }
            Ok(Err(e)) => {
                warn!(reasoner = reasoner.name(), error = %e, "Routing reasoner failed");
                RoutingDecision::Fallback {
                    reason: format!("reasoner failed: {e}"),
                }
            }
            Err(_) => {
                warn!(
                    reasoner = reasoner.name(),
                    timeout_ms = self.policy.reasoner_timeout.as_millis() as u64,
                    "Routing reasoner timed out"
                );
                RoutingDecision::Fallback {
                    reason: format!(
                        "reasoner timed out after {}ms",
                        self.policy.reasoner_timeout.as_millis()
                    ),
                }
            }
        }
    }

    fn fallback(&self, registry: &AgentRegistry, reason: String) -> StewardResult<Route> {
        match &self.policy.default_agent {
            Some(agent_id) if registry.contains(agent_id) => {
                info!(agent_id = %agent_id, reason = %reason, "Routing to fallback agent");
                Ok(Route {
                    agent_id: agent_id.clone(),
                    confidence: 0.0,
                    fallback_reason: Some(reason),
                })
            }
            Some(agent_id) => Err(StewardError::Routing(format!(
                "fallback agent '{agent_id}' is not registered ({reason})"
            ))),
            None => Err(StewardError::Routing(format!(
                "no agent selected and no fallback configured ({reason})"
            ))),
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(RoutingPolicy::default())
    }
}
