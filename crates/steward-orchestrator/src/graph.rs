use crate::agent::Agent;
use crate::context::RequestContext;
use crate::governance::{PolicyDecision, PolicyGate, PolicyRequest};
use crate::ledger::ExecutionLedger;
use crate::registry::AgentRegistry;
use crate::supervisor::Supervisor;
use std::sync::Arc;
use std::time::{Duration, Instant};
use steward_core::{
    ErrorKind, ExecutionRecord, MetricsPayload, Outcome, RequestState, StewardError, Topic,
    TrustContext, TrustPayload, SUPERVISOR_NODE,
};
use steward_events::EventPublisher;
use steward_trust::{TrustEngine, TrustSignal, TrustUpdate};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Per-execution deadline used when none is configured (5 minutes).
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Confidence attached to trust events the engine derives from outcomes.
const OUTCOME_SIGNAL_CONFIDENCE: f64 = 1.0;

/// How an agent run ended, before any accounting.
struct AgentRun {
    state: RequestState,
    outcome: Outcome,
    signal: TrustSignal,
}

/// The supervisor → agent → finalize graph.
///
/// `run` never fails: routing errors, policy denials, agent failures, faults
/// and timeouts are all captured into the returned state's `error`.
pub struct ExecutionGraph {
    registry: Arc<AgentRegistry>,
    supervisor: Supervisor,
    trust: Arc<TrustEngine>,
    publisher: Arc<EventPublisher>,
    ledger: Arc<ExecutionLedger>,
    policy_gate: Option<Arc<dyn PolicyGate>>,
    agent_timeout: Duration,
}

impl ExecutionGraph {
    /// Graph with an in-memory ledger and the default agent timeout.
    pub fn new(
        registry: Arc<AgentRegistry>,
        supervisor: Supervisor,
        trust: Arc<TrustEngine>,
        publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            registry,
            supervisor,
            trust,
            publisher,
            ledger: Arc::new(ExecutionLedger::default()),
            policy_gate: None,
            agent_timeout: DEFAULT_AGENT_TIMEOUT,
        }
    }

    /// Use a shared execution ledger.
    pub fn with_ledger(mut self, ledger: Arc<ExecutionLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    /// Check every execution against `gate` before the agent runs.
    pub fn with_policy_gate(mut self, gate: Arc<dyn PolicyGate>) -> Self {
        self.policy_gate = Some(gate);
        self
    }

    /// Deadline for a single agent execution.
    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = timeout;
        self
    }

    /// Registered agents.
    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// Trust engine updated after every run.
    pub fn trust(&self) -> &Arc<TrustEngine> {
        &self.trust
    }

    /// Ledger of finished executions.
    pub fn ledger(&self) -> &Arc<ExecutionLedger> {
        &self.ledger
    }

    /// Event publisher.
    pub fn publisher(&self) -> &Arc<EventPublisher> {
        &self.publisher
    }

    /// Give every registered agent a trust score (restored or initial).
    pub async fn register_trust(&self) -> steward_core::StewardResult<()> {
        for agent_id in self.registry.ids() {
            self.trust.register(&agent_id).await?;
        }
        Ok(())
    }

    /// Handle one query end to end.
    pub async fn run(&self, query: &str, context: &RequestContext) -> RequestState {
        let started = Instant::now();
        let execution_id = Uuid::new_v4();
        let session_id = context
            .session_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut state = RequestState::new(query, session_id, context.file_refs.clone())
            .with_execution_id(execution_id);
        for (file_ref, payload) in &context.file_data {
            state = state.with_file_data(file_ref.as_str(), payload.clone());
        }

        info!(execution_id = %execution_id, "Graph run started");

        let state = self.route(state, context).await;
        let agent = match state.selected_agent.as_deref().map(|id| self.registry.get(id)) {
            Some(Some(agent)) => agent.clone(),
            _ => {
                // No agent runs: the request fails without touching any trust score.
                self.finish(&state, SUPERVISOR_NODE, Outcome::Error, started);
                return state;
            }
        };
        let agent_id = agent.descriptor().id.clone();

        // A denied agent never runs, so it is not added to the execution path.
        if let Some(reason) = self.policy_denial(&agent_id, execution_id, context, query).await {
            let state = state.with_error(ErrorKind::PolicyViolation, reason);
            let state = self.finish(&state, &agent_id, Outcome::Failure, started);
            self.account(&agent_id, TrustSignal::PolicyViolation, execution_id, context)
                .await;
            return state;
        }

        let run = self.execute_agent(agent, state).await;
        let state = self.finish(&run.state, &agent_id, run.outcome, started);
        self.account(&agent_id, run.signal, execution_id, context).await;
        state
    }

    /// Supervisor node.
    async fn route(&self, state: RequestState, context: &RequestContext) -> RequestState {
        let state = state.with_execution_step(SUPERVISOR_NODE);
        match self
            .supervisor
            .select(&state.query, context, &self.registry)
            .await
        {
            Ok(route) => {
                let mut next = state
                    .with_selected_agent(route.agent_id.as_str())
                    .with_metadata("routing_decision", route.agent_id.clone().into())
                    .with_metadata("routing_confidence", route.confidence.into());
                if let Some(reason) = route.fallback_reason {
                    next = next.with_metadata("routing_fallback", reason.into());
                }
                next
            }
            Err(e) => {
                warn!(error = %e, "Routing failed with no fallback");
                state
                    .with_metadata("routing_error", e.to_string().into())
                    .with_error(ErrorKind::Routing, e.to_string())
            }
        }
    }

    /// Returns the denial reason when the policy gate blocks `agent_id`.
    async fn policy_denial(
        &self,
        agent_id: &str,
        execution_id: Uuid,
        context: &RequestContext,
        query: &str,
    ) -> Option<String> {
        let gate = self.policy_gate.as_ref()?;
        let request = PolicyRequest::new(agent_id, execution_id, context.user_id.clone(), query);
        match gate.check(&request).await {
            Ok(PolicyDecision::Allow) => None,
            Ok(PolicyDecision::Deny { reason }) => {
                warn!(agent_id = %agent_id, execution_id = %execution_id, reason = %reason, "Governance policy denied execution");
                Some(format!("Governance policy denied execution: {reason}"))
            }
            Err(e) => {
                warn!(agent_id = %agent_id, error = %e, "Policy check failed, allowing execution");
                None
            }
        }
    }

    /// Agent node. The agent runs on its own task so that panics are contained
    /// and the deadline can cancel it.
    async fn execute_agent(&self, agent: Arc<dyn Agent>, state: RequestState) -> AgentRun {
        let agent_id = agent.descriptor().id.clone();
        let input = state.clone();
        let handle = tokio::spawn(async move { agent.execute(input).await });
        let abort = handle.abort_handle();

        let base = state.with_execution_step(agent_id.as_str());
        match tokio::time::timeout(self.agent_timeout, handle).await {
            Ok(Ok(Ok(output))) => {
                let outcome = match output.error.as_ref().map(|e| e.kind) {
                    None => Outcome::Success,
                    Some(ErrorKind::AgentFault) => Outcome::Error,
                    Some(_) => Outcome::Failure,
                };
                // Engine-owned fields win over whatever the agent wrote.
                let mut state = output.with_execution_path_of(&base);
                state.selected_agent = base.selected_agent.clone();
                state.execution_id = base.execution_id;
                AgentRun {
                    state,
                    outcome,
                    signal: TrustSignal::from_outcome(outcome),
                }
            }
            Ok(Ok(Err(StewardError::AgentExecution(message)))) => AgentRun {
                state: base.with_error(ErrorKind::AgentExecution, message),
                outcome: Outcome::Failure,
                signal: TrustSignal::ExecutionFailure,
            },
            Ok(Ok(Err(e))) => {
                error!(agent_id = %agent_id, error = %e, "Agent faulted");
                AgentRun {
                    state: base.with_error(ErrorKind::AgentFault, e.to_string()),
                    outcome: Outcome::Error,
                    signal: TrustSignal::ExecutionError,
                }
            }
            Ok(Err(join_err)) => {
                error!(agent_id = %agent_id, error = %join_err, "Agent task panicked");
                AgentRun {
                    state: base.with_error(ErrorKind::AgentFault, format!("agent task failed: {join_err}")),
                    outcome: Outcome::Error,
                    signal: TrustSignal::ExecutionError,
                }
            }
            Err(_) => {
                abort.abort();
                error!(
                    agent_id = %agent_id,
                    timeout_ms = self.agent_timeout.as_millis() as u64,
                    "Agent timed out, cancelled"
                );
                AgentRun {
                    state: base.with_error(
                        ErrorKind::AgentFault,
                        format!("agent timed out after {}ms", self.agent_timeout.as_millis()),
                    ),
                    outcome: Outcome::Error,
                    signal: TrustSignal::ExecutionTimeout,
                }
            }
        }
    }

    /// Terminal node: stamp duration, record the execution and emit metrics.
    fn finish(
        &self,
        state: &RequestState,
        agent_id: &str,
        outcome: Outcome,
        started: Instant,
    ) -> RequestState {
        let duration_ms = started.elapsed().as_millis() as u64;
        let execution_id = state.execution_id.unwrap_or_else(Uuid::new_v4);
        let record = ExecutionRecord::new(execution_id, agent_id, outcome, duration_ms);

        if agent_id != SUPERVISOR_NODE {
            self.ledger.record(record.clone());
        }
        self.publisher
            .publish_payload(Topic::Metrics, &MetricsPayload::from(&record));

        info!(
            execution_id = %execution_id,
            agent_id = %agent_id,
            outcome = %outcome,
            duration_ms,
            "Graph run finished"
        );
        state
            .clone()
            .with_metadata("execution_time_ms", duration_ms.into())
    }

    /// Apply `signal` to the agent's trust score and publish the delta.
    /// Accounting failures are logged; they never change the response.
    async fn account(
        &self,
        agent_id: &str,
        signal: TrustSignal,
        execution_id: Uuid,
        context: &RequestContext,
    ) {
        let update = match self.apply_signal(agent_id, signal).await {
            Ok(update) => update,
            Err(e) => {
                error!(agent_id = %agent_id, error = %e, "Failed to update trust score");
                return;
            }
        };
        if update.has_impact() {
            let payload = trust_payload(
                agent_id,
                &update,
                OUTCOME_SIGNAL_CONFIDENCE,
                TrustContext {
                    execution_id,
                    user_id: context.user_id.clone(),
                    rating: None,
                },
            );
            self.publisher.publish_payload(Topic::Trust, &payload);
        }
    }

    async fn apply_signal(
        &self,
        agent_id: &str,
        signal: TrustSignal,
    ) -> steward_core::StewardResult<TrustUpdate> {
        if !self.trust.is_registered(agent_id) {
            self.trust.register(agent_id).await?;
        }
        self.trust.apply(agent_id, signal).await
    }
}

/// Trust event body for an applied update.
pub(crate) fn trust_payload(
    agent_id: &str,
    update: &TrustUpdate,
    confidence: f64,
    context: TrustContext,
) -> TrustPayload {
    TrustPayload {
        agent_id: agent_id.to_string(),
        event_type: update.signal.event_type(),
        severity: update.signal.severity(),
        impact: update.delta,
        confidence,
        context,
        timestamp: update.current.updated_at,
    }
}
