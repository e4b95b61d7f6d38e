use async_trait::async_trait;
use steward_core::{RequestState, StewardResult};
use steward_orchestrator::{Agent, AgentDescriptor, Capability};

/// Conversational fallback agent.
pub struct GeneralAgent {
    descriptor: AgentDescriptor,
}

impl GeneralAgent {
    /// General conversation agent.
    pub fn new() -> Self {
        Self {
            descriptor: AgentDescriptor::new(
                "general_agent",
                "General Agent",
                "General conversation and Q&A; default when no specialized agent fits",
            )
            .with_capabilities(vec![Capability::ProducesText])
            .with_keywords(["hello", "hi", "help", "thanks", "explain"]),
        }
    }
}

impl Default for GeneralAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for GeneralAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, state: RequestState) -> StewardResult<RequestState> {
        let query = state.query.trim();
        let response = if query.is_empty() {
            "Hi! Ask me a question, or upload a CSV or Excel file and I can chart it, \
             analyse KPIs, forecast trends or look for anomalies."
                .to_string()
        } else {
            let files = state.uploaded_file_refs.len();
            let mut text = format!("You asked: \"{query}\".");
            if files > 0 {
                text.push_str(&format!(
                    " You have {files} file(s) attached; mention a chart, KPIs, a forecast \
                     or anomalies to analyse them."
                ));
            } else {
                text.push_str(
                    " I can chart data, analyse KPIs, forecast trends and detect anomalies \
                     once you upload a data file.",
                );
            }
            text
        };
        Ok(state.with_response(response, 0.6, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_greets_on_empty_query() {
        let out = GeneralAgent::new()
            .execute(RequestState::new("", "s", vec![]))
            .await
            .unwrap();
        assert!(out.agent_response.as_ref().unwrap().starts_with("Hi!"));
        assert!(!out.has_error());
    }

    #[tokio::test]
    async fn test_mentions_attached_files() {
        let out = GeneralAgent::new()
            .execute(RequestState::new("what now?", "s", vec!["f1".into()]))
            .await
            .unwrap();
        assert!(out.agent_response.unwrap().contains("1 file(s)"));
    }
}
