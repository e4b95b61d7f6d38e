use crate::agent::AgentDescriptor;
use crate::context::RequestContext;
use crate::supervisor::Reasoner;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use steward_core::{StewardError, StewardResult};

/// Connection settings for [`HttpReasoner`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpReasonerConfig {
    /// Base URL of an OpenAI-compatible API, without the `/v1/...` suffix.
    pub base_url: String,
    /// Model name sent with every request.
    pub model: String,
    /// Bearer token, when the API needs one.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    5_000
}

/// Routing reasoner backed by an OpenAI-compatible chat completions API.
///
/// Requests are sent with temperature 0 and the policy's decision seed so the
/// same query yields the same verdict.
pub struct HttpReasoner {
    config: HttpReasonerConfig,
    http: reqwest::Client,
}

impl HttpReasoner {
    /// Reasoner with its own HTTP client.
    pub fn new(config: HttpReasonerConfig) -> StewardResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| StewardError::Http(e.to_string()))?;
        Ok(Self { config, http })
    }

    fn system_prompt(candidates: &[&AgentDescriptor]) -> String {
        let mut prompt = String::from(
            "You are a routing supervisor for an analytics assistant. \
             Route each user query to the single most appropriate agent.\n\nAvailable agents:\n",
        );
        for d in candidates {
            prompt.push_str(&format!("- {}: {}", d.id, d.description));
            if !d.keywords.is_empty() {
                prompt.push_str(&format!(" (triggers: {})", d.keywords.join(", ")));
            }
            if d.requires_files {
                prompt.push_str(" [requires an uploaded data file]");
            }
            prompt.push('\n');
        }
        prompt.push_str("\nRespond with ONLY the agent id.");
        prompt
    }

    fn user_prompt(query: &str, context: &RequestContext) -> String {
        let mut prompt = format!(
            "User query: \"{query}\"\n\nUploaded files: {} file(s)\n",
            context.file_refs.len()
        );
        if !context.attributes.is_empty() {
            prompt.push_str(&format!(
                "\nContext: {}\n",
                serde_json::Value::Object(context.attributes.clone())
            ));
        }
        prompt.push_str("\nWhich agent should handle this?");
        prompt
    }
}

#[async_trait]
impl Reasoner for HttpReasoner {
    fn name(&self) -> &str {
        "http"
    }

    async fn route(
        &self,
        query: &str,
        context: &RequestContext,
        candidates: &[&AgentDescriptor],
        seed: u64,
    ) -> StewardResult<String> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "model": self.config.model,
            "temperature": 0,
            "seed": seed,
            "max_tokens": 32,
            "messages": [
                {"role": "system", "content": Self::system_prompt(candidates)},
                {"role": "user", "content": Self::user_prompt(query, context)},
            ],
        });

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let resp = request
            .send()
            .await
            .map_err(|e| StewardError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| StewardError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(StewardError::Http(format!(
                "Reasoner API error {status}: {resp_body}"
            )));
        }

        resp_body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| StewardError::Http("Reasoner response has no message content".into()))
    }
}
