use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Caller-supplied context for one graph run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Existing conversation, if any. A fresh id is generated otherwise.
    #[serde(default)]
    pub session_id: Option<String>,
    /// References to files uploaded with the query, in upload order.
    #[serde(default)]
    pub file_refs: Vec<String>,
    /// Already-parsed payloads keyed by file ref, handed to the agent as
    /// `loaded_file_data`.
    #[serde(default)]
    pub file_data: BTreeMap<String, serde_json::Value>,
    /// Caller identity, used by the governance policy gate.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Free-form attributes forwarded to the routing reasoner.
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl RequestContext {
    /// Empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue `session_id`.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach uploaded file references.
    pub fn with_files<I, S>(mut self, file_refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_refs = file_refs.into_iter().map(Into::into).collect();
        self
    }

    /// Attach the loaded contents of `file_ref`.
    pub fn with_file_data(mut self, file_ref: impl Into<String>, payload: serde_json::Value) -> Self {
        self.file_data.insert(file_ref.into(), payload);
        self
    }

    /// Requesting user.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Extra attribute passed through to agents.
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}
