//! Data types that flow between the search backend, the webhook, and callers.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One retrieved passage from the document-search backend.
///
/// Recognized metadata keys are `page` (integer), `type` (`"text"` or
/// `"image"`) and `image_id`. Everything else is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Hit {
    pub fn page(&self) -> Option<i64> {
        self.metadata.get("page").and_then(|p| p.as_i64())
    }

    /// Hits without a `type` are text.
    pub fn is_image(&self) -> bool {
        self.metadata.get("type").and_then(|t| t.as_str()) == Some("image")
    }

    pub fn image_id(&self) -> Option<&str> {
        self.metadata.get("image_id").and_then(|i| i.as_str())
    }
}

/// Body of `GET {api_url}/search_lc`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: Vec<Hit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_paths: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Retrieved context forwarded to the webhook as `rag_context`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchContext {
    pub query: String,
    pub hits: Vec<Hit>,
    pub total_results: usize,
}

impl SearchContext {
    pub fn new(query: impl Into<String>, hits: Vec<Hit>) -> Self {
        let total_results = hits.len();
        Self {
            query: query.into(),
            hits,
            total_results,
        }
    }

    pub fn empty(query: impl Into<String>) -> Self {
        Self::new(query, Vec::new())
    }

    pub fn from_response(query: &str, response: &SearchResponse) -> Self {
        Self::new(query, response.hits.clone())
    }
}

/// JSON body of the initial webhook POST.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookRequestPayload {
    pub event: &'static str,
    pub message: String,
    pub timestamp: String,
    pub session_id: String,
    pub rag_context: SearchContext,
}

impl WebhookRequestPayload {
    pub fn new(query: &str, context: SearchContext) -> Self {
        let now = Utc::now();
        Self {
            event: "chat_message",
            message: query.to_string(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            session_id: new_session_id_at(now),
            rag_context: context,
        }
    }
}

/// Bookkeeping for one coordinator call. Never persisted.
#[derive(Debug, Clone)]
pub struct PollState {
    pub session_id: String,
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
}

impl PollState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            attempt: 0,
            started_at: Utc::now(),
        }
    }
}

/// `extension_<epoch-ms>_<suffix>`, the suffix being 12 random hex digits.
pub fn new_session_id() -> String {
    new_session_id_at(Utc::now())
}

fn new_session_id_at(now: DateTime<Utc>) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("extension_{}_{}", now.timestamp_millis(), &random[..12])
}
