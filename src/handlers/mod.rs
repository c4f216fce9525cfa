//! Domain handler contract and registry
//!
//! The three domain handlers are thin clients over external answer services.
//! All decision logic lives in the classifier and dispatcher; a handler only
//! ships the query (plus conversation context) to its backend and decodes
//! the typed result.

use crate::error::OrchestratorError;
use crate::models::{
    Citation, Domain, HandlerResult, HandlerStatus, PayloadKind, StructuredPayload,
};
use crate::session::ConversationWindow;
use crate::Result;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Trait implemented by each domain's answer source.
#[async_trait::async_trait]
pub trait DomainHandler: Send + Sync {
    fn domain(&self) -> Domain;
    fn describe(&self) -> &'static str;
    async fn answer(
        &self,
        query_text: &str,
        context: &ConversationWindow,
    ) -> Result<HandlerResult>;
}

/// Handler registry keyed by domain tag.
pub struct HandlerRegistry {
    handlers: HashMap<Domain, Arc<dyn DomainHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, handler: Arc<dyn DomainHandler>) {
        self.handlers.insert(handler.domain(), handler);
    }

    pub fn get(&self, domain: Domain) -> Option<Arc<dyn DomainHandler>> {
        self.handlers.get(&domain).cloned()
    }

    pub fn domains(&self) -> Vec<Domain> {
        self.handlers.keys().copied().collect()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//
// ================= HTTP-backed handlers =================
//

#[derive(Clone)]
struct AnswerApiClient {
    client: Client,
    base_url: String,
}

impl AnswerApiClient {
    fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn from_env() -> Option<Self> {
        let base_url = env::var("HANDLER_API_BASE_URL").ok()?;
        Some(Self::new(&base_url))
    }

    async fn post_answer(
        &self,
        domain: Domain,
        path: &str,
        query_text: &str,
        context: &ConversationWindow,
    ) -> Result<HandlerResult> {
        let url = format!("{}{}", self.base_url, path);
        let started = Instant::now();

        let response = self
            .client
            .post(url)
            .json(&json!({
                "query": query_text,
                "context": context,
            }))
            .send()
            .await
            .map_err(|e| OrchestratorError::HandlerError {
                domain,
                detail: format!("request to {} failed: {}", path, e),
            })?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| OrchestratorError::HandlerError {
                domain,
                detail: format!("invalid JSON response: {}", e),
            })?;

        if !status.is_success() {
            return Err(OrchestratorError::HandlerError {
                domain,
                detail: format!("backend returned {} for {}: {}", status, path, body),
            });
        }

        let wire: WireAnswer =
            serde_json::from_value(body).map_err(|e| OrchestratorError::HandlerError {
                domain,
                detail: format!("malformed answer payload: {}", e),
            })?;

        Ok(wire.into_result(domain, started.elapsed().as_millis() as u64))
    }
}

/// Wire shape of the shared handler contract.
#[derive(Debug, Deserialize)]
struct WireAnswer {
    status: String,
    #[serde(default)]
    answer_text: String,
    #[serde(default)]
    citations: Vec<WireCitation>,
    payload: Option<WirePayload>,
    error_detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireCitation {
    source: String,
    snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WirePayload {
    #[serde(rename = "type")]
    kind: PayloadKind,
    data: Value,
}

impl WireAnswer {
    fn into_result(self, domain: Domain, latency_ms: u64) -> HandlerResult {
        let status = match self.status.as_str() {
            "ok" => HandlerStatus::Ok,
            "no_answer" => HandlerStatus::NoAnswer,
            _ => HandlerStatus::Error,
        };

        HandlerResult {
            status,
            answer: self.answer_text,
            citations: self
                .citations
                .into_iter()
                .map(|c| Citation {
                    source: c.source,
                    snippet: c.snippet,
                    domain,
                })
                .collect(),
            payload: self.payload.map(|p| StructuredPayload {
                kind: p.kind,
                data: p.data,
                domain,
            }),
            domain,
            latency_ms,
            error_detail: match status {
                HandlerStatus::Error => Some(
                    self.error_detail
                        .unwrap_or_else(|| "backend reported an error".to_string()),
                ),
                _ => None,
            },
        }
    }
}

/// HTTP-backed domain handler, parameterized by domain and endpoint.
pub struct HttpAnswerHandler {
    domain: Domain,
    path: &'static str,
    description: &'static str,
    api: Option<AnswerApiClient>,
}

impl HttpAnswerHandler {
    fn new(domain: Domain, path: &'static str, description: &'static str) -> Self {
        Self {
            domain,
            path,
            description,
            api: AnswerApiClient::from_env(),
        }
    }

    /// Text-to-SQL answer service over the financial warehouse.
    pub fn structured_query() -> Self {
        Self::new(
            Domain::Structured,
            "/api/v1/sql/answer",
            "Answer financial-metric questions from the warehouse via text-to-SQL",
        )
    }

    /// Semantic retrieval over the internal policy corpus.
    pub fn document_retrieval() -> Self {
        Self::new(
            Domain::Retrieval,
            "/api/v1/retrieval/answer",
            "Answer policy questions from the internal document corpus",
        )
    }

    /// Web search plus summarization for external context.
    pub fn web_search() -> Self {
        Self::new(
            Domain::Web,
            "/api/v1/search/answer",
            "Answer current-events questions via web search",
        )
    }
}

#[async_trait::async_trait]
impl DomainHandler for HttpAnswerHandler {
    fn domain(&self) -> Domain {
        self.domain
    }

    fn describe(&self) -> &'static str {
        self.description
    }

    async fn answer(
        &self,
        query_text: &str,
        context: &ConversationWindow,
    ) -> Result<HandlerResult> {
        let api = self
            .api
            .as_ref()
            .ok_or_else(|| OrchestratorError::HandlerError {
                domain: self.domain,
                detail: "HANDLER_API_BASE_URL is not configured".to_string(),
            })?;

        api.post_answer(self.domain, self.path, query_text, context)
            .await
    }
}

/// Canned handler for demos and offline development.
/// Always answers successfully with a fixed response.
pub struct StaticHandler {
    domain: Domain,
    answer: String,
    payload: Option<StructuredPayload>,
}

impl StaticHandler {
    pub fn new(domain: Domain, answer: impl Into<String>) -> Self {
        Self {
            domain,
            answer: answer.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, kind: PayloadKind, data: Value) -> Self {
        self.payload = Some(StructuredPayload {
            kind,
            data,
            domain: self.domain,
        });
        self
    }
}

#[async_trait::async_trait]
impl DomainHandler for StaticHandler {
    fn domain(&self) -> Domain {
        self.domain
    }

    fn describe(&self) -> &'static str {
        "Canned answers for offline development"
    }

    async fn answer(
        &self,
        query_text: &str,
        _context: &ConversationWindow,
    ) -> Result<HandlerResult> {
        let mut result = HandlerResult::ok(self.domain, self.answer.clone());
        result.citations.push(Citation::new(
            self.domain,
            format!("static:{}", query_text),
        ));
        result.payload = self.payload.clone();
        Ok(result)
    }
}

/// Create the production registry with the three HTTP-backed handlers.
pub fn create_default_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    registry.register(Arc::new(HttpAnswerHandler::structured_query()));
    registry.register(Arc::new(HttpAnswerHandler::document_retrieval()));
    registry.register(Arc::new(HttpAnswerHandler::web_search()));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_holds_all_domains() {
        let registry = create_default_registry();
        for domain in Domain::ALL {
            assert!(registry.get(domain).is_some(), "missing {}", domain);
        }
    }

    #[test]
    fn test_wire_answer_decodes_ok_with_table() {
        let raw = r#"{
            "status": "ok",
            "answer_text": "The top company by revenue is Acme Corp.",
            "citations": [{"source": "SELECT name, revenue FROM companies ORDER BY revenue DESC LIMIT 10"}],
            "payload": {"type": "table", "data": {"columns": ["name", "revenue"], "rows": [["Acme Corp", 120.5]]}}
        }"#;

        let wire: WireAnswer = serde_json::from_str(raw).unwrap();
        let result = wire.into_result(Domain::Structured, 42);

        assert_eq!(result.status, HandlerStatus::Ok);
        assert_eq!(result.domain, Domain::Structured);
        assert_eq!(result.latency_ms, 42);
        assert_eq!(result.citations.len(), 1);
        assert_eq!(result.citations[0].domain, Domain::Structured);
        let payload = result.payload.unwrap();
        assert_eq!(payload.kind, PayloadKind::Table);
    }

    #[test]
    fn test_wire_answer_decodes_no_answer() {
        let raw = r#"{"status": "no_answer"}"#;
        let wire: WireAnswer = serde_json::from_str(raw).unwrap();
        let result = wire.into_result(Domain::Retrieval, 10);

        assert_eq!(result.status, HandlerStatus::NoAnswer);
        assert!(result.answer.is_empty());
        assert!(result.error_detail.is_none());
    }

    #[test]
    fn test_wire_answer_unknown_status_is_error() {
        let raw = r#"{"status": "exploded", "error_detail": "backend on fire"}"#;
        let wire: WireAnswer = serde_json::from_str(raw).unwrap();
        let result = wire.into_result(Domain::Web, 5);

        assert_eq!(result.status, HandlerStatus::Error);
        assert_eq!(result.error_detail.as_deref(), Some("backend on fire"));
    }

    #[tokio::test]
    async fn test_static_handler_cites_its_query() {
        let handler = StaticHandler::new(Domain::Web, "GAAP changed in 2024.");
        let result = handler
            .answer("recent GAAP changes", &ConversationWindow::empty())
            .await
            .unwrap();

        assert_eq!(result.status, HandlerStatus::Ok);
        assert!(result.citations[0].source.contains("recent GAAP changes"));
    }
}
