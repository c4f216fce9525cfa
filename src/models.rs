//! Core data models for the query orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

//
// ================= Domains =================
//

/// The three specialized answer sources a query can be routed to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Financial metrics and company data answered from the warehouse.
    Structured,
    /// Internal policy and procedure documents answered via retrieval.
    Retrieval,
    /// Current events and market context answered via web search.
    Web,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Structured, Domain::Retrieval, Domain::Web];

    /// Human-readable provenance label shown to the end user.
    pub fn label(&self) -> &'static str {
        match self {
            Domain::Structured => "SQL Database",
            Domain::Retrieval => "Policy Documents (RAG)",
            Domain::Web => "Web Search",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Domain::Structured => "structured",
            Domain::Retrieval => "retrieval",
            Domain::Web => "web",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Domain {
    type Err = String;

    /// Accepts the canonical names plus the short aliases the UI exposes
    /// for forced routing (`sql`, `rag`, `web`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "structured" | "structured-query" | "sql" | "database" => Ok(Domain::Structured),
            "retrieval" | "rag" | "docs" | "documents" | "policy" => Ok(Domain::Retrieval),
            "web" | "search" | "web-search" | "internet" => Ok(Domain::Web),
            other => Err(format!("unknown domain: {}", other)),
        }
    }
}

//
// ================= Query =================
//

/// One user turn. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub asked_at: DateTime<Utc>,
    /// Explicit routing override from the caller; bypasses classification.
    pub override_domain: Option<Domain>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            asked_at: Utc::now(),
            override_domain: None,
        }
    }

    pub fn with_override(text: impl Into<String>, domain: Domain) -> Self {
        Self {
            text: text.into(),
            asked_at: Utc::now(),
            override_domain: Some(domain),
        }
    }
}

//
// ================= Routing =================
//

/// Output of the classifier, consumed immediately by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub primary: Domain,
    /// Additional domains for multi-part queries, in dispatch order.
    pub secondary: Vec<Domain>,
    /// Confidence in [0, 1].
    pub confidence: f32,
    pub rationale: String,
}

impl RoutingDecision {
    /// Decision produced by an explicit caller override.
    pub fn overridden(domain: Domain) -> Self {
        Self {
            primary: domain,
            secondary: Vec::new(),
            confidence: 1.0,
            rationale: "explicit override".to_string(),
        }
    }

    /// Deterministic default used whenever classification cannot produce a
    /// confident single domain. Financial-metric questions dominate traffic,
    /// so the structured-query domain is the documented default.
    pub fn default_domain(reason: impl Into<String>) -> Self {
        Self {
            primary: Domain::Structured,
            secondary: Vec::new(),
            confidence: 0.0,
            rationale: reason.into(),
        }
    }
}

//
// ================= Handler results =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HandlerStatus {
    Ok,
    /// The handler explicitly signals it cannot answer (e.g. retrieval found
    /// nothing above its similarity threshold).
    NoAnswer,
    Error,
}

/// A single source reference attached to a handler answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// Document name, executed query string, or URL.
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    pub domain: Domain,
}

impl Citation {
    pub fn new(domain: Domain, source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            snippet: None,
            domain,
        }
    }

    /// Uniqueness key used for de-duplication across handler results.
    pub fn key(&self) -> (Domain, &str) {
        (self.domain, self.source.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Table,
    Chart,
}

/// Structured payload (table rows, chart spec) passed through to the caller
/// untouched. The orchestrator never interprets `data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredPayload {
    pub kind: PayloadKind,
    pub data: serde_json::Value,
    pub domain: Domain,
}

/// Typed result returned by one domain handler for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerResult {
    pub status: HandlerStatus,
    pub answer: String,
    pub citations: Vec<Citation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<StructuredPayload>,
    pub domain: Domain,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl HandlerResult {
    pub fn ok(domain: Domain, answer: impl Into<String>) -> Self {
        Self {
            status: HandlerStatus::Ok,
            answer: answer.into(),
            citations: Vec::new(),
            payload: None,
            domain,
            latency_ms: 0,
            error_detail: None,
        }
    }

    pub fn no_answer(domain: Domain) -> Self {
        Self {
            status: HandlerStatus::NoAnswer,
            answer: String::new(),
            citations: Vec::new(),
            payload: None,
            domain,
            latency_ms: 0,
            error_detail: None,
        }
    }

    pub fn error(domain: Domain, detail: impl Into<String>) -> Self {
        Self {
            status: HandlerStatus::Error,
            answer: String::new(),
            citations: Vec::new(),
            payload: None,
            domain,
            latency_ms: 0,
            error_detail: Some(detail.into()),
        }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }
}

//
// ================= Composed response =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Answered,
    Partial,
    Failed,
}

/// The unified, source-attributed answer returned to the caller for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposedResponse {
    pub answer: String,
    /// Merged citations: primary domain's first, then secondaries', deduped.
    pub citations: Vec<Citation>,
    /// Structured payloads in domain order, untouched.
    pub payloads: Vec<StructuredPayload>,
    /// Domains that contributed a successful answer.
    pub contributors: Vec<Domain>,
    pub status: ResponseStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_aliases() {
        assert_eq!("sql".parse::<Domain>().unwrap(), Domain::Structured);
        assert_eq!("SQL".parse::<Domain>().unwrap(), Domain::Structured);
        assert_eq!("rag".parse::<Domain>().unwrap(), Domain::Retrieval);
        assert_eq!("docs".parse::<Domain>().unwrap(), Domain::Retrieval);
        assert_eq!("web".parse::<Domain>().unwrap(), Domain::Web);
        assert_eq!("search".parse::<Domain>().unwrap(), Domain::Web);
        assert!("chart".parse::<Domain>().is_err());
    }

    #[test]
    fn test_override_decision() {
        let decision = RoutingDecision::overridden(Domain::Web);
        assert_eq!(decision.primary, Domain::Web);
        assert!(decision.secondary.is_empty());
        assert_eq!(decision.confidence, 1.0);
        assert_eq!(decision.rationale, "explicit override");
    }

    #[test]
    fn test_default_decision_is_structured() {
        let decision = RoutingDecision::default_domain("reasoning call failed");
        assert_eq!(decision.primary, Domain::Structured);
        assert_eq!(decision.confidence, 0.0);
    }

    #[test]
    fn test_citation_key() {
        let a = Citation::new(Domain::Retrieval, "expense_policy.txt");
        let b = Citation::new(Domain::Web, "expense_policy.txt");
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn test_handler_status_serialization() {
        let json = serde_json::to_string(&HandlerStatus::NoAnswer).unwrap();
        assert_eq!(json, "\"no_answer\"");
    }
}
