//! Query classifier
//!
//! Produces one routing decision per query: a primary domain, optional
//! secondary domains for multi-part queries, and a confidence score.
//! An explicit caller override skips classification entirely. Every failure
//! mode collapses to the documented default domain; classification never
//! blocks a turn.

use crate::error::OrchestratorError;
use crate::models::{Domain, Query, RoutingDecision};
use crate::reasoning::ReasoningService;
use crate::session::ConversationWindow;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Coverage description for each domain, given to the reasoning service.
const DOMAIN_GUIDE: &str = r#"1. structured - Questions about financial data, metrics, company performance, numbers
   Examples:
   - "Show me top 5 companies by revenue"
   - "What is the average profit margin?"
   - "Which companies have debt-to-equity ratio above 2?"

2. retrieval - Questions about internal policies, procedures, guidelines, approval processes
   Examples:
   - "What's the approval process for expenses over $10,000?"
   - "How should we recognize revenue from subscriptions?"
   - "What's our travel policy?"

3. web - Questions about current events, market trends, external information, competitors
   Examples:
   - "What are current market trends?"
   - "Latest news about inflation"
   - "Recent regulatory changes""#;

/// Routes queries to domains via one reasoning call per turn.
pub struct QueryClassifier {
    reasoning: Arc<dyn ReasoningService>,
    confidence_threshold: f32,
}

impl QueryClassifier {
    pub fn new(reasoning: Arc<dyn ReasoningService>, confidence_threshold: f32) -> Self {
        Self {
            reasoning,
            confidence_threshold,
        }
    }

    /// Classify one query against a bounded window of recent history.
    ///
    /// Infallible: reasoning errors, malformed replies, and low-confidence
    /// replies all resolve to the structured-query default.
    pub async fn classify(&self, query: &Query, history: &ConversationWindow) -> RoutingDecision {
        if let Some(domain) = query.override_domain {
            debug!(%domain, "Classification skipped: explicit override");
            return RoutingDecision::overridden(domain);
        }

        let prompt = build_prompt(&query.text, history);

        let raw = match self.reasoning.complete(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                let failure = OrchestratorError::ClassificationFailure(e.to_string());
                warn!("{}; applying default-domain policy", failure);
                return RoutingDecision::default_domain(format!("default after {}", failure));
            }
        };

        match parse_decision(&raw) {
            Some(decision) if decision.confidence >= self.confidence_threshold => {
                debug!(
                    primary = %decision.primary,
                    secondary = ?decision.secondary,
                    confidence = decision.confidence,
                    "Query classified"
                );
                decision
            }
            Some(decision) => {
                warn!(
                    confidence = decision.confidence,
                    threshold = self.confidence_threshold,
                    "Classifier confidence below threshold, applying default-domain policy"
                );
                RoutingDecision::default_domain(format!(
                    "default after low-confidence reply ({:.2})",
                    decision.confidence
                ))
            }
            None => {
                warn!(reply = %raw, "Unparseable routing reply, applying default-domain policy");
                RoutingDecision::default_domain("default after unparseable routing reply")
            }
        }
    }
}

fn build_prompt(query_text: &str, history: &ConversationWindow) -> String {
    let mut prompt = String::with_capacity(1024);

    prompt.push_str(
        "You are a query routing system for a CFO assistant. \
         Classify the user's query into the categories below.\n\n",
    );
    prompt.push_str(DOMAIN_GUIDE);
    prompt.push_str("\n\n");

    if !history.is_empty() {
        prompt.push_str("Recent conversation (for resolving follow-up questions):\n");
        for exchange in &history.exchanges {
            prompt.push_str(&format!(
                "- User: {}\n- Assistant: {}\n",
                exchange.question, exchange.answer
            ));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!("User Query: {}\n\n", query_text));
    prompt.push_str(
        "Respond with JSON only: {\"primary\": \"structured|retrieval|web\", \
         \"secondary\": [], \"confidence\": 0.0-1.0, \"rationale\": \"...\"}. \
         List secondary domains only when the query contains independent \
         sub-questions spanning domains.",
    );

    prompt
}

#[derive(Debug, Deserialize)]
struct WireDecision {
    primary: String,
    #[serde(default)]
    secondary: Vec<String>,
    confidence: Option<f32>,
    rationale: Option<String>,
}

/// Parse a reasoning reply into a decision.
///
/// Accepts a JSON object (optionally wrapped in a markdown fence) or a bare
/// domain label.
fn parse_decision(raw: &str) -> Option<RoutingDecision> {
    if let Some(wire) = extract_json(raw) {
        let primary = Domain::from_str(&wire.primary).ok()?;

        let mut secondary = Vec::new();
        for name in &wire.secondary {
            match Domain::from_str(name) {
                Ok(domain) if domain != primary && !secondary.contains(&domain) => {
                    secondary.push(domain)
                }
                Ok(_) => {}
                Err(e) => warn!("Dropping unknown secondary domain: {}", e),
            }
        }

        return Some(RoutingDecision {
            primary,
            secondary,
            confidence: wire.confidence.unwrap_or(1.0).clamp(0.0, 1.0),
            rationale: wire
                .rationale
                .unwrap_or_else(|| "reasoning service decision".to_string()),
        });
    }

    // Bare label fallback ("SQL", "RAG", "WEB"): no confidence attached, so
    // score it just below a full JSON decision. Only a single-token reply
    // qualifies; anything wordier is unparseable.
    let label = raw.trim();
    if label.split_whitespace().count() != 1 {
        return None;
    }
    let primary = Domain::from_str(label).ok()?;
    Some(RoutingDecision {
        primary,
        secondary: Vec::new(),
        confidence: 0.9,
        rationale: "label-only routing reply".to_string(),
    })
}

/// Pull a JSON object out of the reply, tolerating ```json fences and
/// surrounding prose.
fn extract_json(raw: &str) -> Option<WireDecision> {
    let trimmed = raw.trim();

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            if let Ok(wire) = serde_json::from_str(after[..end].trim()) {
                return Some(wire);
            }
        }
    }

    let brace_start = trimmed.find('{')?;
    let brace_end = trimmed.rfind('}')?;
    if brace_end <= brace_start {
        return None;
    }
    serde_json::from_str(&trimmed[brace_start..=brace_end]).ok()
}
