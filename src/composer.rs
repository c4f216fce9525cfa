//! Response composer
//!
//! Merges one or more handler results into a single source-attributed
//! response. Supplementary answers stay in labeled sections so the caller
//! can always see which subsystem answered which part.

use crate::models::{
    ComposedResponse, Domain, HandlerResult, HandlerStatus, ResponseStatus,
};
use std::collections::HashSet;
use tracing::debug;

/// Deterministic message returned when no subsystem could answer.
pub const ALL_DOMAINS_FAILED: &str = "I wasn't able to answer this question. \
The financial database, the policy documents, and web search all came up \
empty or unavailable. Please try rephrasing, or ask again later.";

pub struct ResponseComposer;

impl ResponseComposer {
    pub fn new() -> Self {
        Self
    }

    /// Merge handler results in their given order (primary first).
    pub fn compose(&self, results: &[HandlerResult]) -> ComposedResponse {
        let primary_ok = results
            .first()
            .map(|r| r.status == HandlerStatus::Ok)
            .unwrap_or(false);
        let any_ok = results.iter().any(|r| r.status == HandlerStatus::Ok);

        let status = if primary_ok {
            ResponseStatus::Answered
        } else if any_ok {
            ResponseStatus::Partial
        } else {
            ResponseStatus::Failed
        };

        if status == ResponseStatus::Failed {
            debug!(result_count = results.len(), "All handlers failed");
            return failure_response();
        }

        let mut answer = String::new();
        let mut contributors = Vec::new();

        for (i, result) in results.iter().enumerate() {
            if result.status != HandlerStatus::Ok {
                continue;
            }

            contributors.push(result.domain);

            if i == 0 {
                // Primary answer seeds the response unlabeled.
                answer.push_str(&result.answer);
            } else {
                if !answer.is_empty() {
                    answer.push_str("\n\n");
                }
                answer.push_str(&format!(
                    "--- Additional findings ({}) ---\n{}",
                    result.domain.label(),
                    result.answer
                ));
            }
        }

        ComposedResponse {
            answer,
            citations: merge_citations(results),
            payloads: results.iter().filter_map(|r| r.payload.clone()).collect(),
            contributors,
            status,
        }
    }
}

impl Default for ResponseComposer {
    fn default() -> Self {
        Self::new()
    }
}

/// The well-formed response for total failure, also used when a turn is
/// abandoned at the orchestrator boundary.
pub fn failure_response() -> ComposedResponse {
    ComposedResponse {
        answer: ALL_DOMAINS_FAILED.to_string(),
        citations: Vec::new(),
        payloads: Vec::new(),
        contributors: Vec::new(),
        status: ResponseStatus::Failed,
    }
}

/// Concatenate citations in result order, dropping duplicate
/// (domain, source) pairs while preserving first occurrence.
fn merge_citations(results: &[HandlerResult]) -> Vec<crate::models::Citation> {
    let mut seen: HashSet<(Domain, String)> = HashSet::new();
    let mut merged = Vec::new();

    for result in results {
        for citation in &result.citations {
            if seen.insert((citation.domain, citation.source.clone())) {
                merged.push(citation.clone());
            }
        }
    }

    merged
}
