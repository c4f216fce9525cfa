//! CFO Query Orchestrator
//!
//! Routes natural-language financial questions to one of three specialized
//! answer domains and stitches their results into a single response:
//! - Structured: financial metrics answered from the warehouse
//! - Retrieval: internal policy documents
//! - Web: current events and market context
//!
//! PER TURN:
//! QUERY → CLASSIFY → DISPATCH → COMPOSE → RESPONSE (+ session history)
//!
//! The domain handlers themselves are external services; this crate owns the
//! routing decision, fan-out with bounded fallback, and response composition.

pub mod api;
pub mod classifier;
pub mod composer;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod reasoning;
pub mod session;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use orchestrator::Orchestrator;
