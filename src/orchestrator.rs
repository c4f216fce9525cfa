//! Orchestrator facade
//!
//! Coordinates one turn: classify -> dispatch -> compose, then append the
//! turn to session history. Turns within a session run strictly
//! sequentially under the session's lock; distinct sessions proceed
//! independently. This boundary is the last line of defense: whatever
//! happens inside a turn, the caller always receives a well-formed
//! `ComposedResponse`.

use crate::classifier::QueryClassifier;
use crate::composer::{failure_response, ResponseComposer};
use crate::config::AssistantConfig;
use crate::dispatcher::Dispatcher;
use crate::models::{ComposedResponse, Domain, Query};
use crate::session::{SessionHistory, SessionStore, TurnRecord};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct Orchestrator {
    classifier: QueryClassifier,
    dispatcher: Dispatcher,
    composer: ResponseComposer,
    sessions: SessionStore,
    turn_timeout: Duration,
    history_window: usize,
}

impl Orchestrator {
    pub fn new(
        classifier: QueryClassifier,
        dispatcher: Dispatcher,
        composer: ResponseComposer,
        config: &AssistantConfig,
    ) -> Self {
        Self {
            classifier,
            dispatcher,
            composer,
            sessions: SessionStore::new(config.max_session_turns),
            turn_timeout: config.turn_timeout,
            history_window: config.history_window,
        }
    }

    /// Process one user turn for a session.
    ///
    /// Always returns a response; a turn that exceeds the latency budget is
    /// abandoned and reported as failed rather than left pending.
    pub async fn handle_turn(
        &self,
        session_id: Uuid,
        query_text: &str,
        override_domain: Option<Domain>,
    ) -> ComposedResponse {
        let query = match override_domain {
            Some(domain) => Query::with_override(query_text, domain),
            None => Query::new(query_text),
        };

        let session = self.sessions.session(session_id).await;
        // Held for the whole turn: turns within a session never interleave.
        let mut history = session.lock().await;

        info!(
            %session_id,
            turn = history.turn_count() + 1,
            "Turn started"
        );

        let response =
            match tokio::time::timeout(self.turn_timeout, self.run_turn(&query, &history)).await {
                Ok(response) => response,
                Err(_) => {
                    warn!(
                        %session_id,
                        budget_ms = self.turn_timeout.as_millis() as u64,
                        "Turn exceeded latency budget, abandoning"
                    );
                    failure_response()
                }
            };

        history.push(TurnRecord {
            query,
            response: response.clone(),
        });

        info!(%session_id, status = ?response.status, "Turn complete");

        response
    }

    async fn run_turn(&self, query: &Query, history: &SessionHistory) -> ComposedResponse {
        let window = history.window(self.history_window);

        debug!("Classifying query");
        let decision = self.classifier.classify(query, &window).await;

        info!(
            primary = %decision.primary,
            secondary = ?decision.secondary,
            confidence = decision.confidence,
            rationale = %decision.rationale,
            "Query routed"
        );

        debug!("Dispatching to handlers");
        let results = self.dispatcher.dispatch(&decision, query, &window).await;

        debug!("Composing response");
        self.composer.compose(&results)
    }

    /// Destroy a session's conversation state.
    pub async fn end_session(&self, session_id: Uuid) -> bool {
        self.sessions.end_session(session_id).await
    }

    /// Read-only copy of a session's retained turns.
    pub async fn history(&self, session_id: Uuid) -> Option<Vec<TurnRecord>> {
        self.sessions.snapshot(session_id).await
    }
}
