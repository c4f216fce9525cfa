//! Dispatcher: turns a routing decision into handler results
//!
//! The primary handler runs first under its own timeout. Secondary handlers
//! run concurrently but results are collected in the decision's listed
//! order, so concurrency never affects output ordering. The only permitted
//! retry is one web-search fallback when the primary explicitly cannot
//! answer and no secondaries were listed.

use crate::handlers::{DomainHandler, HandlerRegistry};
use crate::models::{Domain, HandlerResult, HandlerStatus, Query, RoutingDecision};
use crate::session::ConversationWindow;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct Dispatcher {
    registry: HandlerRegistry,
    handler_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: HandlerRegistry, handler_timeout: Duration) -> Self {
        Self {
            registry,
            handler_timeout,
        }
    }

    /// Invoke the decided handler(s) and return their results in
    /// deterministic order: primary, then fallback (if taken), then
    /// secondaries in listed order. Failures never propagate; every slot
    /// yields a `HandlerResult`.
    pub async fn dispatch(
        &self,
        decision: &RoutingDecision,
        query: &Query,
        context: &ConversationWindow,
    ) -> Vec<HandlerResult> {
        let mut results = Vec::with_capacity(2 + decision.secondary.len());

        let primary = invoke(
            self.registry.get(decision.primary),
            decision.primary,
            self.handler_timeout,
            query.text.clone(),
            context.clone(),
        )
        .await;

        let needs_fallback = primary.status == HandlerStatus::NoAnswer
            && decision.secondary.is_empty()
            && decision.primary != Domain::Web;
        results.push(primary);

        // At most one fallback per turn. Retrying web against itself is
        // pointless, hence the primary != Web guard above.
        if needs_fallback {
            info!(
                primary = %decision.primary,
                "Primary handler cannot answer, falling back to web search"
            );
            results.push(
                invoke(
                    self.registry.get(Domain::Web),
                    Domain::Web,
                    self.handler_timeout,
                    query.text.clone(),
                    context.clone(),
                )
                .await,
            );
        }

        if !decision.secondary.is_empty() {
            let handles: Vec<_> = decision
                .secondary
                .iter()
                .map(|&domain| {
                    let handler = self.registry.get(domain);
                    let timeout = self.handler_timeout;
                    let text = query.text.clone();
                    let window = context.clone();
                    tokio::spawn(async move { invoke(handler, domain, timeout, text, window).await })
                })
                .collect();

            // Collection order follows the decision, not completion order.
            for (domain, handle) in decision.secondary.iter().zip(handles) {
                match handle.await {
                    Ok(result) => results.push(result),
                    Err(e) => {
                        warn!(%domain, "Secondary handler task failed: {}", e);
                        results.push(HandlerResult::error(*domain, "handler task failed"));
                    }
                }
            }
        }

        debug!(
            result_count = results.len(),
            "Dispatch complete"
        );

        results
    }
}

/// Run one handler call under a timeout, converting every failure mode into
/// an error-status result.
async fn invoke(
    handler: Option<Arc<dyn DomainHandler>>,
    domain: Domain,
    timeout: Duration,
    query_text: String,
    context: ConversationWindow,
) -> HandlerResult {
    let Some(handler) = handler else {
        warn!(%domain, "No handler registered");
        return HandlerResult::error(domain, "no handler registered for domain");
    };

    let started = Instant::now();

    match tokio::time::timeout(timeout, handler.answer(&query_text, &context)).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            warn!(%domain, error = %e, "Handler call failed");
            HandlerResult::error(domain, e.to_string())
                .with_latency(started.elapsed().as_millis() as u64)
        }
        Err(_) => {
            let waited_ms = started.elapsed().as_millis() as u64;
            let timeout_err = crate::error::OrchestratorError::HandlerTimeout { domain, waited_ms };
            warn!(%domain, waited_ms, "Handler call timed out");
            HandlerResult::error(domain, timeout_err.to_string()).with_latency(waited_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::StaticHandler;
    use crate::session::ConversationWindow;
    use crate::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted handler: fixed status, optional delay, call counting.
    struct ScriptedHandler {
        domain: Domain,
        status: HandlerStatus,
        delay: Option<Duration>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedHandler {
        fn new(domain: Domain, status: HandlerStatus) -> Self {
            Self {
                domain,
                status,
                delay: None,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn counter(&self) -> Arc<AtomicUsize> {
            self.calls.clone()
        }
    }

    #[async_trait::async_trait]
    impl DomainHandler for ScriptedHandler {
        fn domain(&self) -> Domain {
            self.domain
        }

        fn describe(&self) -> &'static str {
            "scripted"
        }

        async fn answer(
            &self,
            _query_text: &str,
            _context: &ConversationWindow,
        ) -> Result<HandlerResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(match self.status {
                HandlerStatus::Ok => HandlerResult::ok(self.domain, "scripted answer"),
                HandlerStatus::NoAnswer => HandlerResult::no_answer(self.domain),
                HandlerStatus::Error => HandlerResult::error(self.domain, "scripted failure"),
            })
        }
    }

    fn dispatcher_with(handlers: Vec<Arc<dyn DomainHandler>>) -> Dispatcher {
        let mut registry = HandlerRegistry::new();
        for handler in handlers {
            registry.register(handler);
        }
        Dispatcher::new(registry, Duration::from_millis(200))
    }

    fn decision(primary: Domain, secondary: Vec<Domain>) -> RoutingDecision {
        RoutingDecision {
            primary,
            secondary,
            confidence: 0.9,
            rationale: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_no_answer_triggers_exactly_one_web_fallback() {
        let web = ScriptedHandler::new(Domain::Web, HandlerStatus::Ok);
        let web_calls = web.counter();

        let dispatcher = dispatcher_with(vec![
            Arc::new(ScriptedHandler::new(Domain::Retrieval, HandlerStatus::NoAnswer)),
            Arc::new(web),
        ]);

        let results = dispatcher
            .dispatch(
                &decision(Domain::Retrieval, vec![]),
                &Query::new("out-of-corpus policy question"),
                &ConversationWindow::empty(),
            )
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].domain, Domain::Retrieval);
        assert_eq!(results[0].status, HandlerStatus::NoAnswer);
        assert_eq!(results[1].domain, Domain::Web);
        assert_eq!(results[1].status, HandlerStatus::Ok);
        assert_eq!(web_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_fallback_when_secondaries_listed() {
        let web = ScriptedHandler::new(Domain::Web, HandlerStatus::Ok);
        let web_calls = web.counter();

        let dispatcher = dispatcher_with(vec![
            Arc::new(ScriptedHandler::new(Domain::Structured, HandlerStatus::NoAnswer)),
            Arc::new(ScriptedHandler::new(Domain::Retrieval, HandlerStatus::Ok)),
            Arc::new(web),
        ]);

        let results = dispatcher
            .dispatch(
                &decision(Domain::Structured, vec![Domain::Retrieval]),
                &Query::new("revenue trend and travel policy"),
                &ConversationWindow::empty(),
            )
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[1].domain, Domain::Retrieval);
        assert_eq!(web_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_fallback_when_web_is_primary() {
        let web = ScriptedHandler::new(Domain::Web, HandlerStatus::NoAnswer);
        let web_calls = web.counter();
        let dispatcher = dispatcher_with(vec![Arc::new(web)]);

        let results = dispatcher
            .dispatch(
                &decision(Domain::Web, vec![]),
                &Query::new("anything recent?"),
                &ConversationWindow::empty(),
            )
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(web_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_becomes_error_result() {
        let dispatcher = dispatcher_with(vec![Arc::new(
            ScriptedHandler::new(Domain::Structured, HandlerStatus::Ok)
                .slow(Duration::from_secs(5)),
        )]);

        let results = dispatcher
            .dispatch(
                &decision(Domain::Structured, vec![]),
                &Query::new("slow query"),
                &ConversationWindow::empty(),
            )
            .await;

        assert_eq!(results[0].status, HandlerStatus::Error);
        assert!(results[0]
            .error_detail
            .as_deref()
            .unwrap()
            .contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_handler_becomes_error_result() {
        let dispatcher = dispatcher_with(vec![]);

        let results = dispatcher
            .dispatch(
                &decision(Domain::Retrieval, vec![]),
                &Query::new("policy question"),
                &ConversationWindow::empty(),
            )
            .await;

        // an unregistered handler is an error, not a no_answer, so the
        // fallback never fires
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, HandlerStatus::Error);
    }

    #[tokio::test]
    async fn test_secondary_failure_does_not_cancel_others() {
        let dispatcher = dispatcher_with(vec![
            Arc::new(ScriptedHandler::new(Domain::Structured, HandlerStatus::Ok)),
            Arc::new(ScriptedHandler::new(Domain::Retrieval, HandlerStatus::Error)),
            Arc::new(ScriptedHandler::new(Domain::Web, HandlerStatus::Ok)),
        ]);

        let results = dispatcher
            .dispatch(
                &decision(Domain::Structured, vec![Domain::Retrieval, Domain::Web]),
                &Query::new("three-part question"),
                &ConversationWindow::empty(),
            )
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, HandlerStatus::Ok);
        assert_eq!(results[1].status, HandlerStatus::Error);
        assert_eq!(results[2].status, HandlerStatus::Ok);
        // deterministic ordering regardless of completion times
        assert_eq!(results[1].domain, Domain::Retrieval);
        assert_eq!(results[2].domain, Domain::Web);
    }

    #[tokio::test]
    async fn test_static_handler_round_trip() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(StaticHandler::new(
            Domain::Structured,
            "Acme leads with $120M revenue.",
        )));
        let dispatcher = Dispatcher::new(registry, Duration::from_millis(200));

        let results = dispatcher
            .dispatch(
                &decision(Domain::Structured, vec![]),
                &Query::new("top companies by revenue"),
                &ConversationWindow::empty(),
            )
            .await;

        assert_eq!(results[0].answer, "Acme leads with $120M revenue.");
    }
}
