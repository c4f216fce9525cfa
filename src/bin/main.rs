use cfo_query_orchestrator::{
    classifier::QueryClassifier,
    composer::ResponseComposer,
    config::AssistantConfig,
    dispatcher::Dispatcher,
    handlers::{HandlerRegistry, StaticHandler},
    models::{Domain, PayloadKind},
    orchestrator::Orchestrator,
    reasoning::MockReasoning,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("CFO Query Orchestrator demo starting");

    // Offline components: canned handlers, scripted routing
    let config = AssistantConfig::default();

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(
        StaticHandler::new(
            Domain::Structured,
            "The top companies by revenue are Acme Corp ($120M) and Globex ($95M).",
        )
        .with_payload(
            PayloadKind::Table,
            serde_json::json!({
                "columns": ["company", "revenue_musd"],
                "rows": [["Acme Corp", 120.0], ["Globex", 95.0]],
            }),
        ),
    ));
    registry.register(Arc::new(StaticHandler::new(
        Domain::Retrieval,
        "Expenses over $10,000 require CFO approval per the expense policy.",
    )));
    registry.register(Arc::new(StaticHandler::new(
        Domain::Web,
        "Recent GAAP updates focus on revenue recognition disclosures.",
    )));

    let reasoning = Arc::new(MockReasoning::new(
        r#"{"primary": "structured", "confidence": 0.95, "rationale": "financial-metric question"}"#,
    ));

    let orchestrator = Orchestrator::new(
        QueryClassifier::new(reasoning, config.confidence_threshold),
        Dispatcher::new(registry, config.handler_timeout),
        ResponseComposer::new(),
        &config,
    );

    let session_id = Uuid::new_v4();

    let turns = [
        ("Show me the top 10 companies by revenue", None),
        ("What's the approval process for big expenses?", Some(Domain::Retrieval)),
        ("Recent changes in GAAP standards", Some(Domain::Web)),
    ];

    for (question, override_domain) in turns {
        info!(%session_id, question, "Submitting turn");

        let response = orchestrator
            .handle_turn(session_id, question, override_domain)
            .await;

        println!("\n=== {} ===", question);
        println!("Status: {:?}", response.status);
        println!(
            "Answered by: {}",
            response
                .contributors
                .iter()
                .map(|d| d.label())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("{}", response.answer);
        for citation in &response.citations {
            println!("  [source] {} ({})", citation.source, citation.domain);
        }
        for payload in &response.payloads {
            println!("  [{:?} payload] {}", payload.kind, payload.data);
        }
    }

    Ok(())
}
