use cfo_query_orchestrator::{
    api::start_server,
    classifier::QueryClassifier,
    composer::ResponseComposer,
    config::AssistantConfig,
    dispatcher::Dispatcher,
    handlers::create_default_registry,
    orchestrator::Orchestrator,
    reasoning::AnthropicClient,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = AssistantConfig::from_env();

    if config.anthropic_api_key.is_empty() {
        eprintln!("⚠️  ANTHROPIC_API_KEY not set in .env");
        eprintln!("📌 Queries will route to the default domain until it is configured");
    }
    if config.handler_api_base_url.is_none() {
        eprintln!("⚠️  HANDLER_API_BASE_URL not set; domain handlers will report errors");
    }

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("🚀 CFO Query Orchestrator - API Server");
    info!("📍 Port: {}", api_port);

    // Create components
    let reasoning = Arc::new(AnthropicClient::new(
        config.anthropic_api_key.clone(),
        config.anthropic_model.clone(),
    ));
    let classifier = QueryClassifier::new(reasoning, config.confidence_threshold);
    let dispatcher = Dispatcher::new(create_default_registry(), config.handler_timeout);

    let orchestrator = Arc::new(Orchestrator::new(
        classifier,
        dispatcher,
        ResponseComposer::new(),
        &config,
    ));

    info!("✅ Orchestrator initialized");
    info!("📡 Starting API server...");

    start_server(orchestrator, api_port).await?;

    Ok(())
}
