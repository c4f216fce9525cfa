//! Environment-backed configuration
//!
//! All tunables are read once at startup. Missing optional values fall back
//! to defaults; missing service endpoints degrade to error results at the
//! component that needs them rather than failing startup.

use std::env;
use std::time::Duration;

/// Runtime configuration for the assistant.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// API key for the reasoning service used by the classifier.
    pub anthropic_api_key: String,
    /// Model identifier for the reasoning service.
    pub anthropic_model: String,
    /// Base URL of the service hosting the three domain handlers.
    pub handler_api_base_url: Option<String>,
    /// Minimum classifier confidence before the default-domain policy kicks in.
    pub confidence_threshold: f32,
    /// Per-handler call timeout.
    pub handler_timeout: Duration,
    /// Total latency budget for one turn, sized to cover the web fallback.
    pub turn_timeout: Duration,
    /// Turn-count ceiling per session; oldest turns are evicted past it.
    pub max_session_turns: usize,
    /// How many recent exchanges are included in classification and handler context.
    pub history_window: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key: String::new(),
            anthropic_model: "claude-sonnet-4-20250514".to_string(),
            handler_api_base_url: None,
            confidence_threshold: 0.5,
            handler_timeout: Duration::from_secs(20),
            turn_timeout: Duration::from_secs(60),
            max_session_turns: 20,
            history_window: 5,
        }
    }
}

impl AssistantConfig {
    /// Build the configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            anthropic_model: env::var("ANTHROPIC_MODEL").unwrap_or(defaults.anthropic_model),
            handler_api_base_url: env::var("HANDLER_API_BASE_URL")
                .ok()
                .map(|url| url.trim_end_matches('/').to_string()),
            confidence_threshold: parse_env("CONFIDENCE_THRESHOLD", defaults.confidence_threshold),
            handler_timeout: Duration::from_millis(parse_env(
                "HANDLER_TIMEOUT_MS",
                defaults.handler_timeout.as_millis() as u64,
            )),
            turn_timeout: Duration::from_millis(parse_env(
                "TURN_TIMEOUT_MS",
                defaults.turn_timeout.as_millis() as u64,
            )),
            max_session_turns: parse_env("MAX_SESSION_TURNS", defaults.max_session_turns),
            history_window: parse_env("HISTORY_WINDOW", defaults.history_window),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
