/// Lobby API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key sent as a bearer token to the completion provider.
    pub openrouter_api_key: String,
    /// Completion provider base URL (e.g. `https://openrouter.ai/api/v1`).
    pub openrouter_url: String,
    /// Model identifier requested for bot replies.
    pub completion_model: String,
    /// Port the HTTP server binds to.
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            openrouter_api_key: required_var("OPENROUTER_API_KEY"),
            openrouter_url: std::env::var("OPENROUTER_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string()),
            completion_model: std::env::var("COMPLETION_MODEL")
                .unwrap_or_else(|_| "anthropic/claude-3-sonnet-20240229".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}
