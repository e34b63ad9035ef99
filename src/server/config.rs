use super::RequestsLoggingLevel;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    /// Upper bound on a single data-layer call.
    pub store_timeout: Duration,
    /// Origins allowed by the CORS layer. Empty disables the layer.
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3001,
            store_timeout: Duration::from_millis(5000),
            cors_allowed_origins: Vec::new(),
        }
    }
}
