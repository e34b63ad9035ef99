mod file_config;

pub use file_config::{AuthConfig, CorsConfig, FileConfig};

use crate::server::RequestsLoggingLevel;
use anyhow::{anyhow, bail, Result};
use clap::ValueEnum;
use rand::Rng;
use rand_distr::Alphanumeric;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Shortest signing secret accepted from configuration, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub jwt_secret: Option<String>,
    pub read_pool_size: usize,
    pub store_timeout_ms: u64,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub jwt_secret: String,
    /// True when no secret was configured and one was generated for this run.
    pub jwt_secret_generated: bool,
    pub read_pool_size: usize,
    pub store_timeout: Duration,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| anyhow!("db_path must be given on the command line or in the config file"))?;

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = match file.logging_level {
            Some(s) => parse_logging_level(&s)
                .ok_or_else(|| anyhow!("Unknown logging_level '{}'", s))?,
            None => cli.logging_level.clone(),
        };

        let read_pool_size = file.read_pool_size.unwrap_or(cli.read_pool_size);
        if read_pool_size == 0 {
            bail!("read_pool_size must be at least 1");
        }

        let store_timeout_ms = file.store_timeout_ms.unwrap_or(cli.store_timeout_ms);
        if store_timeout_ms == 0 {
            bail!("store_timeout_ms must be positive");
        }

        let configured_secret = file
            .auth
            .and_then(|auth| auth.jwt_secret)
            .or_else(|| cli.jwt_secret.clone());
        let (jwt_secret, jwt_secret_generated) = match configured_secret {
            Some(secret) => {
                if secret.len() < MIN_JWT_SECRET_LEN {
                    bail!(
                        "jwt_secret must be at least {} bytes long",
                        MIN_JWT_SECRET_LEN
                    );
                }
                (secret, false)
            }
            None => {
                warn!("No jwt_secret configured, generated a random one. Sessions will not survive a restart.");
                (generate_secret(), true)
            }
        };

        let cors_allowed_origins = file
            .cors
            .and_then(|cors| cors.allowed_origins)
            .unwrap_or_else(|| cli.cors_allowed_origins.clone());

        Ok(Self {
            db_path,
            port,
            metrics_port,
            logging_level,
            jwt_secret,
            jwt_secret_generated,
            read_pool_size,
            store_timeout: Duration::from_millis(store_timeout_ms),
            cors_allowed_origins,
        })
    }
}

fn generate_secret() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
