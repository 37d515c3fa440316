//! Environment-driven gateway configuration.
//!
//! Every setting has a development default so the binary runs out of the
//! box; production deployments override via `IRISGATE_*` environment
//! variables, in particular the token secret.

use std::env;
use std::path::PathBuf;

use tracing::warn;

/// Development-only fallback secret; real deployments must override it.
const DEFAULT_TOKEN_SECRET: &str = "irisgate-dev-secret";

/// Runtime configuration for the gateway binary.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// TCP address the server binds to (`IRISGATE_ADDR`).
    pub bind_addr: String,
    /// SQLite database file for the prediction ledger (`IRISGATE_DB`).
    pub database_path: PathBuf,
    /// HMAC secret for token signing (`IRISGATE_TOKEN_SECRET`).
    pub token_secret: String,
    /// Token lifetime in seconds (`IRISGATE_TOKEN_TTL_SECS`).
    pub token_ttl_secs: i64,
    /// Accepted login username (`IRISGATE_USERNAME`).
    pub username: String,
    /// Accepted login password (`IRISGATE_PASSWORD`).
    pub password: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_owned(),
            database_path: PathBuf::from("predictions.db"),
            token_secret: DEFAULT_TOKEN_SECRET.to_owned(),
            token_ttl_secs: 3600,
            username: "admin".to_owned(),
            password: "secret".to_owned(),
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from the environment, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let token_secret = match env::var("IRISGATE_TOKEN_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("IRISGATE_TOKEN_SECRET not set — using the development default");
                defaults.token_secret
            }
        };

        Self {
            bind_addr: env::var("IRISGATE_ADDR").unwrap_or(defaults.bind_addr),
            database_path: env::var("IRISGATE_DB")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            token_secret,
            token_ttl_secs: env::var("IRISGATE_TOKEN_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.token_ttl_secs),
            username: env::var("IRISGATE_USERNAME").unwrap_or(defaults.username),
            password: env::var("IRISGATE_PASSWORD").unwrap_or(defaults.password),
        }
    }
}
