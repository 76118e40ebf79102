//! Configuration module for the collective backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEV_JWT_SECRET: &str = "fashion-collective-dev-secret";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log line format
    pub log_format: LogFormat,
    /// HMAC secret used to sign credentials
    pub jwt_secret: String,
    /// Whether `jwt_secret` fell back to the built-in development value
    pub jwt_secret_is_default: bool,
    /// Credential lifetime in days
    pub token_ttl_days: i64,
    /// Weight recorded for every contribution, in [0, 1]
    pub contribution_weight: f64,
    /// `development` exposes internal error messages in 5xx responses
    pub environment: String,
    /// Multiplier applied to simulated AI latencies (0 disables the delay)
    pub ai_latency_factor: f64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let db_path = env::var("COLLECTIVE_DB_PATH")
            .unwrap_or_else(|_| "./data/collective.sqlite".to_string())
            .into();

        let bind_addr = env::var("COLLECTIVE_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:5000".to_string())
            .parse()
            .expect("Invalid COLLECTIVE_BIND_ADDR format");

        let log_level = env::var("COLLECTIVE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("COLLECTIVE_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let (jwt_secret, jwt_secret_is_default) = match env::var("COLLECTIVE_JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => (secret, false),
            _ => (DEV_JWT_SECRET.to_string(), true),
        };

        let token_ttl_days = env::var("COLLECTIVE_TOKEN_TTL_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|days: &i64| *days > 0)
            .unwrap_or(30);

        let contribution_weight = env::var("COLLECTIVE_CONTRIBUTION_WEIGHT")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|w| w.is_finite())
            .map(|w| w.clamp(0.0, 1.0))
            .unwrap_or(0.1);

        let environment =
            env::var("COLLECTIVE_ENV").unwrap_or_else(|_| "development".to_string());

        let ai_latency_factor =
            parse_latency_factor(env::var("COLLECTIVE_AI_LATENCY_FACTOR").ok().as_deref());

        Self {
            db_path,
            bind_addr,
            log_level,
            log_format,
            jwt_secret,
            jwt_secret_is_default,
            token_ttl_days,
            contribution_weight,
            environment,
            ai_latency_factor,
        }
    }

    /// Whether internal error details may be returned to clients.
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

/// Largest accepted AI latency factor.
pub const MAX_AI_LATENCY_FACTOR: f64 = 100.0;

/// Parse the AI latency factor, falling back to 1 when unset or invalid.
fn parse_latency_factor(value: Option<&str>) -> f64 {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|f| f.is_finite() && *f >= 0.0)
        .map(|f| f.min(MAX_AI_LATENCY_FACTOR))
        .unwrap_or(1.0)
}
