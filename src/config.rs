use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::gateway::GatewayEnvironment;

pub mod settings;

pub const DEFAULT_SANDBOX_URL: &str = "https://apitest.cybersource.com";
pub const DEFAULT_PRODUCTION_URL: &str = "https://api.cybersource.com";

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    Cybersource,
    Mock,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub mode: GatewayMode,
    pub merchant_id: String,
    pub key_id: String,
    pub shared_secret: String,
    pub sandbox_url: String,
    pub production_url: String,
    pub timeout_secs: u64,
    /// Scripted behaviour for the mock gateway.
    pub mock_behavior: Option<String>,
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn has_credentials(&self) -> bool {
        !self.merchant_id.is_empty() && !self.key_id.is_empty() && !self.shared_secret.is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub gateway: GatewayConfig,
    pub settings_refresh_secs: u64,
    /// Used for `global.auth` when the settings table does not define it.
    pub default_environment: Option<GatewayEnvironment>,
    pub log_format: LogFormat,
    /// Comma-separated origins; unset allows any origin.
    pub cors_allowed_origins: Option<String>,
    pub log_request_body: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present

        let default_environment = match optional_var("DEFAULT_GATEWAY_ENVIRONMENT") {
            Some(raw) => Some(GatewayEnvironment::parse(&raw).ok_or_else(|| {
                anyhow::anyhow!("DEFAULT_GATEWAY_ENVIRONMENT must be 'development' or 'production', got '{}'", raw)
            })?),
            None => None,
        };

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            gateway: GatewayConfig {
                mode: parse_gateway_mode(&env::var("GATEWAY_MODE").unwrap_or_default())?,
                merchant_id: env::var("CYBERSOURCE_MERCHANT_ID").unwrap_or_default(),
                key_id: env::var("CYBERSOURCE_KEY_ID").unwrap_or_default(),
                shared_secret: env::var("CYBERSOURCE_SHARED_SECRET").unwrap_or_default(),
                sandbox_url: optional_var("CYBERSOURCE_SANDBOX_URL")
                    .unwrap_or_else(|| DEFAULT_SANDBOX_URL.to_string()),
                production_url: optional_var("CYBERSOURCE_PRODUCTION_URL")
                    .unwrap_or_else(|| DEFAULT_PRODUCTION_URL.to_string()),
                timeout_secs: env::var("GATEWAY_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()?,
                mock_behavior: optional_var("MOCK_GATEWAY_BEHAVIOR"),
            },
            settings_refresh_secs: env::var("SETTINGS_REFRESH_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            default_environment,
            log_format: parse_log_format(&env::var("LOG_FORMAT").unwrap_or_default()),
            cors_allowed_origins: optional_var("CORS_ALLOWED_ORIGINS"),
            log_request_body: env::var("LOG_REQUEST_BODY")
                .map(|value| value.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_gateway_mode(raw: &str) -> Result<GatewayMode> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "cybersource" => Ok(GatewayMode::Cybersource),
        "mock" => Ok(GatewayMode::Mock),
        other => anyhow::bail!("GATEWAY_MODE must be 'cybersource' or 'mock', got '{}'", other),
    }
}

fn parse_log_format(raw: &str) -> LogFormat {
    if raw.trim().eq_ignore_ascii_case("json") {
        LogFormat::Json
    } else {
        LogFormat::Text
    }
}
