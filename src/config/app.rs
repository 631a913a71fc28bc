// src/config/app.rs
use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::ingest::adapters::HttpSettings;

pub const ENV_BIND_ADDR: &str = "BIND_ADDR";
pub const ENV_HTTP_TIMEOUT: &str = "SCRAPE_HTTP_TIMEOUT_SECS";
pub const ENV_SCHEDULER_ENABLED: &str = "SCHEDULER_ENABLED";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Process settings. Source definitions are loaded separately
/// (see `ingest::config`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub http_timeout: Duration,
    pub scheduler_enabled: bool,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let bind_raw = env::var(ENV_BIND_ADDR).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .trim()
            .parse()
            .with_context(|| format!("{ENV_BIND_ADDR}='{bind_raw}' is not a socket address"))?;

        let timeout_secs = match env::var(ENV_HTTP_TIMEOUT) {
            Ok(v) => v
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .with_context(|| format!("{ENV_HTTP_TIMEOUT}='{v}' must be a positive integer"))?,
            Err(_) => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        Ok(Self {
            bind_addr,
            http_timeout: Duration::from_secs(timeout_secs),
            scheduler_enabled: env::var(ENV_SCHEDULER_ENABLED)
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
            log_format: match env::var(ENV_LOG_FORMAT) {
                Ok(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Compact,
            },
        })
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: self.http_timeout,
            ..HttpSettings::default()
        }
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
