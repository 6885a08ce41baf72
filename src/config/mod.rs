use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::domain::feed::FeedWindow;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub database_url: String,
    pub redis_url: String,
    pub cache_timeout_ms: u64,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub db_statement_timeout_ms: u64,
    pub paseto_access_key: [u8; 32],
    pub feed_window: FeedWindow,
    pub global_feed_default_limit: i64,
    pub profile_cache_ttl_seconds: u64,
    pub request_body_limit_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;

        let feed_window_hours: i64 = env_or_parse("FEED_WINDOW_HOURS", "24")?;
        let feed_window = FeedWindow::hours(feed_window_hours)
            .map_err(|err| anyhow!("invalid FEED_WINDOW_HOURS: {}", err))?;

        let global_feed_default_limit: i64 = env_or_parse("GLOBAL_FEED_DEFAULT_LIMIT", "20")?;
        if !(1..=100).contains(&global_feed_default_limit) {
            return Err(anyhow!(
                "invalid GLOBAL_FEED_DEFAULT_LIMIT: must be between 1 and 100"
            ));
        }

        Ok(Self {
            http_addr,
            database_url: env_or_err("DATABASE_URL")?,
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1/"),
            cache_timeout_ms: env_or_parse("CACHE_TIMEOUT_MS", "250")?,
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            db_statement_timeout_ms: env_or_parse("DB_STATEMENT_TIMEOUT_MS", "5000")?,
            paseto_access_key: env_key_32("PASETO_ACCESS_KEY")?,
            feed_window,
            global_feed_default_limit,
            profile_cache_ttl_seconds: env_or_parse("PROFILE_CACHE_TTL_SECONDS", "60")?,
            request_body_limit_bytes: env_or_parse("REQUEST_BODY_LIMIT_BYTES", "65536")?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    parse_value(key, &value)
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}

fn env_key_32(key: &str) -> Result<[u8; 32]> {
    let value = env_or_err(key)?;
    decode_key_32(key, &value)
}

fn decode_key_32(key: &str, value: &str) -> Result<[u8; 32]> {
    let decoded = STANDARD
        .decode(value.as_bytes())
        .map_err(|err| anyhow!("invalid {}: {}", key, err))?;
    if decoded.len() != 32 {
        return Err(anyhow!("invalid {}: expected 32 bytes", key));
    }
    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&decoded);
    Ok(key_bytes)
}
