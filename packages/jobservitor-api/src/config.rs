use std::env;

use anyhow::{Context, Result};
use dotenvy::dotenv;

/// Scheduler API configuration, loaded once at startup -- same
/// `dotenvy` + `std::env::var` + `anyhow::Context` pattern as the executor
/// binary's `Config::from_env`.
#[derive(Debug, Clone)]
pub struct Config {
    pub redis_uri: String,
    pub port: u16,
    pub record_ttl_seconds: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        let redis_uri =
            env::var("REDIS_URI").unwrap_or_else(|_| "redis://localhost:6379/0".to_string());
        let port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("API_PORT must be a valid port number")?;

        let record_ttl_seconds = match env::var("JOB_RECORD_TTL_SECONDS") {
            Ok(v) => Some(v.parse().context("JOB_RECORD_TTL_SECONDS must be a valid number")?),
            Err(_) => None,
        };

        Ok(Self {
            redis_uri,
            port,
            record_ttl_seconds,
        })
    }
}
