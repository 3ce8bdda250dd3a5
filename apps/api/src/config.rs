use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Every variable has a default matching the development backend.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the recruiter backend (drafting, approval store, mail relay).
    pub backend_url: String,
    pub port: u16,
    /// Directory résumé uploads are stored under.
    pub upload_dir: PathBuf,
    /// Cadence of the approval-queue poller.
    pub poll_interval: Duration,
    /// Bound applied to every outbound backend call.
    pub request_timeout: Duration,
    /// How long a transient banner stays visible before auto-clearing.
    pub notice_ttl: Duration,
    /// Sender identity passed to the mail relay ("me" = the authenticated account).
    pub sender: String,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            backend_url: env_or("BACKEND_URL", "http://localhost:8000"),
            port: env_or("PORT", "3000")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "uploads")),
            poll_interval: Duration::from_secs(
                env_or("POLL_INTERVAL_SECS", "10")
                    .parse::<u64>()
                    .context("POLL_INTERVAL_SECS must be an integer")?,
            ),
            request_timeout: Duration::from_secs(
                env_or("REQUEST_TIMEOUT_SECS", "30")
                    .parse::<u64>()
                    .context("REQUEST_TIMEOUT_SECS must be an integer")?,
            ),
            notice_ttl: Duration::from_secs(
                env_or("NOTICE_TTL_SECS", "5")
                    .parse::<u64>()
                    .context("NOTICE_TTL_SECS must be an integer")?,
            ),
            sender: env_or("SENDER", "me"),
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
