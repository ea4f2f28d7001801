use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Secrets shipped in sample files that must never reach a running server.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me",
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

const DEFAULT_MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub secret_key: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub media_dir: PathBuf,
    pub session_days: i64,
    pub max_avatar_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secret_key = lookup("BLOODSHARE_SECRET_KEY").unwrap_or_default();
        if secret_key.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&secret_key.as_str()) {
            bail!("BLOODSHARE_SECRET_KEY is unset or still a placeholder; set it in your .env file");
        }

        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = var("BLOODSHARE_PORT", "8000")
            .parse()
            .context("BLOODSHARE_PORT must be a port number")?;
        let session_days: i64 = var("BLOODSHARE_SESSION_DAYS", "14")
            .parse()
            .context("BLOODSHARE_SESSION_DAYS must be a whole number of days")?;
        if session_days < 1 {
            bail!("BLOODSHARE_SESSION_DAYS must be at least 1");
        }
        let max_avatar_bytes = match lookup("BLOODSHARE_MAX_AVATAR_BYTES") {
            Some(v) => v.parse().context("BLOODSHARE_MAX_AVATAR_BYTES must be a byte count")?,
            None => DEFAULT_MAX_AVATAR_BYTES,
        };

        Ok(Self {
            secret_key,
            db_path: var("BLOODSHARE_DB_PATH", "bloodshare.db").into(),
            host: var("BLOODSHARE_HOST", "0.0.0.0"),
            port,
            media_dir: var("BLOODSHARE_MEDIA_DIR", "./media").into(),
            session_days,
            max_avatar_bytes,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}
