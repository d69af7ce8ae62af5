use anyhow::{Context, Result};
use rand::Rng;
use std::{path::PathBuf, time::Duration};

/// Lowest accepted flush interval.
pub const MIN_SAVE_INTERVAL_MS: u64 = 1000;

const DEFAULT_SAVE_INTERVAL_MS: u64 = 60_000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind the HTTP server to, e.g. "0.0.0.0"
    pub host: String,

    /// Port to listen on. Picked at random from 10000–65535 when unset.
    pub port: u16,

    /// Public base URL used when composing short links, e.g. "https://go.example.com".
    /// Never has a trailing slash.
    pub base_url: String,

    /// How often dirty state is written to the snapshot file.
    pub save_interval: Duration,

    /// Snapshot file path.
    pub data_file: PathBuf,

    /// Where visitors to "/" are sent, if anywhere.
    pub root_redirect_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables (populated by dotenvy before this is called).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key → value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match lookup("PORT") {
            Some(raw) => {
                let port = raw
                    .trim()
                    .parse::<u16>()
                    .context("PORT must be a valid port number (1–65535)")?;
                if port == 0 {
                    anyhow::bail!("PORT must be a valid port number (1–65535)");
                }
                port
            }
            None => rand::thread_rng().gen_range(10_000..=65_535),
        };

        let base_url = lookup("BASE_URL")
            .unwrap_or_else(|| format!("http://127.0.0.1:{port}"))
            .trim()
            .trim_end_matches('/')
            .to_owned();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            anyhow::bail!("BASE_URL must start with http:// or https:// (got {base_url:?})");
        }

        let save_interval_ms = match lookup("SAVE_INTERVAL_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .context("SAVE_INTERVAL_MS must be a whole number of milliseconds")?,
            None => DEFAULT_SAVE_INTERVAL_MS,
        };

        if save_interval_ms < MIN_SAVE_INTERVAL_MS {
            anyhow::bail!(
                "SAVE_INTERVAL_MS must be at least {MIN_SAVE_INTERVAL_MS} (got {save_interval_ms})"
            );
        }

        let root_redirect_url = lookup("ROOT_REDIRECT_URL")
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty());

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            base_url,
            save_interval: Duration::from_millis(save_interval_ms),
            data_file: lookup("DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./urls.json")),
            root_redirect_url,
        })
    }

    /// Full public URL for a short code.
    pub fn short_url(&self, code: &str) -> String {
        format!("{}/{}", self.base_url, code)
    }
}
