use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use anyhow::{Context, Result};

fn default_poll_interval() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardConfig {
    pub panel_url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Origin used for subscription links; the panel URL when unset.
    #[serde(default)]
    pub public_origin: Option<String>,
}

impl DashboardConfig {
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            tracing::info!("Loading config from {}", path.display());
            return Self::from_toml(&contents);
        }

        // Try to load from /etc/caramba/dashboard.toml first
        let config_paths = vec![
            "/etc/caramba/dashboard.toml",
            "./dashboard.toml",
        ];

        for path in config_paths {
            if let Ok(contents) = fs::read_to_string(path) {
                tracing::info!("Loading config from {}", path);
                return Self::from_toml(&contents);
            }
        }

        // Fallback to environment variables
        tracing::info!("Loading config from environment");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(contents).context("Invalid dashboard config")?;
        config.panel_url = normalize_panel_url(&config.panel_url);
        Ok(config)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let panel_url = lookup("PANEL_URL").context("PANEL_URL is not set")?;
        Ok(Self {
            panel_url: normalize_panel_url(&panel_url),
            auth_token: lookup("PANEL_TOKEN").filter(|t| !t.is_empty()),
            poll_interval_secs: lookup("POLL_INTERVAL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_poll_interval),
            request_timeout_secs: lookup("REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_request_timeout),
            public_origin: lookup("PUBLIC_ORIGIN").filter(|o| !o.is_empty()),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn origin(&self) -> String {
        self.public_origin
            .as_deref()
            .unwrap_or(&self.panel_url)
            .trim_end_matches('/')
            .to_string()
    }
}

/// Scheme defaults to https; trailing slashes are dropped.
pub fn normalize_panel_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    with_scheme.trim_end_matches('/').to_string()
}
