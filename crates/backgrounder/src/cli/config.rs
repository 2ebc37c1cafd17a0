//! Client configuration
//!
//! Resolution order, lowest to highest:
//! 1. serde defaults
//! 2. ~/.backgrounder/config.toml
//! 3. BACKGROUNDER_SERVER / BACKGROUNDER_PROVIDER
//! 4. command-line flags (applied by the commands themselves)

use crate::cli::error::HelpfulError;
use anyhow::Context;
use backgrounder_logging::{backgrounder_home, logs_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SERVER_ENV: &str = "BACKGROUNDER_SERVER";
pub const PROVIDER_ENV: &str = "BACKGROUNDER_PROVIDER";

/// LinkedIn providers the server knows how to build.
pub const KNOWN_PROVIDERS: &[&str] = &["serpapi", "playwright", "proxycurl", "rapidapi"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the check server
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// LinkedIn provider sent when `--provider` is not given
    #[serde(default)]
    pub provider: Option<String>,

    /// Seconds allowed for establishing the connection
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_max_resume_bytes")]
    pub max_resume_bytes: u64,

    #[serde(default = "default_max_photo_bytes")]
    pub max_photo_bytes: u64,
}

fn default_server_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_max_resume_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_max_photo_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            provider: None,
            connect_timeout_secs: default_connect_timeout(),
            max_resume_bytes: default_max_resume_bytes(),
            max_photo_bytes: default_max_photo_bytes(),
        }
    }
}

impl ClientConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load the user's config file and apply environment overrides.
    pub fn resolve() -> anyhow::Result<Self> {
        let mut config = Self::load_from(&config_path())?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `BACKGROUNDER_*` overrides; blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(server) = present(SERVER_ENV) {
            self.server_url = server;
        }
        if let Some(provider) = present(PROVIDER_ENV) {
            self.provider = Some(provider);
        }
    }

    /// Endpoint that starts a check and streams its events.
    pub fn check_url(&self) -> String {
        format!("{}/api/v1/check", self.server_url.trim_end_matches('/'))
    }
}

/// Normalize and validate a provider name.
pub fn validate_provider(raw: &str) -> Result<String, HelpfulError> {
    let name = raw.trim().to_ascii_lowercase();
    if KNOWN_PROVIDERS.contains(&name.as_str()) {
        Ok(name)
    } else {
        Err(HelpfulError::unknown_provider(raw))
    }
}

/// Config file: ~/.backgrounder/config.toml
pub fn config_path() -> PathBuf {
    backgrounder_home().join("config.toml")
}

/// Arguments for the config command
#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    /// Show resolved configuration in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Run the config command - shows resolved settings and paths
pub fn run(args: ConfigArgs) -> anyhow::Result<()> {
    let config = ClientConfig::resolve()?;
    let home = backgrounder_home();
    let config_file = config_path();
    let logs = logs_dir();

    if args.json {
        let resolved = serde_json::json!({
            "home": home.to_string_lossy(),
            "config_file": {
                "path": config_file.to_string_lossy(),
                "exists": config_file.exists(),
            },
            "logs": logs.to_string_lossy(),
            "settings": config,
            "check_url": config.check_url(),
        });
        println!("{}", serde_json::to_string_pretty(&resolved)?);
    } else {
        println!("BACKGROUNDER CONFIGURATION");
        println!("==========================");
        println!();
        println!("Home:     {}", home.display());
        println!(
            "Config:   {} ({})",
            config_file.display(),
            if config_file.exists() { "exists" } else { "not found, using defaults" }
        );
        println!("Logs:     {}", logs.display());
        println!();
        println!("Server:           {}", config.server_url);
        println!(
            "Provider:         {}",
            config.provider.as_deref().unwrap_or("(server default)")
        );
        println!("Connect timeout:  {}s", config.connect_timeout_secs);
        println!(
            "Upload limits:    resume {}, photo {}",
            crate::cli::output::format_size(config.max_resume_bytes),
            crate::cli::output::format_size(config.max_photo_bytes)
        );
    }

    Ok(())
}
