use anyhow::{anyhow, Result};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-05-20";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default)]
    pub use_mock: bool,
    /// Credential from `GEMINI_API_KEY`; never written to disk.
    #[serde(skip)]
    pub env_api_key: Option<String>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            use_mock: false,
            env_api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from file, environment variables, or create default
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_else(|_| {
            info!("No config file found, using defaults");
            Self::default()
        });

        // Environment variables override config file
        if let Ok(api_key) = std::env::var("GEMINI_API_KEY") {
            if !api_key.trim().is_empty() {
                config.env_api_key = Some(api_key.trim().to_string());
            }
        }

        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = base_url;
        }

        if std::env::var("DORKGEN_USE_MOCK").is_ok() {
            config.use_mock = true;
        }

        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            info!("Loaded config from: {}", config_path.display());
            Ok(config)
        } else {
            Err(anyhow!("Config file not found"))
        }
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.toml"))
    }

    /// Data directory: `$DORKGEN_HOME`, else `~/.dorkgen`.
    pub fn get_config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("DORKGEN_HOME") {
            if !dir.trim().is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }
        let home = home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".dorkgen"))
    }

    pub fn is_mock_mode(&self) -> bool {
        self.use_mock
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries)
            .with_initial_delay(Duration::from_millis(self.initial_delay_ms))
    }

    pub fn show_config_info() -> Result<()> {
        let config_path = Self::get_config_path()?;
        let config = Self::load()?;
        println!("Data directory: {}", Self::get_config_dir()?.display());
        println!("Configuration file: {}", config_path.display());
        println!(
            "Status: {}",
            if config_path.exists() { "Found" } else { "Not found (using defaults)" }
        );
        println!("Model: {}", config.model);
        println!("Endpoint: {}", config.base_url);
        println!(
            "Retries: {} (initial delay {}ms)",
            config.max_retries, config.initial_delay_ms
        );
        println!("Mock mode: {}", config.use_mock);
        println!(
            "GEMINI_API_KEY: {}",
            if config.env_api_key.is_some() { "Set" } else { "Not set" }
        );

        println!("\nTo set API key:");
        println!("  dork --set-api-key <your-key>");
        println!("\nOr set environment variable:");
        println!("  export GEMINI_API_KEY=<your-key>");

        Ok(())
    }
}
