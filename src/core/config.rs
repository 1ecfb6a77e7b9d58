use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_CBR_BASE_URL: &str = "http://www.cbr.ru";
pub const DEFAULT_MOEX_BASE_URL: &str = "http://iss.moex.com";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CbrProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MoexProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub cbr: Option<CbrProviderConfig>,
    pub moex: Option<MoexProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            cbr: Some(CbrProviderConfig {
                base_url: DEFAULT_CBR_BASE_URL.to_string(),
            }),
            moex: Some(MoexProviderConfig {
                base_url: DEFAULT_MOEX_BASE_URL.to_string(),
            }),
        }
    }
}

impl ProvidersConfig {
    pub fn cbr_base_url(&self) -> &str {
        self.cbr
            .as_ref()
            .map_or(DEFAULT_CBR_BASE_URL, |p| &p.base_url)
    }

    pub fn moex_base_url(&self) -> &str {
        self.moex
            .as_ref()
            .map_or(DEFAULT_MOEX_BASE_URL, |p| &p.base_url)
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_ledger_currency() -> String {
    "RUR".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_ledger_currency")]
    pub ledger_currency: String,
    pub default_board: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            providers: ProvidersConfig::default(),
            request_timeout_secs: default_timeout_secs(),
            ledger_currency: default_ledger_currency(),
            default_board: None,
        }
    }
}

impl AppConfig {
    /// Loads the config from the platform config directory, falling back to
    /// defaults when no file has been created yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "commodity-prices", "commodity-prices")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
