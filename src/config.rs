use crate::query::executor::DEFAULT_PARALLEL_THRESHOLD;
use crate::service::{QueryOptions, SortOrder};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "txq";
const CONFIG_FILE: &str = "config.json";

/// Overrides the config file location
pub const CONFIG_ENV: &str = "TXQ_CONFIG";

/// Application configuration stored in the app data directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Transactions file used when `--file` is not given
    #[serde(default)]
    pub transactions_file: Option<PathBuf>,

    /// Capacity of the parsed-query cache (0 disables it)
    #[serde(default = "default_parse_cache_size")]
    pub parse_cache_size: usize,

    /// Record count at which evaluation runs in parallel
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,

    /// Refuse to run queries that fail validation
    #[serde(default = "default_strict_validation")]
    pub strict_validation: bool,

    #[serde(default)]
    pub sort: SortOrder,
}

fn default_parse_cache_size() -> usize {
    128
}

fn default_parallel_threshold() -> usize {
    DEFAULT_PARALLEL_THRESHOLD
}

fn default_strict_validation() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            transactions_file: None,
            parse_cache_size: default_parse_cache_size(),
            parallel_threshold: default_parallel_threshold(),
            strict_validation: default_strict_validation(),
            sort: SortOrder::default(),
        }
    }
}

impl AppConfig {
    /// Load config from the default location, or return defaults if absent
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<PathBuf> {
        let path = get_config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Service options derived from this config
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            sort: self.sort,
            limit: None,
            strict_validation: self.strict_validation,
            parallel_threshold: self.parallel_threshold,
            cache_size: self.parse_cache_size,
        }
    }
}

/// Get the path to the config file (`TXQ_CONFIG` wins when set)
pub fn get_config_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    Ok(get_app_data_dir()?.join(CONFIG_FILE))
}

/// Get the application data directory
pub fn get_app_data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Application Support"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
    } else {
        // Linux/Unix: use XDG_DATA_HOME or ~/.local/share
        dirs::data_dir()
    };

    let base = base.context("Could not determine app data directory")?;
    Ok(base.join(APP_NAME))
}
