use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pagination::DEFAULT_PAGE_SIZE;
use crate::rollups::RollupInterval;

/// Configuration file structure for testlens.
///
/// Selects the storage and cache tiers the rollup store reads through and the
/// defaults applied to queries. Configuration files are loaded from the
/// current directory or a specified path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Durable object storage holding the rollups
    #[serde(default)]
    pub storage: StorageConfig,

    /// Cache tier in front of storage
    #[serde(default)]
    pub cache: CacheConfig,

    /// Query defaults and cache warming
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory of the local backend
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// Endpoint of the http backend
    pub base_url: Option<String>,

    /// Bucket the rollup job writes into
    #[serde(default = "default_bucket")]
    pub bucket: String,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Lifetime of repopulated entries, 0 for no expiry
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,

    /// Directory of the file backend, defaults to the platform cache dir
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnalyticsConfig {
    /// Branch queried when none is given
    #[serde(default = "default_branch")]
    pub default_branch: String,

    /// Page size of listings without `first` or `last`
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Rollup windows copied into the cache after a storage fallback
    #[serde(default = "default_repopulate_intervals")]
    pub repopulate_intervals: Vec<RollupInterval>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Default output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            root: default_storage_root(),
            base_url: None,
            bucket: default_bucket(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::File,
            enabled: true,
            ttl_seconds: default_ttl_seconds(),
            dir: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_seconds > 0).then(|| Duration::from_secs(self.ttl_seconds))
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            default_branch: default_branch(),
            page_size: default_page_size(),
            repopulate_intervals: default_repopulate_intervals(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("storage")
}

fn default_bucket() -> String {
    "archive".to_string()
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

fn default_ttl_seconds() -> u64 {
    3600
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_repopulate_intervals() -> Vec<RollupInterval> {
    vec![
        RollupInterval::days(1),
        RollupInterval::days(7),
        RollupInterval::days(30),
        RollupInterval::between(60, 30),
    ]
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./testlens.toml
    /// 3. ./testlens.json
    /// 4. ./testlens.yaml
    /// 5. ./testlens.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = [
            "testlens.toml",
            "testlens.json",
            "testlens.yaml",
            "testlens.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        let config: Self = match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.analytics.page_size == 0 {
            anyhow::bail!("analytics.page-size must be at least 1");
        }
        if let Some(interval) = self
            .analytics
            .repopulate_intervals
            .iter()
            .find(|interval| interval.end.is_some_and(|end| end >= interval.start))
        {
            anyhow::bail!(
                "repopulate interval end ({:?}) must be smaller than start ({})",
                interval.end,
                interval.start
            );
        }
        Ok(())
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml") | Some("yml") => serde_yaml::to_string(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}
