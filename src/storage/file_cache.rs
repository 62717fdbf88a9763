use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TestLensError};

use super::CacheTier;

#[derive(Debug, Serialize, Deserialize)]
struct CachedEntry {
    /// Base64 of the cached bytes
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

/// Cache tier backed by one JSON file per key.
///
/// Defaults to the platform cache directory:
/// - Linux: `~/.cache/testlens/rollups/`
/// - macOS: `~/Library/Caches/testlens/rollups/`
///
/// Expired entries are removed lazily on read.
pub struct FileCache {
    dir: PathBuf,
    enabled: bool,
}

impl FileCache {
    /// # Errors
    ///
    /// Returns an error if `dir` cannot be created.
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        info!("Rollup cache enabled at: {}", dir.display());
        Ok(Self { dir, enabled: true })
    }

    /// # Errors
    ///
    /// Returns `TestLensError::Cache` if the platform has no cache directory.
    pub fn in_cache_dir() -> Result<Self> {
        let dir = dirs::cache_dir()
            .ok_or_else(|| TestLensError::Cache("No cache directory found".into()))?
            .join("testlens")
            .join("rollups");
        Self::new(dir)
    }

    /// A cache that stores nothing and never hits.
    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            enabled: false,
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(escape_key(key) + ".json")
    }
}

/// Maps a cache key onto a portable file name, escaping everything outside
/// `[A-Za-z0-9._-]` as `%XX`.
fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                escaped.push(char::from(byte));
            }
            _ => escaped.push_str(&format!("%{byte:02X}")),
        }
    }
    escaped
}

#[async_trait]
impl CacheTier for FileCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if !self.enabled {
            return Ok(None);
        }

        let path = self.entry_path(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: CachedEntry = serde_json::from_str(&content)
            .map_err(|e| TestLensError::Cache(format!("corrupt entry for '{key}': {e}")))?;

        if entry.expires_at.is_some_and(|deadline| deadline <= Utc::now()) {
            debug!("Cache entry expired: {key}");
            self.delete(key).await?;
            return Ok(None);
        }

        STANDARD
            .decode(entry.value)
            .map(Some)
            .map_err(|e| TestLensError::Cache(format!("corrupt entry for '{key}': {e}")))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let expires_at = ttl
            .map(|ttl| {
                chrono::Duration::from_std(ttl)
                    .map(|ttl| Utc::now() + ttl)
                    .map_err(|e| TestLensError::Cache(format!("invalid ttl: {e}")))
            })
            .transpose()?;

        let entry = CachedEntry {
            value: STANDARD.encode(value),
            expires_at,
        };
        tokio::fs::write(self.entry_path(key), serde_json::to_string(&entry)?).await?;

        debug!("Cached {} bytes under {key}", value.len());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        match tokio::fs::remove_file(self.entry_path(key)).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
