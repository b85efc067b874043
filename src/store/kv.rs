//! Key-Value Configuration Store
//!
//! Persistent JSON records grouped into sections. The directory-backed store
//! keeps one file per record at `<root>/<section>/<key>`; the in-memory store
//! serves tests and dry runs.

use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

// =============================================================================
// KeyValueStore Trait
// =============================================================================

/// Section/key addressed store of JSON records
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a record; `None` when absent
    async fn get(&self, section: &str, key: &str) -> Result<Option<Value>>;

    /// Create or replace a record
    async fn update(&self, section: &str, key: &str, value: &Value) -> Result<()>;

    /// Remove a record; removing an absent record succeeds
    async fn delete(&self, section: &str, key: &str) -> Result<()>;

    /// Keys present in a section
    async fn keys(&self, section: &str) -> Result<Vec<String>>;
}

pub type KeyValueStoreRef = Arc<dyn KeyValueStore>;

/// Reject identifiers that could escape the store directory
pub fn validate_identifier(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key != "."
        && key != ".."
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidConfigIdentifier {
            key: key.to_string(),
        })
    }
}

// =============================================================================
// Directory Store
// =============================================================================

/// Store keeping each record in its own file
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, section: &str, key: &str) -> Result<PathBuf> {
        validate_identifier(section)?;
        validate_identifier(key)?;
        Ok(self.root.join(section).join(key))
    }
}

#[async_trait]
impl KeyValueStore for DirectoryStore {
    async fn get(&self, section: &str, key: &str) -> Result<Option<Value>> {
        let path = self.record_path(section, key)?;
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let value = serde_json::from_slice(&data).map_err(|e| Error::ConfigRecord {
            section: section.to_string(),
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(value))
    }

    async fn update(&self, section: &str, key: &str, value: &Value) -> Result<()> {
        let path = self.record_path(section, key)?;
        let dir = self.root.join(section);
        fs::create_dir_all(&dir).await?;

        // Write then rename so readers never observe a partial record
        let tmp = dir.join(format!(".{}.tmp", key));
        let data = serde_json::to_vec(value)?;
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, &path).await?;

        debug!(section, key, "stored configuration record");
        Ok(())
    }

    async fn delete(&self, section: &str, key: &str) -> Result<()> {
        let path = self.record_path(section, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(section, key, "deleted configuration record");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self, section: &str) -> Result<Vec<String>> {
        validate_identifier(section)?;
        let mut entries = match fs::read_dir(self.root.join(section)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') && entry.file_type().await?.is_file() {
                keys.push(name);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

// =============================================================================
// Memory Store
// =============================================================================

/// Store holding records in process memory
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<(String, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, section: &str, key: &str) -> Result<Option<Value>> {
        validate_identifier(section)?;
        validate_identifier(key)?;
        Ok(self
            .records
            .read()
            .get(&(section.to_string(), key.to_string()))
            .cloned())
    }

    async fn update(&self, section: &str, key: &str, value: &Value) -> Result<()> {
        validate_identifier(section)?;
        validate_identifier(key)?;
        self.records
            .write()
            .insert((section.to_string(), key.to_string()), value.clone());
        Ok(())
    }

    async fn delete(&self, section: &str, key: &str) -> Result<()> {
        validate_identifier(section)?;
        validate_identifier(key)?;
        self.records
            .write()
            .remove(&(section.to_string(), key.to_string()));
        Ok(())
    }

    async fn keys(&self, section: &str) -> Result<Vec<String>> {
        validate_identifier(section)?;
        Ok(self
            .records
            .read()
            .keys()
            .filter(|(s, _)| s == section)
            .map(|(_, k)| k.clone())
            .collect())
    }
}
