//! Persistence backends for per-patient model blobs.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::error::StoreError;

/// Get/set of one JSON blob per patient id.
#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Returns `Ok(None)` when nothing has been stored for `patient_id`.
    async fn get(&self, patient_id: &str) -> Result<Option<Value>, StoreError>;
    /// Replaces the blob for `patient_id` as a whole.
    async fn set(&self, patient_id: &str, blob: &Value) -> Result<(), StoreError>;
}

/// Process-local store, mainly for tests and embedding.
#[derive(Debug)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Value>>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage: while unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".into()))
        }
    }
}

#[async_trait]
impl ModelStore for MemoryStore {
    async fn get(&self, patient_id: &str) -> Result<Option<Value>, StoreError> {
        self.check()?;
        Ok(self.blobs.read().await.get(patient_id).cloned())
    }

    async fn set(&self, patient_id: &str, blob: &Value) -> Result<(), StoreError> {
        self.check()?;
        self.blobs
            .write()
            .await
            .insert(patient_id.to_string(), blob.clone());
        Ok(())
    }
}

/// One pretty-printed `<id>.json` file per patient under a directory.
///
/// Writes go to a sibling temp file that is then renamed over the target,
/// so readers never observe a partially written model.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File backing `patient_id`.
    pub fn path_for(&self, patient_id: &str) -> Result<PathBuf, StoreError> {
        Ok(self.dir.join(format!("{}.json", file_stem(patient_id)?)))
    }
}

/// Maps a patient id to a file stem. ASCII alphanumerics, `-` and `_` pass
/// through; every other byte becomes `%XX`, which keeps the mapping
/// injective and rules out path separators and `..`.
fn file_stem(patient_id: &str) -> Result<String, StoreError> {
    if patient_id.is_empty() {
        return Err(StoreError::InvalidKey(patient_id.to_string()));
    }
    let mut stem = String::with_capacity(patient_id.len());
    for b in patient_id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            stem.push(char::from(b));
        } else {
            stem.push_str(&format!("%{b:02X}"));
        }
    }
    Ok(stem)
}

#[async_trait]
impl ModelStore for FileStore {
    async fn get(&self, patient_id: &str) -> Result<Option<Value>, StoreError> {
        let path = self.path_for(patient_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, patient_id: &str, blob: &Value) -> Result<(), StoreError> {
        let path = self.path_for(patient_id)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(blob)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}
