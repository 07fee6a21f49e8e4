//! Persistence for contract instance state.

use crate::error::{HostError, Result};
use crate::types::{ContractAddress, ContractKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// The persisted form of one deployed instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredState {
    pub address: ContractAddress,
    pub kind: ContractKind,
    pub state: Value,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl StoredState {
    #[must_use]
    pub fn initial(address: ContractAddress, kind: ContractKind, state: Value) -> Self {
        Self {
            address,
            kind,
            state,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Returns the record that follows this one after a successful write.
    #[must_use]
    pub fn next(&self, state: Value) -> Self {
        Self {
            address: self.address.clone(),
            kind: self.kind.clone(),
            state,
            version: self.version.saturating_add(1),
            updated_at: Utc::now(),
        }
    }
}

pub trait StateStore: Send + Sync {
    fn load(
        &self,
        address: &ContractAddress,
    ) -> impl Future<Output = Result<Option<StoredState>>> + Send;

    fn save(&self, record: &StoredState) -> impl Future<Output = Result<()>> + Send;

    fn list(&self) -> impl Future<Output = Result<Vec<ContractAddress>>> + Send;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<ContractAddress, StoredState>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    async fn load(&self, address: &ContractAddress) -> Result<Option<StoredState>> {
        Ok(self.records.read().await.get(address).cloned())
    }

    async fn save(&self, record: &StoredState) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.address.clone(), record.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ContractAddress>> {
        let mut addresses: Vec<ContractAddress> =
            self.records.read().await.keys().cloned().collect();
        addresses.sort();
        Ok(addresses)
    }
}

/// One JSON document per instance under a state directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens the store, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `HostError::Config` if the path exists and is not a directory,
    /// or `HostError::Io` if it cannot be created.
    pub async fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if dir.exists() && !dir.is_dir() {
            return Err(HostError::Config(format!(
                "State path is not a directory: {}",
                dir.display()
            )));
        }
        tokio::fs::create_dir_all(&dir).await?;
        debug!("Opened state directory {}", dir.display());
        Ok(Self { dir })
    }

    fn record_path(&self, address: &ContractAddress) -> PathBuf {
        self.dir.join(format!("{}.json", address.value()))
    }
}

impl StateStore for FileStore {
    async fn load(&self, address: &ContractAddress) -> Result<Option<StoredState>> {
        let path = self.record_path(address);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(HostError::Io(err)),
        }
    }

    async fn save(&self, record: &StoredState) -> Result<()> {
        let path = self.record_path(&record.address);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(
            "Persisted {} version {} to {}",
            record.address,
            record.version,
            path.display()
        );
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ContractAddress>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut addresses = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(address) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| ContractAddress::parse(stem).ok())
            {
                addresses.push(address);
            }
        }

        addresses.sort();
        Ok(addresses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn sample_record() -> StoredState {
        let kind = ContractKind::new("string_contract");
        let address = ContractAddress::derive(&kind, &Uuid::new_v4());
        StoredState::initial(address, kind, json!({"variable": "hello"}))
    }

    #[test]
    fn next_record_bumps_version_and_keeps_identity() {
        let first = sample_record();
        let second = first.next(json!({"variable": "world"}));

        assert_eq!(second.version, 1);
        assert_eq!(second.address, first.address);
        assert_eq!(second.kind, first.kind);
        assert_eq!(second.state["variable"], "world");
    }

    #[tokio::test]
    async fn memory_store_round_trips_records() -> Result<()> {
        let store = MemoryStore::new();
        let record = sample_record();

        assert_eq!(store.load(&record.address).await?, None);
        store.save(&record).await?;

        assert_eq!(store.load(&record.address).await?, Some(record.clone()));
        assert_eq!(store.list().await?, vec![record.address]);
        Ok(())
    }

    #[tokio::test]
    async fn file_store_persists_across_reopen() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let record = sample_record().next(json!({"variable": "σσσ"}));

        FileStore::open(dir.path()).await?.save(&record).await?;
        let reopened = FileStore::open(dir.path()).await?;

        assert_eq!(reopened.load(&record.address).await?, Some(record.clone()));
        assert_eq!(reopened.list().await?, vec![record.address]);
        Ok(())
    }

    #[tokio::test]
    async fn file_store_ignores_foreign_files_in_listing() -> Result<()> {
        let dir = tempfile::tempdir()?;
        tokio::fs::write(dir.path().join("notes.txt"), b"x").await?;
        tokio::fs::write(dir.path().join("not-an-address.json"), b"{}").await?;

        let store = FileStore::open(dir.path()).await?;
        assert!(store.list().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn file_store_reports_corrupt_record_as_serialization_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FileStore::open(dir.path()).await?;
        let record = sample_record();
        tokio::fs::write(store.record_path(&record.address), b"{not json").await?;

        assert!(matches!(
            store.load(&record.address).await,
            Err(HostError::Serialization(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn file_store_rejects_file_as_state_dir() -> Result<()> {
        let file = tempfile::NamedTempFile::new()?;
        assert!(matches!(
            FileStore::open(file.path()).await,
            Err(HostError::Config(_))
        ));
        Ok(())
    }
}
