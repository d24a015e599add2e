//! On-disk snapshot of the discovery cache.
//!
//! The hub persists every eqLogic it has seen so a restart can rebuild the
//! entity index before the broker resends anything. Writes go through a
//! temp file and a rename so a crash mid-write never truncates the
//! snapshot.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::discovery::model::EqLogic;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read snapshot {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write snapshot {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("snapshot {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        source: serde_json::Error,
    },
    #[error("snapshot {path} has unsupported version {version}")]
    Version { path: String, version: u32 },
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    eqlogic_store: BTreeMap<i64, EqLogic>,
}

pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted cache. A missing file is an empty cache.
    pub async fn load(&self) -> Result<BTreeMap<i64, EqLogic>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot on disk");
                return Ok(BTreeMap::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };
        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: self.path.display().to_string(),
                source,
            })?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::Version {
                path: self.path.display().to_string(),
                version: snapshot.version,
            });
        }
        Ok(snapshot.eqlogic_store)
    }

    /// Write the cache atomically.
    pub async fn save(&self, store: &BTreeMap<i64, EqLogic>) -> Result<(), StoreError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            eqlogic_store: store.clone(),
        };
        let json = serde_json::to_vec_pretty(&snapshot).map_err(|source| StoreError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })?;
        let tmp = self.path.with_extension("tmp");
        let write_err = |source| StoreError::Write {
            path: self.path.display().to_string(),
            source,
        };
        tokio::fs::write(&tmp, &json).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(write_err)?;
        debug!(path = %self.path.display(), devices = store.len(), "snapshot saved");
        Ok(())
    }
}

/// Debounces snapshot writes during discovery bursts.
///
/// Each schedule cancels the pending timer and arms a new one, so only the
/// last snapshot of a burst reaches disk. `flush` writes immediately and is
/// the shutdown path.
pub struct SaveDebouncer {
    store: Arc<SnapshotStore>,
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl SaveDebouncer {
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

    pub fn new(store: Arc<SnapshotStore>, delay: Duration) -> Self {
        Self {
            store,
            delay,
            pending: None,
        }
    }

    pub fn schedule(&mut self, data: BTreeMap<i64, EqLogic>) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
        let store = self.store.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = store.save(&data).await {
                warn!("debounced snapshot save failed: {}", e);
            }
        }));
    }

    /// Cancel any pending timer and write now.
    pub async fn flush(&mut self, data: &BTreeMap<i64, EqLogic>) -> Result<(), StoreError> {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
        self.store.save(data).await
    }
}

impl Drop for SaveDebouncer {
    fn drop(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_store() -> BTreeMap<i64, EqLogic> {
        let eq: EqLogic = serde_json::from_value(json!({
            "id": 12,
            "name": "Prise TV",
            "cmds": {
                "120": { "id": 120, "name": "Etat", "type": "info", "subType": "binary" }
            }
        }))
        .unwrap();
        BTreeMap::from([(12, eq)])
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("cache.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("cache.json"));
        store.save(&sample_store()).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[&12].name, "Prise TV");
        assert!(loaded[&12].cmd_by_id(120).is_some());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let store = SnapshotStore::new(path);
        assert!(matches!(
            store.load().await,
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn debouncer_keeps_only_the_last_scheduled_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SnapshotStore::new(dir.path().join("cache.json")));
        let mut debouncer = SaveDebouncer::new(store.clone(), Duration::from_millis(20));

        debouncer.schedule(BTreeMap::new());
        debouncer.schedule(sample_store());
        tokio::time::sleep(Duration::from_millis(100)).await;

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[tokio::test]
    async fn flush_cancels_the_pending_timer() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SnapshotStore::new(dir.path().join("cache.json")));
        let mut debouncer = SaveDebouncer::new(store.clone(), Duration::from_millis(20));

        // The pending empty snapshot must never overwrite the flush.
        debouncer.schedule(BTreeMap::new());
        debouncer.flush(&sample_store()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[tokio::test]
    async fn future_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        tokio::fs::write(&path, br#"{"version": 99, "eqlogic_store": {}}"#)
            .await
            .unwrap();
        let store = SnapshotStore::new(path);
        assert!(matches!(
            store.load().await,
            Err(StoreError::Version { version: 99, .. })
        ));
    }
}
