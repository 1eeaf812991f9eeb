//! Snapshot persistence for the semantic cache.
//!
//! The whole entry set is written as one JSON document (`key -> PersistedEntry`). Writes go
//! to a sibling temp file that is renamed over the target, so a crash mid-save leaves the
//! previous snapshot intact.

use super::entry::PersistedEntry;
use crate::{Error, ErrorContext, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

pub type Snapshot<V> = BTreeMap<String, PersistedEntry<V>>;

#[derive(Debug)]
pub struct Persister {
    path: PathBuf,
    // Serializes saves (and loads) against each other.
    io_lock: Mutex<()>,
}

impl Persister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn error(&self, msg: impl Into<String>, details: impl Into<String>) -> Error {
        Error::persistence_with_context(
            msg,
            ErrorContext::new()
                .with_source("persister")
                .with_details(format!("{}: {}", self.path.display(), details.into())),
        )
    }

    /// Overwrite the snapshot with `entries`.
    pub async fn save<V: Serialize>(&self, entries: &Snapshot<V>) -> Result<()> {
        let data = serde_json::to_vec(entries)?;
        let _guard = self.io_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.error("cannot create snapshot directory", e.to_string()))?;
        }
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|e| self.error("cannot write snapshot", e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.error("cannot replace snapshot", e.to_string()))?;

        debug!(
            path = %self.path.display(),
            entries = entries.len(),
            bytes = data.len(),
            "cache snapshot saved"
        );
        Ok(())
    }

    /// Read the snapshot, dropping entries already expired at `now`.
    ///
    /// Entries come back ordered by creation time (ties by key), which becomes the scan
    /// order of the rebuilt index. A missing file is an empty snapshot.
    pub async fn load<V: DeserializeOwned>(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(String, PersistedEntry<V>)>> {
        let data = {
            let _guard = self.io_lock.lock().await;
            match tokio::fs::read(&self.path).await {
                Ok(data) => data,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(self.error("cannot read snapshot", e.to_string())),
            }
        };

        let snapshot: Snapshot<V> = serde_json::from_slice(&data)
            .map_err(|e| self.error("snapshot is not valid JSON", e.to_string()))?;
        let total = snapshot.len();

        let mut live: Vec<(String, PersistedEntry<V>)> = snapshot
            .into_iter()
            .filter(|(_, e)| !is_expired(e, now))
            .collect();
        live.sort_by(|(ka, a), (kb, b)| a.created_at.cmp(&b.created_at).then_with(|| ka.cmp(kb)));

        debug!(
            path = %self.path.display(),
            loaded = live.len(),
            dropped_expired = total - live.len(),
            "cache snapshot loaded"
        );
        Ok(live)
    }
}

fn is_expired<V>(entry: &PersistedEntry<V>, now: DateTime<Utc>) -> bool {
    let age_ms = now.timestamp_millis() - entry.created_at.timestamp_millis();
    age_ms > i64::try_from(entry.ttl.as_millis()).unwrap_or(i64::MAX)
}

/// Coalescing trigger for the background save task.
///
/// Holds at most one pending request: while a save runs, any number of triggers collapse
/// into a single follow-up save, which snapshots whatever state exists when it starts.
#[derive(Debug, Clone)]
pub(crate) struct PersistQueue {
    tx: mpsc::Sender<()>,
}

impl PersistQueue {
    pub(crate) fn channel() -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    /// Returns false when the request was folded into one already queued.
    pub(crate) fn request(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}
