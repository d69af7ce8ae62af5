use crate::{error::PersistError, models::Snapshot, store::LinkStore};
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::{
    fs,
    io::AsyncWriteExt,
    sync::watch,
    task::JoinHandle,
    time::MissedTickBehavior,
};

// ── Snapshot file ──────────────────────────────────────────────────────────

/// JSON snapshot on disk. Writes replace the whole file via a temporary
/// sibling and a rename, so a crash mid-write leaves the previous snapshot
/// intact.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot. `Ok(None)` means the file does not exist yet.
    pub async fn load(&self) -> Result<Option<Snapshot>, PersistError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| PersistError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    pub async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistError> {
        let json = serde_json::to_vec(snapshot).map_err(PersistError::Serialize)?;
        self.write_atomic(&json).await
    }

    /// Sibling the next write goes to: the file name with `.tmp` appended,
    /// so it never equals the snapshot path.
    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn write_atomic(&self, bytes: &[u8]) -> Result<(), PersistError> {
        let write_err = |source| PersistError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let tmp = self.tmp_path();
        let mut file = fs::File::create(&tmp).await.map_err(write_err)?;
        file.write_all(bytes).await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        fs::rename(&tmp, &self.path).await.map_err(write_err)?;
        Ok(())
    }
}

// ── Restore / flush ────────────────────────────────────────────────────────

/// Build the store from the last snapshot, falling back to an empty store
/// when the file is missing or unusable. Never fails.
pub async fn restore(file: &SnapshotFile) -> LinkStore {
    match file.load().await {
        Ok(Some(snapshot)) => {
            let store = LinkStore::from_snapshot(snapshot);
            tracing::info!(
                links = store.len(),
                counter = store.counter(),
                "Restored links from {}",
                file.path().display()
            );
            store
        }
        Ok(None) => {
            tracing::info!("No snapshot at {}, starting empty", file.path().display());
            LinkStore::new()
        }
        Err(e) => {
            tracing::warn!("{e}; starting with an empty store");
            LinkStore::new()
        }
    }
}

/// Write the store to disk if it has unsaved changes.
///
/// Returns whether a write happened. On failure the store is marked dirty
/// again so the next call retries.
pub async fn flush_if_dirty(store: &LinkStore, file: &SnapshotFile) -> Result<bool, PersistError> {
    let Some(snapshot) = store.take_dirty_snapshot() else {
        return Ok(false);
    };

    if let Err(e) = file.save(&snapshot).await {
        store.mark_dirty();
        return Err(e);
    }

    tracing::debug!(counter = snapshot.counter, "Snapshot flushed");
    Ok(true)
}

/// Write the store to disk unconditionally. Used at shutdown.
pub async fn flush_now(store: &LinkStore, file: &SnapshotFile) -> Result<(), PersistError> {
    let had_changes = store.is_dirty();
    let snapshot = store.take_snapshot();

    if let Err(e) = file.save(&snapshot).await {
        store.mark_dirty();
        return Err(e);
    }

    tracing::info!(
        links = snapshot.short_to_record.len(),
        had_changes,
        "Snapshot written to {}",
        file.path().display()
    );
    Ok(())
}

/// Spawn the periodic flush task.
///
/// Flushes on every `interval` tick until `shutdown` changes (or its sender
/// is dropped). Errors are logged and retried on the next tick.
pub fn spawn_flusher(
    store: Arc<LinkStore>,
    file: SnapshotFile,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing to save yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = flush_if_dirty(&store, &file).await {
                        tracing::error!("Periodic flush failed: {e}");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        tracing::debug!("Flush task stopped");
    })
}
