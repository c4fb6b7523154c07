//! JSON file snapshot store.
//!
//! One file per session: `<dir>/<session_id>.json`. Saves write a sibling
//! temporary file and rename it over the target, so a crash mid-write leaves
//! the previous snapshot intact. All file I/O goes through `tokio::fs`.

use crate::{HubSnapshot, SnapshotStore};
use ::async_trait::async_trait;
use concord_core::{ConcordError, ConcordResult, StorageError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Snapshot store writing one JSON document per session into a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    /// Runs once at startup, before the hub serves any call.
    pub fn new(dir: impl Into<PathBuf>) -> ConcordResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            ConcordError::Storage(StorageError::WriteFailed {
                session: String::new(),
                reason: format!("cannot create {}: {}", dir.display(), e),
            })
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the snapshot file for `session_id`.
    /// Path separators in the session id are replaced so the file stays inside `dir`.
    pub fn path_for(&self, session_id: &str) -> PathBuf {
        let file_name: String = session_id
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' => '_',
                c => c,
            })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

fn write_failed(session: &str, e: impl std::fmt::Display) -> ConcordError {
    ConcordError::Storage(StorageError::WriteFailed {
        session: session.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn save(&self, snapshot: &HubSnapshot) -> ConcordResult<()> {
        let session = snapshot.session_id.as_str();
        let json = snapshot.to_json()?;
        let target = self.path_for(session);
        let tmp = target.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp)
            .await
            .map_err(|e| write_failed(session, e))?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| write_failed(session, e))?;
        file.sync_all().await.map_err(|e| write_failed(session, e))?;
        drop(file);

        fs::rename(&tmp, &target)
            .await
            .map_err(|e| write_failed(session, e))?;
        debug!(session_id = %session, path = %target.display(), "Snapshot flushed");
        Ok(())
    }

    async fn load(&self, session_id: &str) -> ConcordResult<Option<HubSnapshot>> {
        let path = self.path_for(session_id);
        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ConcordError::Storage(StorageError::ReadFailed {
                    session: session_id.to_string(),
                    reason: e.to_string(),
                }))
            }
        };
        HubSnapshot::from_json(session_id, &json).map(Some)
    }
}
