use super::{PersistenceBackend, PersistenceKind};
use crate::error::{Result, StateForgeError};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Snapshot stored as one pretty-printed JSON file per client and store.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `<dir>/<client_id>_<store_name>.json`
    pub fn for_store(dir: &Path, client_id: &str, store_name: &str) -> Self {
        Self::new(store_file_path(dir, client_id, store_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn store_file_path(dir: &Path, client_id: &str, store_name: &str) -> PathBuf {
    dir.join(format!("{}_{}.json", client_id, store_name))
}

impl PersistenceBackend for FileBackend {
    fn kind(&self) -> PersistenceKind {
        PersistenceKind::File
    }

    fn address(&self) -> String {
        self.path.display().to_string()
    }

    fn read_raw(&self) -> Result<Option<Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StateForgeError::Io(e)),
        };

        match serde_json::from_str(&content) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "unparseable store file");
                Ok(None)
            }
        }
    }

    fn write_raw(&self, payload: Value) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| StateForgeError::Store(format!("No parent directory for {}", self.address())))?;
        write_json_atomic(dir, &self.path, &payload)
    }

    fn forget(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StateForgeError::Io(e)),
        }
    }
}

/// Writes through a temp file and rename so readers never see a partial file.
pub(crate) fn write_json_atomic<T: serde::Serialize>(
    dir: &Path,
    target: &Path,
    payload: &T,
) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    let content = serde_json::to_string_pretty(payload)?;
    let tmp_path = dir.join(format!(".stateforge-{}.tmp", Uuid::new_v4()));
    fs::write(&tmp_path, content)?;
    fs::rename(&tmp_path, target)?;
    Ok(())
}

/// Deletes every `<client_id>_*.json` file in `dir`. Returns how many went.
pub fn remove_client_files(dir: &Path, client_id: &str) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let prefix = format!("{}_", client_id);
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .file_name()
            .and_then(|s| s.to_str())
            .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(".json"));
        if matches {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}
