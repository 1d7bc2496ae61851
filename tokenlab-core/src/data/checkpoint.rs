//! Cursor checkpoints, one plain-text file per entity.
//!
//! Layout: `{checkpoint_dir}/{entity}.txt`, containing exactly the cursor.
//!
//! Writes are atomic (write to .tmp, fsync, rename into place, fsync the
//! directory), so a reader never sees a truncated cursor after a crash and a
//! completed save survives power loss.

use super::provider::DataError;
use crate::domain::{Cursor, EntityId};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path to the checkpoint file for an entity.
    pub fn path_for(&self, entity: &EntityId) -> PathBuf {
        self.dir.join(format!("{entity}.txt"))
    }

    /// Load the last saved cursor. A missing or blank file means "start fresh".
    pub fn load(&self, entity: &EntityId) -> Result<Option<Cursor>, DataError> {
        let path = self.path_for(entity);
        match fs::read_to_string(&path) {
            Ok(content) => {
                let raw = content.lines().next().unwrap_or("").trim();
                if raw.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Cursor::from_persisted(raw.to_string())))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(DataError::Checkpoint { path, source }),
        }
    }

    /// Replace the saved cursor for an entity.
    pub fn save(&self, entity: &EntityId, cursor: &Cursor) -> Result<(), DataError> {
        let path = self.path_for(entity);
        let tmp_path = path.with_extension("txt.tmp");
        let wrap = |source: io::Error| DataError::Checkpoint {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(wrap)?;

        let write_tmp = || -> io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(cursor.as_str().as_bytes())?;
            file.sync_all()
        };
        write_tmp().map_err(wrap)?;

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            wrap(e)
        })?;

        sync_dir(&self.dir).map_err(wrap)
    }
}

/// Persist the directory entry written by a rename.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
