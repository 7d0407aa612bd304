use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StoreError;

use super::{is_reserved_name, DetailStore};

const QUARANTINE_PREFIX: char = '_';

/// Flat directory of raw detail pages. The file name is the recipe id.
pub struct FsDetailCache {
    dir: PathBuf,
}

impl FsDetailCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return Err(StoreError::InvalidKey(name.to_string()));
        }
        Ok(self.dir.join(name))
    }
}

impl DetailStore for FsDetailCache {
    fn contains(&self, id: &str) -> bool {
        let Ok(path) = self.path_for(id) else {
            return false;
        };
        // The first quarantine always takes the single-underscore name.
        path.exists() || self.dir.join(format!("{}{}", QUARANTINE_PREFIX, id)).exists()
    }

    fn put(&self, id: &str, data: &[u8]) -> Result<bool, StoreError> {
        if is_reserved_name(id) {
            return Err(StoreError::InvalidKey(id.to_string()));
        }
        let path = self.path_for(id)?;
        if path.exists() {
            return Ok(false);
        }

        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        // Readers skip dot-prefixed names, so a partial write is never parsed.
        let tmp = self.dir.join(format!(".{}.tmp", id));
        fs::write(&tmp, data).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))?;

        tracing::debug!(file = %path.display(), bytes = data.len(), "cached detail page");
        Ok(true)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(name)?;
        fs::read(&path).map_err(|e| StoreError::io(&path, e))
    }

    fn file_names(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.dir, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn quarantine(&self, name: &str) -> Result<String, StoreError> {
        let from = self.path_for(name)?;
        let mut prefix = QUARANTINE_PREFIX.to_string();
        loop {
            let new_name = format!("{}{}", prefix, name);
            let to = self.dir.join(&new_name);
            if !to.exists() {
                fs::rename(&from, &to).map_err(|e| StoreError::io(&from, e))?;
                tracing::info!(from = name, to = %new_name, "quarantined cache file");
                return Ok(new_name);
            }
            prefix.push(QUARANTINE_PREFIX);
        }
    }
}
