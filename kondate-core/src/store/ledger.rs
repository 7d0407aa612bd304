use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StoreError;

use super::ProcessedLedger;

/// Plain text ledger, one id per line.
pub struct FileLedger {
    path: PathBuf,
}

impl FileLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProcessedLedger for FileLedger {
    /// A missing file is an empty ledger.
    fn load(&self) -> Result<HashSet<String>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    fn append(&self, id: &str) -> Result<(), StoreError> {
        if id.is_empty() || id.contains(['\n', '\r']) {
            return Err(StoreError::InvalidKey(id.to_string()));
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        writeln!(file, "{}", id).map_err(|e| StoreError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::new(dir.path().join("_site_processed_data.txt"));
        assert!(ledger.load().unwrap().is_empty());
    }

    #[test]
    fn append_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.txt");
        let ledger = FileLedger::new(&path);

        ledger.append("20200101").unwrap();
        ledger.append("20200101-2").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "20200101\n20200101-2\n");
        let ids = ledger.load().unwrap();
        assert!(ids.contains("20200101"));
        assert!(ids.contains("20200101-2"));
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn load_ignores_blank_lines_and_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.txt");
        fs::write(&path, "1\n\n  2 \r\n").unwrap();
        let ids = FileLedger::new(&path).load().unwrap();
        assert_eq!(ids, HashSet::from(["1".to_string(), "2".to_string()]));
    }

    #[test]
    fn append_rejects_multiline_ids() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::new(dir.path().join("ledger.txt"));
        assert!(matches!(ledger.append("a\nb"), Err(StoreError::InvalidKey(_))));
    }
}
