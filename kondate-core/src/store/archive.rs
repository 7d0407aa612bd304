use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::StoreError;
use crate::recipe::Recipe;

/// Published recipes as JSON, one file per detail page.
///
/// Each file maps cooking name to record, so re-publishing a record from
/// the same page replaces the old entry of the same name.
pub struct LocalArchive {
    dir: PathBuf,
}

impl LocalArchive {
    pub const DIR_NAME: &'static str = "_json";

    /// Archive under `{cache_dir}/_json`.
    pub fn for_cache_dir(cache_dir: &Path) -> Self {
        Self {
            dir: cache_dir.join(Self::DIR_NAME),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        if id.is_empty() || id.contains(['/', '\\']) {
            return Err(StoreError::InvalidKey(id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }

    pub fn load(&self, id: &str) -> Result<IndexMap<String, Recipe>, StoreError> {
        let path = self.path_for(id)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(IndexMap::new()),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        serde_json::from_str(&content).map_err(|source| StoreError::Archive { path, source })
    }

    pub fn store(&self, page_id: &str, recipe: &Recipe) -> Result<(), StoreError> {
        let path = self.path_for(page_id)?;
        let mut recipes = self.load(page_id)?;
        recipes.insert(recipe.display_name().to_string(), recipe.clone());

        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let json = serde_json::to_string_pretty(&recipes).map_err(|source| StoreError::Archive {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|e| StoreError::io(&path, e))?;
        tracing::debug!(id = %recipe.id, file = %path.display(), "archived recipe");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::RecipeText;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn store_merges_by_cooking_name() {
        let dir = tempfile::tempdir().unwrap();
        let archive = LocalArchive::for_cache_dir(dir.path());

        let stub = Recipe::overview("20200101", "https://example.com/1", "番組");
        let mut recipe = stub
            .derive(0)
            .with_cooking_name("肉じゃが")
            .with_program_date(NaiveDate::from_ymd_opt(2020, 1, 1));
        recipe.materials.push(RecipeText::new("じゃがいも: 2個"));
        archive.store(&stub.id, &recipe).unwrap();

        let other = stub.derive(1).with_cooking_name("豚汁");
        archive.store(&stub.id, &other).unwrap();
        archive.store(&stub.id, &recipe).unwrap();

        let loaded = archive.load("20200101").unwrap();
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["肉じゃが", "豚汁"]);
        assert_eq!(loaded["肉じゃが"], recipe);
        assert!(dir.path().join("_json").join("20200101.json").is_file());
    }

    #[test]
    fn corrupt_archive_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = LocalArchive::for_cache_dir(dir.path());
        fs::create_dir_all(archive.dir()).unwrap();
        fs::write(archive.dir().join("1.json"), "{not json").unwrap();
        assert!(matches!(archive.load("1"), Err(StoreError::Archive { .. })));
    }
}
