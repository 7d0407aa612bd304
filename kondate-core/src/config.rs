//! Site configuration (YAML) and the notes service credential (JSON).

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::adapter::SiteSettings;
use crate::error::ConfigError;

/// Ledger file name suffix, appended to `_{site}`.
pub const DEFAULT_PROCESSED_LIST_POSTFIX: &str = "_processed_data.txt";

fn default_true() -> bool {
    true
}

fn default_max_listing_pages() -> usize {
    SiteSettings::DEFAULT_MAX_LISTING_PAGES
}

/// One site's entry in the sites file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub program_name: String,
    #[serde(default)]
    pub entry_urls: Vec<String>,
    /// Relative to the work directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_list_filename: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_names: Vec<String>,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default, alias = "is_expand_entry_urls")]
    pub expand_entry_urls: bool,
    #[serde(default = "default_max_listing_pages")]
    pub max_listing_pages: usize,
}

impl SiteConfig {
    /// Resolve paths against `work_dir`.
    pub fn to_settings(&self, site_name: &str, work_dir: &Path, postfix: &str) -> SiteSettings {
        let mut settings = SiteSettings::new(
            site_name,
            self.program_name.as_str(),
            work_dir,
            self.entry_urls.clone(),
        )
        .with_processed_ledger_path(
            self.processed_list_filename
                .clone()
                .unwrap_or_else(|| work_dir.join(format!("_{}{}", site_name, postfix))),
        )
        .with_expand_entry_urls(self.expand_entry_urls)
        .with_tag_names(self.tag_names.clone());
        if let Some(cache_dir) = &self.cache_dir {
            settings = settings.with_cache_dir(work_dir.join(cache_dir));
        }
        settings.max_listing_pages = self.max_listing_pages;
        settings
    }
}

/// Every configured site, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SitesConfig {
    sites: IndexMap<String, SiteConfig>,
}

impl SitesConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()))
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_yaml(&content, path)
    }

    /// `origin` is only used in error messages.
    pub fn from_yaml(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn get(&self, site_name: &str) -> Option<&SiteConfig> {
        self.sites.get(site_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SiteConfig)> {
        self.sites.iter().map(|(name, site)| (name.as_str(), site))
    }

    /// Sites to run.
    ///
    /// With no names, every enabled site in file order. Named sites run even
    /// when disabled; names missing from the file are warned about and dropped.
    pub fn select<'a>(&'a self, names: &[String]) -> Vec<(&'a str, &'a SiteConfig)> {
        if names.is_empty() {
            return self.iter().filter(|(_, site)| site.enable).collect();
        }
        let mut selected: Vec<(&str, &SiteConfig)> = Vec::new();
        for name in names {
            match self.sites.get_key_value(name) {
                Some((key, site)) => {
                    if !selected.iter().any(|(n, _)| *n == key.as_str()) {
                        selected.push((key.as_str(), site));
                    }
                }
                None => tracing::warn!(site = %name, "site not found in config"),
            }
        }
        selected
    }

    /// The subset whose site name or program name contains any filter.
    /// No filters keeps everything.
    pub fn filtered(&self, filters: &[String]) -> SitesConfig {
        let sites = self
            .sites
            .iter()
            .filter(|(name, site)| {
                filters.is_empty()
                    || filters.iter().any(|f| {
                        name.contains(f.as_str()) || site.program_name.contains(f.as_str())
                    })
            })
            .map(|(name, site)| (name.clone(), site.clone()))
            .collect();
        SitesConfig { sites }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// The `notes` section of the credential file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotesCredential {
    pub endpoint: String,
    pub token: String,
    pub notebook_name: String,
    #[serde(default = "default_true")]
    pub enable: bool,
}

#[derive(Deserialize)]
struct CredentialFile {
    notes: Option<NotesCredential>,
}

impl NotesCredential {
    /// Load the credential, failing if the file, the section, or its fields
    /// are missing, or if it is disabled.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::MissingCredential(format!(
                    "credential file not found: {}",
                    path.display()
                )))
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let file: CredentialFile =
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        let credential = file.notes.ok_or_else(|| {
            ConfigError::MissingCredential(format!("no \"notes\" section in {}", path.display()))
        })?;
        if !credential.enable {
            return Err(ConfigError::MissingCredential(format!(
                "\"notes\" is disabled in {}",
                path.display()
            )));
        }
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SITES: &str = r#"
tbs_obigohan:
  program_name: おびゴハン！
  entry_urls:
    - https://www.tbs.co.jp/obigohan/recipe/
  is_expand_entry_urls: true
  tag_names: [TBS]
nhk_umai:
  program_name: うまいッ！
  enable: false
  entry_urls:
    - https://www.nhk.or.jp/umai-blog/
danshigohan:
  program_name: 男子ごはん
  cache_dir: cache/danshi
  processed_list_filename: /data/danshi.txt
  max_listing_pages: 3
"#;

    fn sites() -> SitesConfig {
        SitesConfig::from_yaml(SITES, Path::new("config.yml")).unwrap()
    }

    fn names(selected: Vec<(&str, &SiteConfig)>) -> Vec<String> {
        selected.into_iter().map(|(n, _)| n.to_string()).collect()
    }

    #[test]
    fn defaults_and_aliases() {
        let sites = sites();
        let obi = sites.get("tbs_obigohan").unwrap();
        assert!(obi.enable);
        assert!(obi.expand_entry_urls);
        assert_eq!(obi.max_listing_pages, 50);
        assert_eq!(obi.tag_names, vec!["TBS"]);

        let danshi = sites.get("danshigohan").unwrap();
        assert!(danshi.entry_urls.is_empty());
        assert_eq!(danshi.max_listing_pages, 3);
    }

    #[test]
    fn select_all_enabled_in_file_order() {
        assert_eq!(names(sites().select(&[])), vec!["tbs_obigohan", "danshigohan"]);
    }

    #[test]
    fn select_named_ignores_enable_and_unknown() {
        let sites = sites();
        let selected = sites.select(&[
            "nhk_umai".to_string(),
            "missing".to_string(),
            "nhk_umai".to_string(),
        ]);
        assert_eq!(names(selected), vec!["nhk_umai"]);
    }

    #[test]
    fn filtered_matches_site_or_program_name() {
        let sites = sites();
        let by_program = sites.filtered(&["男子".to_string()]);
        assert_eq!(names(by_program.iter().collect()), vec!["danshigohan"]);
        let by_site = sites.filtered(&["nhk".to_string(), "tbs".to_string()]);
        assert_eq!(names(by_site.iter().collect()), vec!["tbs_obigohan", "nhk_umai"]);
        assert_eq!(sites.filtered(&[]).iter().count(), 3);
    }

    #[test]
    fn settings_resolve_paths() {
        let sites = sites();
        let work_dir = Path::new("/work");

        let obi = sites
            .get("tbs_obigohan")
            .unwrap()
            .to_settings("tbs_obigohan", work_dir, "_test.txt");
        assert_eq!(obi.cache_dir, PathBuf::from("/work/tbs_obigohan"));
        assert_eq!(obi.processed_ledger_path, PathBuf::from("/work/_tbs_obigohan_test.txt"));
        assert!(obi.expand_entry_urls);

        let danshi = sites.get("danshigohan").unwrap().to_settings(
            "danshigohan",
            work_dir,
            DEFAULT_PROCESSED_LIST_POSTFIX,
        );
        assert_eq!(danshi.cache_dir, PathBuf::from("/work/cache/danshi"));
        assert_eq!(danshi.processed_ledger_path, PathBuf::from("/data/danshi.txt"));
        assert_eq!(danshi.max_listing_pages, 3);
    }

    #[test]
    fn missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        assert!(matches!(SitesConfig::load(&path), Err(ConfigError::NotFound(p)) if p == path));
    }

    #[test]
    fn invalid_yaml() {
        let err = SitesConfig::from_yaml("site: [", Path::new("bad.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn credential_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credential.json");

        assert!(matches!(
            NotesCredential::load(&path),
            Err(ConfigError::MissingCredential(_))
        ));

        fs::write(&path, r#"{"other": {}}"#).unwrap();
        assert!(matches!(
            NotesCredential::load(&path),
            Err(ConfigError::MissingCredential(_))
        ));

        fs::write(
            &path,
            r#"{"notes": {"endpoint": "https://n", "token": "t", "notebook_name": "レシピ", "enable": false}}"#,
        )
        .unwrap();
        assert!(matches!(
            NotesCredential::load(&path),
            Err(ConfigError::MissingCredential(_))
        ));

        fs::write(
            &path,
            r#"{"notes": {"endpoint": "https://n", "token": "t", "notebook_name": "レシピ"}}"#,
        )
        .unwrap();
        let credential = NotesCredential::load(&path).unwrap();
        assert_eq!(credential.notebook_name, "レシピ");
        assert!(credential.enable);
    }
}
