//! The capability set every site adapter implements.
//!
//! Sites differ in markup shape, not in process. Each adapter is a bundle of
//! pure functions over a fetched [`Document`]; the crawl, cache and publish
//! state machine in [`crate::crawl`] is shared by all of them.

mod registry;

use std::path::PathBuf;

use indexmap::IndexMap;

use crate::document::{ContentFormat, Document};
use crate::error::ExtractError;
use crate::recipe::Recipe;

pub use registry::{AdapterFactory, AdapterRegistry};

/// Lazily produced records from one detail page. A failure item ends the page.
pub type RecipeStream<'a> = Box<dyn Iterator<Item = Result<Recipe, ExtractError>> + 'a>;

/// Everything an adapter is configured with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteSettings {
    pub site_name: String,
    pub program_name: String,
    pub cache_dir: PathBuf,
    pub entry_urls: Vec<String>,
    pub processed_ledger_path: PathBuf,
    /// Follow each listing's link chain during discovery.
    pub expand_entry_urls: bool,
    pub max_listing_pages: usize,
    pub tag_names: Vec<String>,
}

impl SiteSettings {
    pub const DEFAULT_MAX_LISTING_PAGES: usize = 50;

    /// Settings with the conventional cache and ledger locations under `work_dir`.
    pub fn new(
        site_name: impl Into<String>,
        program_name: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        entry_urls: Vec<String>,
    ) -> Self {
        let site_name = site_name.into();
        let work_dir = work_dir.into();
        Self {
            cache_dir: work_dir.join(&site_name),
            processed_ledger_path: work_dir.join(format!("_{}_processed_data.txt", site_name)),
            site_name,
            program_name: program_name.into(),
            entry_urls,
            expand_entry_urls: false,
            max_listing_pages: Self::DEFAULT_MAX_LISTING_PAGES,
            tag_names: Vec::new(),
        }
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    pub fn with_processed_ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.processed_ledger_path = path.into();
        self
    }

    pub fn with_expand_entry_urls(mut self, expand: bool) -> Self {
        self.expand_entry_urls = expand;
        self
    }

    pub fn with_tag_names(mut self, tag_names: Vec<String>) -> Self {
        self.tag_names = tag_names;
        self
    }
}

/// Ordering key for cache file names.
///
/// Numeric names sort numerically and before any textual name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum CacheKey {
    Number(u64),
    Text(String),
}

impl CacheKey {
    pub fn from_name(name: &str) -> Self {
        match name.parse::<u64>() {
            Ok(n) if is_digits(name) => CacheKey::Number(n),
            _ => CacheKey::Text(name.to_string()),
        }
    }
}

pub(crate) fn is_digits(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

/// Per-site extraction rules.
pub trait SiteAdapter: Send + Sync {
    fn settings(&self) -> &SiteSettings;

    fn site_name(&self) -> &str {
        &self.settings().site_name
    }

    fn program_name(&self) -> &str {
        &self.settings().program_name
    }

    /// The configured entry URLs, de-duplicated, in order.
    fn expand_entry_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for url in &self.settings().entry_urls {
            if !urls.contains(url) {
                urls.push(url.clone());
            }
        }
        urls
    }

    /// The "previous page" link of a listing page, if the site has one.
    fn previous_listing_url(&self, _listing: &Document, _page_url: &str) -> Option<String> {
        None
    }

    fn listing_format(&self) -> ContentFormat {
        ContentFormat::Html
    }

    fn detail_format(&self) -> ContentFormat {
        ContentFormat::Html
    }

    /// Overview stubs from one listing page, keyed by id.
    fn get_recipe_overviews(
        &self,
        listing: &Document,
        source_url: &str,
    ) -> Result<IndexMap<String, Recipe>, ExtractError>;

    /// Finished records from one cached detail page.
    ///
    /// Records are derived from `overview` with [`Recipe::derive`]; the stub
    /// itself is never modified.
    fn parse_recipe_details<'a>(
        &'a self,
        detail: &'a Document,
        overview: &'a Recipe,
    ) -> RecipeStream<'a>;

    fn recipe_id_from_filename(&self, name: &str) -> String {
        name.to_string()
    }

    fn is_cache_file_valid(&self, name: &str) -> bool {
        is_digits(name)
    }

    fn cache_sort_key(&self, name: &str) -> CacheKey {
        CacheKey::from_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain(SiteSettings);

    impl SiteAdapter for Plain {
        fn settings(&self) -> &SiteSettings {
            &self.0
        }

        fn get_recipe_overviews(
            &self,
            _listing: &Document,
            _source_url: &str,
        ) -> Result<IndexMap<String, Recipe>, ExtractError> {
            Ok(IndexMap::new())
        }

        fn parse_recipe_details<'a>(
            &'a self,
            _detail: &'a Document,
            overview: &'a Recipe,
        ) -> RecipeStream<'a> {
            Box::new(std::iter::once(Ok(overview.derive(0))))
        }
    }

    fn plain() -> Plain {
        Plain(SiteSettings::new(
            "plain",
            "番組",
            "/tmp/work",
            vec![
                "https://example.com/b".to_string(),
                "https://example.com/a".to_string(),
                "https://example.com/b".to_string(),
            ],
        ))
    }

    #[test]
    fn settings_default_paths() {
        let settings = plain().0;
        assert_eq!(settings.cache_dir, PathBuf::from("/tmp/work/plain"));
        assert_eq!(
            settings.processed_ledger_path,
            PathBuf::from("/tmp/work/_plain_processed_data.txt")
        );
        assert_eq!(settings.max_listing_pages, 50);
    }

    #[test]
    fn entry_urls_deduplicated_in_order() {
        assert_eq!(
            plain().expand_entry_urls(),
            vec!["https://example.com/b", "https://example.com/a"]
        );
    }

    #[test]
    fn default_cache_file_rules() {
        let adapter = plain();
        assert!(adapter.is_cache_file_valid("20200101"));
        assert!(!adapter.is_cache_file_valid("_20200101"));
        assert!(!adapter.is_cache_file_valid(""));
        assert!(!adapter.is_cache_file_valid("abc"));
        assert_eq!(adapter.recipe_id_from_filename("20200101"), "20200101");
    }

    #[test]
    fn numeric_sort_keys() {
        let adapter = plain();
        let mut names = vec!["100", "9", "abc", "20"];
        names.sort_by_key(|n| adapter.cache_sort_key(n));
        assert_eq!(names, vec!["9", "20", "100", "abc"]);
    }
}
