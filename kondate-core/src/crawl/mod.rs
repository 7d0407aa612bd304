//! The per-site crawl: discover, fetch, parse, publish.
//!
//! Every phase is guarded by persistent membership checks. The detail cache
//! decides what gets fetched and the processed ledger decides what gets
//! published, so an interrupted run can simply be started again.
//!
//! The ledger holds two kinds of entry. A record id (`{page}-{n}`) is
//! appended as soon as that record is published; the bare page id follows
//! once every record of the page is in.

mod report;

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::{info_span, Instrument};

use crate::adapter::SiteAdapter;
use crate::document::{ContentFormat, Document};
use crate::error::{ExtractError, FetchError, PublishError, StoreError};
use crate::http::HttpClient;
use crate::publish::{note_title, NoteRenderer, Publisher};
use crate::recipe::Recipe;
use crate::store::{
    is_reserved_name, DetailStore, FileLedger, FsDetailCache, LocalArchive, ProcessedLedger,
};

pub use report::CrawlReport;

/// What to do when the notes store already holds a note with the same title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingNotePolicy {
    /// Leave the note alone and mark the recipe processed.
    #[default]
    Skip,
    /// Re-render and overwrite the note.
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlOptions {
    /// Ask the publisher for a note with the same title before creating one.
    pub check_existing: bool,
    pub existing_notes: ExistingNotePolicy,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            check_existing: true,
            existing_notes: ExistingNotePolicy::Skip,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PublishOutcome {
    Created,
    Updated,
    Existing,
}

enum PageOutcome {
    /// The stream ran to the end after yielding `records` records.
    Finished { records: usize, failures: usize },
    Malformed(ExtractError),
}

#[derive(Debug, thiserror::Error)]
enum ListingError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Drives one site through a full crawl.
pub struct Crawler<'a> {
    adapter: &'a dyn SiteAdapter,
    client: &'a dyn HttpClient,
    publisher: &'a dyn Publisher,
    renderer: &'a NoteRenderer,
    cache: Box<dyn DetailStore + 'a>,
    ledger: Box<dyn ProcessedLedger + 'a>,
    archive: Option<LocalArchive>,
    options: CrawlOptions,
}

impl<'a> Crawler<'a> {
    /// A crawler using the adapter's configured cache directory and ledger file.
    pub fn new(
        adapter: &'a dyn SiteAdapter,
        client: &'a dyn HttpClient,
        publisher: &'a dyn Publisher,
        renderer: &'a NoteRenderer,
    ) -> Self {
        let settings = adapter.settings();
        Self {
            adapter,
            client,
            publisher,
            renderer,
            cache: Box::new(FsDetailCache::new(settings.cache_dir.clone())),
            ledger: Box::new(FileLedger::new(settings.processed_ledger_path.clone())),
            archive: Some(LocalArchive::for_cache_dir(&settings.cache_dir)),
            options: CrawlOptions::default(),
        }
    }

    pub fn with_cache(mut self, cache: impl DetailStore + 'a) -> Self {
        self.cache = Box::new(cache);
        self
    }

    pub fn with_ledger(mut self, ledger: impl ProcessedLedger + 'a) -> Self {
        self.ledger = Box::new(ledger);
        self
    }

    pub fn with_archive(mut self, archive: Option<LocalArchive>) -> Self {
        self.archive = archive;
        self
    }

    pub fn with_options(mut self, options: CrawlOptions) -> Self {
        self.options = options;
        self
    }

    /// Run all phases. Only failures of the site's own storage are returned;
    /// anything local to one page or one recipe is logged and counted.
    pub async fn run(&self) -> Result<CrawlReport, StoreError> {
        let site = self.adapter.site_name().to_string();
        async {
            let mut report = CrawlReport::default();
            let overviews = self.discover(&mut report).await;
            let mut processed = self.ledger.load()?;
            tracing::debug!(processed = processed.len(), "loaded processed ledger");
            self.fetch_details(&overviews, &processed, &mut report)
                .await?;
            self.parse_and_publish(&overviews, &mut processed, &mut report)
                .await?;
            report.log(&site);
            Ok::<_, StoreError>(report)
        }
        .instrument(info_span!("crawl", site = %site))
        .await
    }

    async fn fetch_document(
        &self,
        url: &str,
        format: ContentFormat,
    ) -> Result<Document, ListingError> {
        let page = self.client.fetch(url).await?;
        Ok(Document::decode(
            &page.body,
            page.content_type.as_deref(),
            format,
        )?)
    }

    /// Collect overview stubs from every entry URL, following each listing's
    /// link chain when the site enables it. Later pages win on duplicate ids.
    pub async fn discover(&self, report: &mut CrawlReport) -> IndexMap<String, Recipe> {
        let settings = self.adapter.settings();
        let mut overviews = IndexMap::new();
        let mut visited = HashSet::new();

        for entry_url in self.adapter.expand_entry_urls() {
            let mut next = Some(entry_url);
            let mut pages = 0;

            while let Some(url) = next.take() {
                if !visited.insert(url.clone()) {
                    tracing::debug!(%url, "listing already visited");
                    break;
                }
                if pages >= settings.max_listing_pages {
                    tracing::warn!(%url, pages, "listing page limit reached");
                    break;
                }
                pages += 1;

                let listing = match self
                    .fetch_document(&url, self.adapter.listing_format())
                    .await
                {
                    Ok(listing) => listing,
                    Err(e) => {
                        tracing::warn!(%url, error = %e, "failed to fetch listing");
                        report.listing_failures += 1;
                        break;
                    }
                };
                report.listing_pages += 1;

                match self.adapter.get_recipe_overviews(&listing, &url) {
                    Ok(found) => {
                        tracing::debug!(%url, count = found.len(), "found overviews");
                        overviews.extend(found);
                    }
                    Err(e) => {
                        tracing::warn!(%url, error = %e, "listing page has unexpected structure");
                        report.listing_failures += 1;
                    }
                }

                if settings.expand_entry_urls {
                    next = self.adapter.previous_listing_url(&listing, &url);
                }
            }
        }

        report.overviews = overviews.len();
        overviews
    }

    /// Download and cache every detail page not seen before.
    pub async fn fetch_details(
        &self,
        overviews: &IndexMap<String, Recipe>,
        processed: &HashSet<String>,
        report: &mut CrawlReport,
    ) -> Result<(), StoreError> {
        for (id, overview) in overviews {
            if processed.contains(id) || self.cache.contains(id) {
                report.fetch_skipped += 1;
                continue;
            }
            match self.client.fetch_bytes(&overview.detail_url).await {
                Ok(body) => {
                    if self.cache.put(id, &body)? {
                        report.fetched += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        id,
                        url = %overview.detail_url,
                        error = %e,
                        "failed to fetch detail page"
                    );
                    report.fetch_failures += 1;
                }
            }
        }
        Ok(())
    }

    /// Parse cached pages in the adapter's order and publish new recipes.
    pub async fn parse_and_publish(
        &self,
        overviews: &IndexMap<String, Recipe>,
        processed: &mut HashSet<String>,
        report: &mut CrawlReport,
    ) -> Result<(), StoreError> {
        let mut names = self.cache.file_names()?;
        names.sort_by_key(|name| self.adapter.cache_sort_key(name));

        for name in names {
            if is_reserved_name(&name) {
                continue;
            }
            if !self.adapter.is_cache_file_valid(&name) {
                tracing::debug!(file = %name, "skipping invalid cache file");
                report.skipped_files += 1;
                continue;
            }
            let id = self.adapter.recipe_id_from_filename(&name);
            if processed.contains(&id) {
                continue;
            }
            let Some(overview) = overviews.get(&id) else {
                tracing::warn!(id, "cached page has no overview in the current listing");
                report.missing_overviews += 1;
                continue;
            };

            let bytes = self.cache.read(&name)?;
            report.parsed_files += 1;
            let outcome = match Document::decode(&bytes, None, self.adapter.detail_format()) {
                Ok(detail) => {
                    self.publish_page(&id, &detail, overview, processed, report)
                        .await?
                }
                Err(e) => PageOutcome::Malformed(e),
            };

            match outcome {
                PageOutcome::Finished { records: 0, .. } => {
                    tracing::debug!(id, "page yielded no recipes");
                }
                PageOutcome::Finished { failures: 0, .. } => {
                    self.ledger.append(&id)?;
                    processed.insert(id);
                }
                PageOutcome::Finished { failures, .. } => {
                    tracing::warn!(id, failures, "page left unprocessed for retry");
                }
                PageOutcome::Malformed(e) => {
                    tracing::warn!(id, error = %e, "detail page has unexpected structure");
                    match self.cache.quarantine(&name) {
                        Ok(_) => report.quarantined += 1,
                        Err(e) => tracing::error!(file = %name, error = %e, "failed to quarantine"),
                    }
                }
            }
        }
        Ok(())
    }

    async fn publish_page(
        &self,
        page_id: &str,
        detail: &Document,
        overview: &Recipe,
        processed: &mut HashSet<String>,
        report: &mut CrawlReport,
    ) -> Result<PageOutcome, StoreError> {
        let mut records = 0;
        let mut failures = 0;

        for item in self.adapter.parse_recipe_details(detail, overview) {
            let recipe = match item {
                Ok(recipe) if recipe.cooking_name.is_none() => {
                    return Ok(PageOutcome::Malformed(ExtractError::MissingField(format!(
                        "cooking_name of {}",
                        recipe.id
                    ))));
                }
                Ok(recipe) => recipe,
                Err(e) => return Ok(PageOutcome::Malformed(e)),
            };
            records += 1;
            if processed.contains(&recipe.id) {
                continue;
            }

            match self.publish(page_id, &recipe).await {
                Ok(outcome) => {
                    match outcome {
                        PublishOutcome::Created => report.created += 1,
                        PublishOutcome::Updated => report.updated += 1,
                        PublishOutcome::Existing => report.existing += 1,
                    }
                    self.ledger.append(&recipe.id)?;
                    processed.insert(recipe.id);
                }
                Err(e) => {
                    tracing::warn!(id = %recipe.id, error = %e, "failed to publish");
                    report.publish_failures += 1;
                    failures += 1;
                }
            }
        }

        Ok(PageOutcome::Finished { records, failures })
    }

    async fn publish(
        &self,
        page_id: &str,
        recipe: &Recipe,
    ) -> Result<PublishOutcome, PublishError> {
        let title = note_title(recipe);

        let existing = if self.options.check_existing {
            self.publisher.find_existing(&title).await?
        } else {
            None
        };

        let outcome = match existing {
            Some(note_id) if self.options.existing_notes == ExistingNotePolicy::Skip => {
                tracing::info!(id = %recipe.id, note_id, %title, "note already exists");
                return Ok(PublishOutcome::Existing);
            }
            Some(note_id) => {
                let note = self.renderer.render(recipe, self.client).await?;
                self.publisher.update(&note_id, &note).await?;
                tracing::info!(id = %recipe.id, note_id, %title, "updated note");
                PublishOutcome::Updated
            }
            None => {
                let note = self.renderer.render(recipe, self.client).await?;
                let note_id = self.publisher.create(&note).await?;
                tracing::info!(id = %recipe.id, note_id, %title, "created note");
                PublishOutcome::Created
            }
        };

        if let Some(archive) = &self.archive {
            if let Err(e) = archive.store(page_id, recipe) {
                tracing::warn!(id = %recipe.id, error = %e, "failed to archive recipe");
            }
        }
        Ok(outcome)
    }
}
