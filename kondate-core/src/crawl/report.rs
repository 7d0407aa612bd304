/// Outcome counts for one site's crawl.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub listing_pages: usize,
    pub listing_failures: usize,
    pub overviews: usize,
    pub fetched: usize,
    pub fetch_failures: usize,
    /// Stubs whose detail page was already cached or already processed.
    pub fetch_skipped: usize,
    pub parsed_files: usize,
    pub skipped_files: usize,
    pub missing_overviews: usize,
    pub quarantined: usize,
    pub created: usize,
    pub updated: usize,
    pub existing: usize,
    pub publish_failures: usize,
}

impl CrawlReport {
    pub fn published(&self) -> usize {
        self.created + self.updated
    }

    pub fn log(&self, site: &str) {
        tracing::info!(
            site,
            listing_pages = self.listing_pages,
            listing_failures = self.listing_failures,
            overviews = self.overviews,
            fetched = self.fetched,
            fetch_failures = self.fetch_failures,
            fetch_skipped = self.fetch_skipped,
            parsed_files = self.parsed_files,
            skipped_files = self.skipped_files,
            missing_overviews = self.missing_overviews,
            quarantined = self.quarantined,
            created = self.created,
            updated = self.updated,
            existing = self.existing,
            publish_failures = self.publish_failures,
            "crawl finished"
        );
    }
}
