pub mod adapter;
pub mod config;
pub mod crawl;
pub mod document;
pub mod error;
pub mod http;
pub mod publish;
pub mod recipe;
pub mod sites;
pub mod store;
pub mod text;

pub use adapter::{AdapterRegistry, CacheKey, RecipeStream, SiteAdapter, SiteSettings};
pub use config::{NotesCredential, SiteConfig, SitesConfig};
pub use crawl::{CrawlOptions, CrawlReport, Crawler, ExistingNotePolicy};
pub use document::{ContentFormat, Document};
pub use error::{ConfigError, ExtractError, FetchError, PublishError, StoreError};
pub use http::{HttpClient, MockClient, ReqwestClient, ReqwestClientBuilder};
pub use publish::{
    EnexExporter, NoteDocument, NoteRenderer, NoteServiceClient, Publisher, RecordingPublisher,
};
pub use recipe::{Recipe, RecipeText};
pub use sites::default_registry;
pub use store::{DetailStore, FileLedger, FsDetailCache, LocalArchive, ProcessedLedger};
