//! novelscrape: browse, search and read web novels through per-site scraping adapters.

pub mod cli;
pub mod config;
pub mod logging;
pub mod model;
pub mod scraper;

// Re-exports for CLI and consumers.
pub use model::{BookResult, ChapterContent, ChapterResult};
pub use scraper::{
    search_catalogs, Catalog, Database, Descriptor, ErrorKind, HttpClient, LanguageCode,
    NetworkClient, PagedList, PagedListIterator, Registry, Response, ScrapeError, Source,
    WorkerPool,
};
