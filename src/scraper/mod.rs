//! Scraping engine: the source contract, registry, pagination, network client and error
//! model. Site adapters live in [sources] and [databases].

mod client;
mod error;
mod paged;
mod pool;
mod registry;
mod text;
mod url_builder;

pub mod databases;
pub mod sources;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{
    try_connect, Body, HttpClient, HttpClientBuilder, Method, NetworkClient, PanicError,
    RawResponse, Request,
};
pub use error::{BoxError, ErrorKind, HttpStatusError, Response, ScrapeError};
pub use paged::{IteratorState, PagedList, PagedListIterator};
pub use pool::{search_catalogs, CatalogSearchResult, Task, WorkerPool};
pub use registry::{Capability, RegisteredSource, Registry, RegistryBuilder, RegistryError};
pub use text::TextExtractor;
pub use url_builder::{absolute_url, UrlBuilder};

use crate::model::{BookResult, ChapterContent, ChapterResult};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Containers tried, in order, by the default [Source::get_chapter_text].
const DEFAULT_CONTENT_SELECTORS: &[&str] = &[
    "#chapter-content",
    ".chapter-content",
    "#chr-content",
    ".reading-content",
    "#content",
    "article",
];

/// Content language of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "&'static str")]
pub enum LanguageCode {
    English,
    Indonesian,
    Spanish,
    Portuguese,
    Chinese,
}

impl LanguageCode {
    pub fn code(self) -> &'static str {
        match self {
            LanguageCode::English => "en",
            LanguageCode::Indonesian => "id",
            LanguageCode::Spanish => "es",
            LanguageCode::Portuguese => "pt",
            LanguageCode::Chinese => "zh",
        }
    }
}

impl From<LanguageCode> for &'static str {
    fn from(lang: LanguageCode) -> Self {
        lang.code()
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.code())
    }
}

impl FromStr for LanguageCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(LanguageCode::English),
            "id" | "indonesian" => Ok(LanguageCode::Indonesian),
            "es" | "spanish" => Ok(LanguageCode::Spanish),
            "pt" | "portuguese" => Ok(LanguageCode::Portuguese),
            "zh" | "chinese" => Ok(LanguageCode::Chinese),
            _ => Err(format!("Unknown language code: '{}'", s)),
        }
    }
}

/// Identity and metadata of a source or database. `base_url` always ends with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub id: String,
    pub display_name: String,
    pub base_url: String,
    pub catalog_url: Option<String>,
    pub icon_url: Option<String>,
    pub language: LanguageCode,
}

impl Descriptor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        base_url: &str,
        language: LanguageCode,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            base_url: registry::normalize_url(base_url),
            catalog_url: None,
            icon_url: None,
            language,
        }
    }

    pub fn with_catalog_url(mut self, url: impl Into<String>) -> Self {
        self.catalog_url = Some(url.into());
        self
    }

    pub fn with_icon_url(mut self, url: impl Into<String>) -> Self {
        self.icon_url = Some(url.into());
        self
    }

    /// True when `url` lives under this descriptor's base URL.
    pub fn matches(&self, url: &str) -> bool {
        registry::normalize_url(url).starts_with(&self.base_url)
    }
}

/// Base capability: every source can describe a known book and download its chapters.
///
/// All operations are idempotent from the caller's view and never touch shared state.
/// Async operations may be cancelled by dropping their future.
#[async_trait]
pub trait Source: Send + Sync {
    fn descriptor(&self) -> &Descriptor;

    /// Client used by the provided [Source::fetch_chapter].
    fn client(&self) -> &dyn NetworkClient;

    async fn get_book_cover_image_url(&self, book_url: &str) -> Response<Option<String>>;

    async fn get_book_description(&self, book_url: &str) -> Response<Option<String>>;

    /// Chapters in ascending reading order.
    async fn get_chapter_list(&self, book_url: &str) -> Response<Vec<ChapterResult>>;

    /// Title of an already-fetched chapter page. Default: first non-empty `<h1>`, then
    /// `<title>` without the site-name suffix.
    fn get_chapter_title(&self, doc: &Html) -> Option<String> {
        let h1 = Selector::parse("h1").ok()?;
        let title = Selector::parse("title").ok()?;
        doc.select(&h1)
            .map(inline_text)
            .find(|s| !s.is_empty())
            .or_else(|| {
                let name = &self.descriptor().display_name;
                let suffixes = [format!(" - {}", name), format!(" | {}", name)];
                let suffixes: Vec<&str> = suffixes.iter().map(String::as_str).collect();
                doc.select(&title)
                    .next()
                    .map(|e| strip_title_site_suffix(&inline_text(e), &suffixes))
                    .filter(|s| !s.is_empty())
            })
    }

    /// Normalized text of an already-fetched chapter page. A page without a content
    /// container is a Parsing error.
    fn get_chapter_text(&self, doc: &Html) -> Response<String> {
        for sel in DEFAULT_CONTENT_SELECTORS {
            let sel = selector(sel)?;
            if let Some(el) = doc.select(&sel).next() {
                return Ok(TextExtractor::get(el));
            }
        }
        Err(ScrapeError::parsing("missing chapter content container"))
    }

    /// Download `chapter_url` and apply [Source::get_chapter_title] and
    /// [Source::get_chapter_text] to it.
    async fn fetch_chapter(&self, chapter_url: &str) -> Response<ChapterContent> {
        try_connect("fetch chapter", async {
            let response = self.client().get(chapter_url).await?;
            let doc = response.to_document();
            let title = self.get_chapter_title(&doc);
            let text = self.get_chapter_text(&doc)?;
            Ok::<_, ScrapeError>(ChapterContent { title, text })
        })
        .await
    }
}

/// Catalog capability: browse and search the source's listing, page by page.
///
/// `index` is 0-based. An index past the real last page yields an empty last page.
#[async_trait]
pub trait Catalog: Source {
    async fn get_catalog_list(&self, index: usize) -> Response<PagedList<BookResult>>;

    async fn get_catalog_search(
        &self,
        index: usize,
        input: &str,
    ) -> Response<PagedList<BookResult>>;
}

/// Metadata-only lookup site (no chapters, no catalog browsing).
#[async_trait]
pub trait Database: Send + Sync {
    fn descriptor(&self) -> &Descriptor;

    async fn search_by_title(
        &self,
        index: usize,
        input: &str,
    ) -> Response<PagedList<BookResult>>;

    async fn get_book_description(&self, book_url: &str) -> Response<Option<String>>;
}

/// Parse a CSS selector or return a parse error (avoids panics from Selector::parse).
pub(crate) fn selector(sel: &str) -> Response<Selector> {
    Selector::parse(sel).map_err(|e| ScrapeError::parsing(format!("invalid selector {:?}: {}", sel, e)))
}

/// Element text with whitespace collapsed to single spaces.
pub(crate) fn inline_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Non-empty, trimmed attribute value.
pub(crate) fn attr(el: ElementRef<'_>, name: &str) -> Option<String> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Strip known site suffix from the end of a page title (e.g. " - BoxNovel") so that
/// titles containing " - " in the actual title are preserved.
pub fn strip_title_site_suffix(s: &str, suffixes: &[&str]) -> String {
    let mut t = s.trim();
    for suffix in suffixes {
        if let Some(stripped) = t.strip_suffix(suffix) {
            t = stripped.trim();
            break;
        }
    }
    t.to_string()
}
