//! MTL Novel adapter (mtlnovels.com). Pages are AMP, so covers are `amp-img`.

use crate::model::{BookResult, ChapterResult};
use crate::scraper::{
    attr, inline_text, selector, try_connect, Catalog, Descriptor, LanguageCode,
    NetworkClient, PagedList, Response, ScrapeError, Source, TextExtractor, UrlBuilder,
};
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use serde::Deserialize;
use std::sync::Arc;

const BASE_URL: &str = "https://www.mtlnovels.com/";
const CATALOG_URL: &str = "https://www.mtlnovels.com/alltime-rank/";
const SEARCH_ORIGIN: &str = "https://www.mtlnovels.com";

pub struct MtlNovel {
    client: Arc<dyn NetworkClient>,
    descriptor: Descriptor,
}

impl MtlNovel {
    pub fn new(client: Arc<dyn NetworkClient>) -> Self {
        Self {
            client,
            descriptor: Descriptor::new("mtlnovel", "MTL Novel", BASE_URL, LanguageCode::English)
                .with_catalog_url(CATALOG_URL),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Autosuggest {
    #[serde(default)]
    items: Vec<AutosuggestGroup>,
}

#[derive(Debug, Deserialize)]
struct AutosuggestGroup {
    #[serde(default)]
    results: Vec<AutosuggestHit>,
}

#[derive(Debug, Deserialize)]
struct AutosuggestHit {
    /// Contains highlight markup around the matched words.
    title: String,
    permalink: String,
    #[serde(default)]
    thumbnail: String,
}

fn parse_cover(html: &str) -> Response<Option<String>> {
    let doc = Html::parse_document(html);
    let img = selector("amp-img.main-tmb[src]")?;
    Ok(doc.select(&img).next().and_then(|e| attr(e, "src")))
}

fn parse_description(html: &str) -> Response<Option<String>> {
    let doc = Html::parse_document(html);
    let desc = selector(".desc")?;
    let heading = selector("h2")?;
    let alt_names = selector("p.descr")?;
    Ok(doc
        .select(&desc)
        .next()
        .map(|e| TextExtractor::get_excluding(e, &[&heading, &alt_names])))
}

fn parse_chapter_list(html: &str) -> Response<Vec<ChapterResult>> {
    let doc = Html::parse_document(html);
    let link = selector("a.ch-link[href]")?;
    let mut chapters: Vec<ChapterResult> = doc
        .select(&link)
        .filter_map(|a| Some(ChapterResult::new(inline_text(a), attr(a, "href")?)))
        .collect();
    chapters.reverse();
    Ok(chapters)
}

/// Last page when there is no pagination bar, or the bar ends in the current-page
/// `<span>` instead of a "next" link.
fn is_last_catalog_page(doc: &Html) -> Response<bool> {
    let pagination = selector("div#pagination")?;
    Ok(match doc.select(&pagination).next() {
        None => true,
        Some(nav) => nav
            .children()
            .filter_map(ElementRef::wrap)
            .last()
            .map_or(true, |last| last.value().name() == "span"),
    })
}

fn parse_catalog(html: &str, index: usize) -> Response<PagedList<BookResult>> {
    let doc = Html::parse_document(html);
    let item = selector(".box.wide")?;
    let link = selector("a.list-title[href]")?;
    let cover = selector("amp-img")?;

    let books = doc
        .select(&item)
        .filter_map(|it| {
            let a = it.select(&link).next()?;
            let title = attr(a, "aria-label").unwrap_or_else(|| inline_text(a));
            let cover_url = it.select(&cover).next().and_then(|e| attr(e, "src"));
            Some(BookResult::new(title, attr(a, "href")?).with_cover(cover_url.unwrap_or_default()))
        })
        .collect();
    Ok(PagedList::new(books, index, is_last_catalog_page(&doc)?))
}

fn parse_search(body: &str, index: usize) -> Response<PagedList<BookResult>> {
    let response: Autosuggest = serde_json::from_str(body)?;
    let group = response
        .items
        .into_iter()
        .next()
        .ok_or_else(|| ScrapeError::parsing("autosuggest response has no result group"))?;
    let books = group
        .results
        .into_iter()
        .map(|hit| {
            let title = inline_text(Html::parse_fragment(&hit.title).root_element());
            BookResult::new(title, hit.permalink).with_cover(hit.thumbnail)
        })
        .collect();
    Ok(PagedList::new(books, index, true))
}

#[async_trait]
impl Source for MtlNovel {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn client(&self) -> &dyn NetworkClient {
        self.client.as_ref()
    }

    async fn get_book_cover_image_url(&self, book_url: &str) -> Response<Option<String>> {
        try_connect("mtlnovel: cover", async {
            let response = self.client.get(book_url).await?;
            parse_cover(&response.body)
        })
        .await
    }

    async fn get_book_description(&self, book_url: &str) -> Response<Option<String>> {
        try_connect("mtlnovel: description", async {
            let response = self.client.get(book_url).await?;
            parse_description(&response.body)
        })
        .await
    }

    async fn get_chapter_list(&self, book_url: &str) -> Response<Vec<ChapterResult>> {
        try_connect("mtlnovel: chapter list", async {
            // The chapter list 404s without the trailing slash.
            let url = UrlBuilder::parse(book_url)?
                .add_path("chapter-list")
                .trailing_slash()
                .build();
            let response = self.client.get(&url).await?;
            parse_chapter_list(&response.body)
        })
        .await
    }

    fn get_chapter_title(&self, _doc: &Html) -> Option<String> {
        None
    }

    fn get_chapter_text(&self, doc: &Html) -> Response<String> {
        let body = selector(".par.fontsize-16")?;
        doc.select(&body)
            .next()
            .map(TextExtractor::get)
            .ok_or_else(|| ScrapeError::parsing("missing .par chapter container"))
    }
}

#[async_trait]
impl Catalog for MtlNovel {
    async fn get_catalog_list(&self, index: usize) -> Response<PagedList<BookResult>> {
        let result = try_connect("mtlnovel: catalog", async {
            let page = index + 1;
            let url = UrlBuilder::parse(CATALOG_URL)?
                .apply_if(page != 1, |b| b.add_path(&format!("page/{}", page)))
                .build();
            let response = self.client.get(&url).await?;
            parse_catalog(&response.body, index)
        })
        .await;
        PagedList::or_empty_past_end(result, index)
    }

    async fn get_catalog_search(
        &self,
        index: usize,
        input: &str,
    ) -> Response<PagedList<BookResult>> {
        if input.trim().is_empty() || index > 0 {
            return Ok(PagedList::empty(index));
        }
        try_connect("mtlnovel: search", async {
            let url = UrlBuilder::parse(BASE_URL)?
                .add_path("wp-admin/admin-ajax.php")
                .add_query_params([
                    ("action", "autosuggest"),
                    ("q", input),
                    ("__amp_source_origin", SEARCH_ORIGIN),
                ])
                .build();
            let response = self.client.get(&url).await?;
            parse_search(&response.body, index)
        })
        .await
    }
}
