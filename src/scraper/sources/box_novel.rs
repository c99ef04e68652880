//! Box Novel adapter (novlove.com, a Madara-theme WordPress site).
//!
//! Site quirks kept inside this module:
//! - covers are lazy-loaded, the real URL is in `data-src`;
//! - the chapter list comes from a POST to `{book}/ajax/chapters`, newest first;
//! - listings paginate with a `/page/{n}` path segment (first page has none);
//! - the last listing page is the one without the "older posts" (`nav-previous`) link.

use crate::model::{dedup_by_url, BookResult, ChapterResult};
use crate::scraper::{
    attr, inline_text, selector, try_connect, Catalog, Descriptor, LanguageCode,
    NetworkClient, PagedList, Request, Response, ScrapeError, Source, TextExtractor,
    UrlBuilder,
};
use async_trait::async_trait;
use scraper::Html;
use std::sync::Arc;

const BASE_URL: &str = "https://novlove.com/";
const CATALOG_URL: &str = "https://novlove.com/novel/?m_orderby=alphabet";
const ICON_URL: &str = "https://novlove.com/wp-content/uploads/2018/04/box-icon-150x150.png";

/// Listing item containers: catalog pages and search result pages differ.
const CATALOG_ITEM: &str = ".page-item-detail";
const SEARCH_ITEM: &str = ".c-tabs-item__content";

pub struct BoxNovel {
    client: Arc<dyn NetworkClient>,
    descriptor: Descriptor,
}

impl BoxNovel {
    pub fn new(client: Arc<dyn NetworkClient>) -> Self {
        Self {
            client,
            descriptor: Descriptor::new("box_novel", "Box Novel", BASE_URL, LanguageCode::English)
                .with_catalog_url(CATALOG_URL)
                .with_icon_url(ICON_URL),
        }
    }

    fn page_url(&self, index: usize) -> Response<UrlBuilder> {
        let page = index + 1;
        Ok(UrlBuilder::parse(&self.descriptor.base_url)?
            .apply_if(page != 1, |b| b.add_path(&format!("page/{}", page))))
    }
}

fn parse_cover(html: &str) -> Response<Option<String>> {
    let doc = Html::parse_document(html);
    let img = selector("div.summary_image img[data-src]")?;
    Ok(doc.select(&img).next().and_then(|e| attr(e, "data-src")))
}

fn parse_description(html: &str) -> Response<Option<String>> {
    let doc = Html::parse_document(html);
    let summary = selector(".summary__content.show-more")?;
    Ok(doc
        .select(&summary)
        .next()
        .map(TextExtractor::get)
        .filter(|s| !s.is_empty()))
}

/// The site lists newest first; reading order is the reverse.
fn parse_chapter_list(html: &str) -> Response<Vec<ChapterResult>> {
    let doc = Html::parse_fragment(html);
    let link = selector(".wp-manga-chapter > a[href]")?;
    let mut chapters: Vec<ChapterResult> = doc
        .select(&link)
        .filter_map(|a| Some(ChapterResult::new(inline_text(a), attr(a, "href")?)))
        .collect();
    chapters.reverse();
    Ok(chapters)
}

fn parse_listing(html: &str, item_selector: &str, index: usize) -> Response<PagedList<BookResult>> {
    let doc = Html::parse_document(html);
    let item = selector(item_selector)?;
    let link = selector("a[href]")?;
    let cover = selector("img[data-src]")?;
    let older_posts = selector("div.nav-previous.float-left")?;

    let books = doc
        .select(&item)
        .filter_map(|it| {
            let a = it.select(&link).next()?;
            let title = attr(a, "title").unwrap_or_else(|| inline_text(a));
            let cover_url = it
                .select(&cover)
                .next()
                .and_then(|img| attr(img, "data-src"))
                .unwrap_or_default();
            Some(BookResult::new(title, attr(a, "href")?).with_cover(cover_url))
        })
        .collect();
    let is_last_page = doc.select(&older_posts).next().is_none();
    Ok(PagedList::new(dedup_by_url(books), index, is_last_page))
}

#[async_trait]
impl Source for BoxNovel {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn client(&self) -> &dyn NetworkClient {
        self.client.as_ref()
    }

    async fn get_book_cover_image_url(&self, book_url: &str) -> Response<Option<String>> {
        try_connect("box_novel: cover", async {
            let response = self.client.get(book_url).await?;
            parse_cover(&response.body)
        })
        .await
    }

    async fn get_book_description(&self, book_url: &str) -> Response<Option<String>> {
        try_connect("box_novel: description", async {
            let response = self.client.get(book_url).await?;
            parse_description(&response.body)
        })
        .await
    }

    async fn get_chapter_list(&self, book_url: &str) -> Response<Vec<ChapterResult>> {
        try_connect("box_novel: chapter list", async {
            let url = UrlBuilder::parse(book_url)?.add_path("ajax/chapters").build();
            let response = self.client.call(Request::post(url)).await?;
            parse_chapter_list(&response.body)
        })
        .await
    }

    fn get_chapter_title(&self, doc: &Html) -> Option<String> {
        let heading = selector("#chapter-heading").ok()?;
        doc.select(&heading)
            .next()
            .map(inline_text)
            .filter(|s| !s.is_empty())
    }

    fn get_chapter_text(&self, doc: &Html) -> Response<String> {
        let text = selector(".reading-content .text-left")?;
        let fallback = selector(".reading-content")?;
        doc.select(&text)
            .next()
            .or_else(|| doc.select(&fallback).next())
            .map(TextExtractor::get)
            .ok_or_else(|| ScrapeError::parsing("missing .reading-content chapter container"))
    }
}

#[async_trait]
impl Catalog for BoxNovel {
    async fn get_catalog_list(&self, index: usize) -> Response<PagedList<BookResult>> {
        let result = try_connect("box_novel: catalog", async {
            let page = index + 1;
            let url = UrlBuilder::parse(&self.descriptor.base_url)?
                .add_path("novel")
                .apply_if(page != 1, |b| b.add_path(&format!("page/{}", page)))
                .add_query_param("m_orderby", "alphabet")
                .build();
            let response = self.client.get(&url).await?;
            parse_listing(&response.body, CATALOG_ITEM, index)
        })
        .await;
        PagedList::or_empty_past_end(result, index)
    }

    async fn get_catalog_search(
        &self,
        index: usize,
        input: &str,
    ) -> Response<PagedList<BookResult>> {
        if input.trim().is_empty() {
            return Ok(PagedList::empty(index));
        }
        try_connect("box_novel: search", async {
            let url = self
                .page_url(index)?
                .add_query_params([
                    ("s", input.trim()),
                    ("post_type", "wp-manga"),
                    ("op", ""),
                    ("author", ""),
                    ("artist", ""),
                    ("release", ""),
                    ("adult", ""),
                ])
                .build();
            let response = self.client.get(&url).await?;
            parse_listing(&response.body, SEARCH_ITEM, index)
        })
        .await
    }
}
