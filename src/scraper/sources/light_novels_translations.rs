//! Light Novels Translations adapter.
//!
//! Book page: `https://lightnovelstranslations.com/the-sage-summoned-to-another-world/`.
//! Search goes through the site's header autocomplete endpoint, which returns a single
//! page of `[id, title, url, cover]` rows.

use crate::model::{BookResult, ChapterResult};
use crate::scraper::{
    attr, inline_text, selector, try_connect, Catalog, Descriptor, LanguageCode,
    NetworkClient, PagedList, Response, ScrapeError, Source, TextExtractor, UrlBuilder,
};
use async_trait::async_trait;
use scraper::Html;
use serde_json::Value;
use std::sync::Arc;

const BASE_URL: &str = "https://lightnovelstranslations.com/";
const ICON_URL: &str =
    "https://i0.wp.com/lightnovelstranslations.com/wp-content/uploads/2020/12/cropped-favicon-32px.png";

pub struct LightNovelsTranslations {
    client: Arc<dyn NetworkClient>,
    descriptor: Descriptor,
}

impl LightNovelsTranslations {
    pub fn new(client: Arc<dyn NetworkClient>) -> Self {
        Self {
            client,
            descriptor: Descriptor::new(
                "light_novel_translations",
                "Light Novels Translations",
                BASE_URL,
                LanguageCode::English,
            )
            .with_catalog_url(BASE_URL)
            .with_icon_url(ICON_URL),
        }
    }
}

fn parse_cover(html: &str) -> Response<Option<String>> {
    let doc = Html::parse_document(html);
    let img = selector(".novel-image img[src]")?;
    let Some(src) = doc.select(&img).next().and_then(|e| attr(e, "src")) else {
        return Ok(None);
    };
    // Covers are served through a resizing CDN; the query only carries size hints.
    Ok(Some(UrlBuilder::parse(&src)?.clear_query().build()))
}

fn parse_description(html: &str) -> Response<Option<String>> {
    let doc = Html::parse_document(html);
    let text = selector(".novel_text")?;
    let alternate_titles = selector(".alternate_titles")?;
    Ok(doc
        .select(&text)
        .next()
        .map(|e| TextExtractor::get_excluding(e, &[&alternate_titles]))
        .filter(|s| !s.is_empty()))
}

fn parse_chapter_list(html: &str) -> Response<Vec<ChapterResult>> {
    let doc = Html::parse_document(html);
    let link = selector(".chapter-item a[href]")?;
    Ok(doc
        .select(&link)
        .filter_map(|a| Some(ChapterResult::new(inline_text(a), attr(a, "href")?)))
        .collect())
}

fn parse_catalog(html: &str, index: usize) -> Response<PagedList<BookResult>> {
    let doc = Html::parse_document(html);
    let item = selector(".read_list-story-item")?;
    let title = selector(".read_list-story-item--title a[href]")?;
    let cover = selector(".item_thumb img[src]")?;
    let summary = selector(".read_list-story-item--short_description")?;

    let books: Vec<BookResult> = doc
        .select(&item)
        .filter_map(|it| {
            let a = it.select(&title).next()?;
            let cover_url = it.select(&cover).next().and_then(|e| attr(e, "src"));
            let description = it.select(&summary).next().map(inline_text);
            Some(
                BookResult::new(inline_text(a), attr(a, "href")?)
                    .with_cover(cover_url.unwrap_or_default())
                    .with_description(description.unwrap_or_default()),
            )
        })
        .collect();
    let is_last_page = books.is_empty();
    Ok(PagedList::new(books, index, is_last_page))
}

fn field(row: &Value, i: usize) -> Option<&str> {
    row.get(i).and_then(Value::as_str).map(str::trim)
}

fn parse_search(json: &Value, index: usize) -> Response<PagedList<BookResult>> {
    let rows = json
        .as_array()
        .ok_or_else(|| ScrapeError::parsing("search response is not an array"))?;
    let books = rows
        .iter()
        .filter_map(|row| {
            let title = field(row, 1)?;
            let url = field(row, 2).filter(|u| !u.is_empty())?;
            Some(BookResult::new(title, url).with_cover(field(row, 3).unwrap_or_default()))
        })
        .collect();
    Ok(PagedList::new(books, index, true))
}

#[async_trait]
impl Source for LightNovelsTranslations {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn client(&self) -> &dyn NetworkClient {
        self.client.as_ref()
    }

    async fn get_book_cover_image_url(&self, book_url: &str) -> Response<Option<String>> {
        try_connect("light_novel_translations: cover", async {
            let response = self.client.get(book_url).await?;
            parse_cover(&response.body)
        })
        .await
    }

    async fn get_book_description(&self, book_url: &str) -> Response<Option<String>> {
        try_connect("light_novel_translations: description", async {
            let response = self.client.get(book_url).await?;
            parse_description(&response.body)
        })
        .await
    }

    async fn get_chapter_list(&self, book_url: &str) -> Response<Vec<ChapterResult>> {
        try_connect("light_novel_translations: chapter list", async {
            let url = UrlBuilder::parse(book_url)?
                .add_query_param("tab", "table_contents")
                .build();
            let response = self.client.get(&url).await?;
            parse_chapter_list(&response.body)
        })
        .await
    }
}

#[async_trait]
impl Catalog for LightNovelsTranslations {
    async fn get_catalog_list(&self, index: usize) -> Response<PagedList<BookResult>> {
        let result = try_connect("light_novel_translations: catalog", async {
            let page = index + 1;
            let url = UrlBuilder::parse(BASE_URL)?
                .add_path("read")
                .apply_if(page > 1, |b| b.add_path(&format!("page/{}", page)))
                .add_query_param("sortby", "highest-rated")
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
        try_connect("light_novel_translations: search", async {
            let url = UrlBuilder::parse(BASE_URL)?
                .add_path("wp-admin/admin-ajax.php")
                .add_query_params([("action", "search_novel_header"), ("search_key", input)])
                .build();
            let json = self.client.get(&url).await?.to_json()?;
            parse_search(&json, index)
        })
        .await
    }
}
