//! Baka-Updates (MangaUpdates) lookup through its public JSON API.

use crate::model::BookResult;
use crate::scraper::{
    attr, selector, try_connect, Database, Descriptor, LanguageCode, NetworkClient,
    PagedList, Request, Response, TextExtractor,
};
use async_trait::async_trait;
use scraper::Html;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const BASE_URL: &str = "https://www.mangaupdates.com/";
const SEARCH_URL: &str = "https://api.mangaupdates.com/v1/series/search";
const PER_PAGE: usize = 25;

pub struct BakaUpdates {
    client: Arc<dyn NetworkClient>,
    descriptor: Descriptor,
}

impl BakaUpdates {
    pub fn new(client: Arc<dyn NetworkClient>) -> Self {
        Self {
            client,
            descriptor: Descriptor::new(
                "baka_updates",
                "Baka-Updates",
                BASE_URL,
                LanguageCode::English,
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total_hits: usize,
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    record: Record,
}

#[derive(Debug, Deserialize)]
struct Record {
    title: String,
    url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    image: Option<Image>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: ImageUrls,
}

#[derive(Debug, Deserialize)]
struct ImageUrls {
    #[serde(default)]
    original: Option<String>,
}

/// Descriptions come back with inline markup.
fn plain_text(markup: &str) -> String {
    TextExtractor::get(Html::parse_fragment(markup).root_element())
}

fn parse_search(body: &str, index: usize) -> Response<PagedList<BookResult>> {
    let response: SearchResponse = serde_json::from_str(body)?;
    let books: Vec<BookResult> = response
        .results
        .into_iter()
        .map(|hit| {
            let record = hit.record;
            let cover = record.image.and_then(|i| i.url.original).unwrap_or_default();
            let description = record.description.as_deref().map(plain_text).unwrap_or_default();
            BookResult::new(record.title, record.url)
                .with_cover(cover)
                .with_description(description)
        })
        .collect();
    let is_last_page = books.is_empty() || (index + 1) * PER_PAGE >= response.total_hits;
    Ok(PagedList::new(books, index, is_last_page))
}

fn parse_description(html: &str) -> Response<Option<String>> {
    let doc = Html::parse_document(html);
    let meta = selector(r#"meta[property="og:description"]"#)?;
    Ok(doc.select(&meta).next().and_then(|e| attr(e, "content")))
}

#[async_trait]
impl Database for BakaUpdates {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    async fn search_by_title(
        &self,
        index: usize,
        input: &str,
    ) -> Response<PagedList<BookResult>> {
        if input.trim().is_empty() {
            return Ok(PagedList::empty(index));
        }
        try_connect("baka_updates: search", async {
            let request = Request::post(SEARCH_URL).json(json!({
                "search": input.trim(),
                "page": index + 1,
                "perpage": PER_PAGE,
            }));
            let response = self.client.call(request).await?;
            parse_search(&response.body, index)
        })
        .await
    }

    async fn get_book_description(&self, book_url: &str) -> Response<Option<String>> {
        try_connect("baka_updates: description", async {
            let response = self.client.get(book_url).await?;
            parse_description(&response.body)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::testing::StubClient;
    use crate::scraper::{Body, ErrorKind};
    use pretty_assertions::assert_eq;

    const RESPONSE: &str = r#"{
  "total_hits": 26,
  "page": 1,
  "per_page": 25,
  "results": [
    {"record": {
      "series_id": 1,
      "title": "Solo Leveling",
      "url": "https://www.mangaupdates.com/series/abc/solo-leveling",
      "description": "<p>Ten years ago, <b>the Gate</b> appeared.</p>",
      "image": {"url": {"original": "https://cdn.mangaupdates.com/image/i1.jpg", "thumb": "t.jpg"}}
    }},
    {"record": {"title": "No Image", "url": "https://www.mangaupdates.com/series/def/no-image"}}
  ]
}"#;

    #[test]
    fn search_maps_records_and_computes_last_page() -> Response<()> {
        let page = parse_search(RESPONSE, 0)?;
        assert_eq!(
            page.list[0],
            BookResult::new("Solo Leveling", "https://www.mangaupdates.com/series/abc/solo-leveling")
                .with_cover("https://cdn.mangaupdates.com/image/i1.jpg")
                .with_description("Ten years ago, the Gate appeared.")
        );
        assert_eq!(page.list[1].cover_image_url, "");
        assert!(!page.is_last_page);
        assert!(parse_search(RESPONSE, 1)?.is_last_page);
        Ok(())
    }

    #[test]
    fn malformed_json_is_parsing_error() {
        let kind = parse_search("<html>maintenance</html>", 0).err().map(|e| e.kind());
        assert_eq!(kind, Some(ErrorKind::Parsing));
    }

    #[tokio::test]
    async fn search_posts_json_body() -> Response<()> {
        let client = Arc::new(StubClient::new().page(SEARCH_URL, RESPONSE));
        let database = BakaUpdates::new(client.clone());
        let page = database.search_by_title(0, "solo leveling").await?;
        assert_eq!(page.list.len(), 2);
        assert_eq!(database.search_by_title(0, "").await?, PagedList::empty(0));

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].body,
            Some(Body::Json(json!({"search": "solo leveling", "page": 1, "perpage": 25})))
        );
        Ok(())
    }

    #[test]
    fn description_comes_from_open_graph() -> Response<()> {
        let html = r#"<html><head><meta property="og:description" content=" A hunter rises. "></head></html>"#;
        assert_eq!(parse_description(html)?.as_deref(), Some("A hunter rises."));
        assert_eq!(parse_description("<html></html>")?, None);
        Ok(())
    }
}
