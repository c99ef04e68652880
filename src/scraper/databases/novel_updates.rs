//! Novel Updates series finder.

use crate::model::{dedup_by_url, BookResult};
use crate::scraper::{
    attr, inline_text, selector, try_connect, Database, Descriptor, LanguageCode,
    NetworkClient, PagedList, Response, TextExtractor, UrlBuilder,
};
use async_trait::async_trait;
use scraper::Html;
use std::sync::Arc;

const BASE_URL: &str = "https://www.novelupdates.com/";
const ICON_URL: &str = "https://www.novelupdates.com/favicon.ico";

pub struct NovelUpdates {
    client: Arc<dyn NetworkClient>,
    descriptor: Descriptor,
}

impl NovelUpdates {
    pub fn new(client: Arc<dyn NetworkClient>) -> Self {
        Self {
            client,
            descriptor: Descriptor::new(
                "novel_updates",
                "Novel Updates",
                BASE_URL,
                LanguageCode::English,
            )
            .with_icon_url(ICON_URL),
        }
    }
}

fn parse_search(html: &str, index: usize) -> Response<PagedList<BookResult>> {
    let doc = Html::parse_document(html);
    let item = selector(".search_main_box_nu")?;
    let title = selector(".search_title a[href]")?;
    let cover = selector(".search_img_nu img[src]")?;
    let next_page = selector(".digg_pagination a.next_page")?;

    let books: Vec<BookResult> = doc
        .select(&item)
        .filter_map(|it| {
            let a = it.select(&title).next()?;
            let cover_url = it.select(&cover).next().and_then(|e| attr(e, "src"));
            Some(BookResult::new(inline_text(a), attr(a, "href")?).with_cover(cover_url.unwrap_or_default()))
        })
        .collect();
    let is_last_page = books.is_empty() || doc.select(&next_page).next().is_none();
    Ok(PagedList::new(dedup_by_url(books), index, is_last_page))
}

fn parse_description(html: &str) -> Response<Option<String>> {
    let doc = Html::parse_document(html);
    let description = selector("#editdescription")?;
    Ok(doc
        .select(&description)
        .next()
        .map(TextExtractor::get)
        .filter(|s| !s.is_empty()))
}

#[async_trait]
impl Database for NovelUpdates {
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
        try_connect("novel_updates: search", async {
            let page = (index + 1).to_string();
            let url = UrlBuilder::parse(BASE_URL)?
                .add_path("series-finder")
                .trailing_slash()
                .add_query_params([
                    ("sf", "1"),
                    ("sh", input.trim()),
                    ("sort", "sdate"),
                    ("order", "desc"),
                    ("pg", page.as_str()),
                ])
                .build();
            let response = self.client.get(&url).await?;
            parse_search(&response.body, index)
        })
        .await
    }

    async fn get_book_description(&self, book_url: &str) -> Response<Option<String>> {
        try_connect("novel_updates: description", async {
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
    use pretty_assertions::assert_eq;

    const RESULTS: &str = r#"<html><body>
<div class="search_main_box_nu">
  <div class="search_img_nu"><img src="https://cdn.novelupdates.com/imgmid/series_1.jpg"></div>
  <div class="search_body_nu"><div class="search_title"><a href="https://www.novelupdates.com/series/coiling-dragon/">Coiling Dragon</a></div></div>
</div>
<div class="digg_pagination"><em class="current">1</em><a href="?pg=2">2</a><a class="next_page" href="?pg=2">Next</a></div>
</body></html>"#;

    #[test]
    fn search_results_and_next_page_link() -> Response<()> {
        let page = parse_search(RESULTS, 0)?;
        assert_eq!(
            page.list,
            vec![BookResult::new("Coiling Dragon", "https://www.novelupdates.com/series/coiling-dragon/")
                .with_cover("https://cdn.novelupdates.com/imgmid/series_1.jpg")]
        );
        assert!(!page.is_last_page);
        let without_next = RESULTS.replace(r#"<a class="next_page" href="?pg=2">Next</a>"#, "");
        assert!(parse_search(&without_next, 0)?.is_last_page);
        Ok(())
    }

    #[tokio::test]
    async fn search_url_and_description() -> Response<()> {
        let client = Arc::new(
            StubClient::new()
                .page(
                    "https://www.novelupdates.com/series-finder/?sf=1&sh=coiling+dragon&sort=sdate&order=desc&pg=2",
                    RESULTS,
                )
                .page(
                    "https://www.novelupdates.com/series/coiling-dragon/",
                    r#"<div id="editdescription"><p>Empires rise and fall.</p></div>"#,
                ),
        );
        let database = NovelUpdates::new(client.clone());
        let page = database.search_by_title(1, "coiling dragon").await?;
        assert_eq!(page.index, 1);
        assert_eq!(page.list.len(), 1);
        let description = database
            .get_book_description("https://www.novelupdates.com/series/coiling-dragon/")
            .await?;
        assert_eq!(description.as_deref(), Some("Empires rise and fall."));
        assert_eq!(database.search_by_title(0, " ").await?, PagedList::empty(0));
        assert_eq!(client.request_count(), 2);
        Ok(())
    }
}
