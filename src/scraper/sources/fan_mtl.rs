//! FanMTL adapter. Listing links and lazy covers are site-relative; everything handed
//! out is made absolute against the base URL.

use crate::model::{dedup_by_url, BookResult, ChapterResult};
use crate::scraper::{
    absolute_url, attr, inline_text, selector, try_connect, Catalog, Descriptor,
    LanguageCode, NetworkClient, PagedList, Request, Response, ScrapeError, Source,
    TextExtractor,
};
use async_trait::async_trait;
use scraper::Html;
use std::sync::Arc;

const BASE_URL: &str = "https://www.fanmtl.com/";
const CATALOG_URL: &str = "https://www.fanmtl.com/list/all/all-newstime-1.html";
const SEARCH_URL: &str = "https://www.fanmtl.com/e/search/index.php";

/// The listing stops rendering results past this page.
const MAX_CATALOG_PAGES: usize = 39;

pub struct FanMtl {
    client: Arc<dyn NetworkClient>,
    descriptor: Descriptor,
}

impl FanMtl {
    pub fn new(client: Arc<dyn NetworkClient>) -> Self {
        Self {
            client,
            descriptor: Descriptor::new("fanmtl", "FanMTL", BASE_URL, LanguageCode::English)
                .with_catalog_url(CATALOG_URL),
        }
    }
}

/// Items without a link or a lazy cover are skipped.
fn parse_novel_items(html: &str) -> Response<Vec<BookResult>> {
    let doc = Html::parse_document(html);
    let item = selector(".novel-item")?;
    let link = selector("a[href][title]")?;
    let cover = selector("img[src][data-src]")?;

    let mut books = Vec::new();
    for it in doc.select(&item) {
        let (Some(a), Some(img)) = (it.select(&link).next(), it.select(&cover).next()) else {
            continue;
        };
        let (Some(title), Some(href), Some(src)) =
            (attr(a, "title"), attr(a, "href"), attr(img, "data-src"))
        else {
            continue;
        };
        books.push(
            BookResult::new(title, absolute_url(BASE_URL, &href)?)
                .with_cover(absolute_url(BASE_URL, &src)?),
        );
    }
    Ok(dedup_by_url(books))
}

fn parse_catalog(html: &str, index: usize) -> Response<PagedList<BookResult>> {
    let books = parse_novel_items(html)?;
    let is_last_page = books.is_empty() || index + 1 >= MAX_CATALOG_PAGES;
    Ok(PagedList::new(books, index, is_last_page))
}

fn parse_cover(html: &str) -> Response<Option<String>> {
    let doc = Html::parse_document(html);
    let img = selector("img[src][data-src]")?;
    doc.select(&img)
        .next()
        .and_then(|e| attr(e, "data-src"))
        .map(|src| absolute_url(BASE_URL, &src))
        .transpose()
}

fn parse_description(html: &str) -> Response<Option<String>> {
    let doc = Html::parse_document(html);
    let content = selector(".summary .content")?;
    Ok(doc.select(&content).next().map(TextExtractor::get))
}

/// Entries need both a link and a non-empty `.chapter-title`.
fn parse_chapter_list(html: &str) -> Response<Vec<ChapterResult>> {
    let doc = Html::parse_document(html);
    let entry = selector("#chapters .chapter-list li")?;
    let link = selector("a[href]")?;
    let title = selector(".chapter-title")?;

    let mut chapters = Vec::new();
    for li in doc.select(&entry) {
        let Some(href) = li.select(&link).next().and_then(|a| attr(a, "href")) else {
            continue;
        };
        let name = li.select(&title).next().map(inline_text).unwrap_or_default();
        if name.is_empty() {
            continue;
        }
        chapters.push(ChapterResult::new(name, absolute_url(BASE_URL, &href)?));
    }
    Ok(chapters)
}

#[async_trait]
impl Source for FanMtl {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn client(&self) -> &dyn NetworkClient {
        self.client.as_ref()
    }

    async fn get_book_cover_image_url(&self, book_url: &str) -> Response<Option<String>> {
        try_connect("fanmtl: cover", async {
            let response = self.client.get(book_url).await?;
            parse_cover(&response.body)
        })
        .await
    }

    async fn get_book_description(&self, book_url: &str) -> Response<Option<String>> {
        try_connect("fanmtl: description", async {
            let response = self.client.get(book_url).await?;
            parse_description(&response.body)
        })
        .await
    }

    async fn get_chapter_list(&self, book_url: &str) -> Response<Vec<ChapterResult>> {
        try_connect("fanmtl: chapter list", async {
            let response = self.client.get(book_url).await?;
            parse_chapter_list(&response.body)
        })
        .await
    }

    fn get_chapter_title(&self, doc: &Html) -> Option<String> {
        let heading = selector(".titles h2").ok()?;
        doc.select(&heading)
            .next()
            .map(inline_text)
            .filter(|s| !s.is_empty())
    }

    /// One line per paragraph; containers without `<p>` fall back to block extraction.
    fn get_chapter_text(&self, doc: &Html) -> Response<String> {
        let content = selector(".chapter-content")?;
        let paragraph = selector("p")?;
        let container = doc
            .select(&content)
            .next()
            .ok_or_else(|| ScrapeError::parsing("missing .chapter-content container"))?;
        let lines: Vec<String> = container
            .select(&paragraph)
            .map(inline_text)
            .filter(|s| !s.is_empty())
            .collect();
        if lines.is_empty() {
            Ok(TextExtractor::get(container))
        } else {
            Ok(lines.join("\n"))
        }
    }
}

#[async_trait]
impl Catalog for FanMtl {
    async fn get_catalog_list(&self, index: usize) -> Response<PagedList<BookResult>> {
        if index >= MAX_CATALOG_PAGES {
            return Ok(PagedList::empty(index));
        }
        try_connect("fanmtl: catalog", async {
            let url = format!("{}list/all/all-newstime-{}.html", BASE_URL, index + 1);
            let response = self.client.get(&url).await?;
            parse_catalog(&response.body, index)
        })
        .await
    }

    /// The search form has no paging: index 0 is the whole result set.
    async fn get_catalog_search(
        &self,
        index: usize,
        input: &str,
    ) -> Response<PagedList<BookResult>> {
        if input.trim().is_empty() || index > 0 {
            return Ok(PagedList::empty(index));
        }
        try_connect("fanmtl: search", async {
            let request = Request::post(SEARCH_URL).form([
                ("show", "title"),
                ("tempid", "1"),
                ("tbname", "news"),
                ("keyboard", input.trim()),
            ]);
            let response = self.client.call(request).await?;
            Ok::<_, ScrapeError>(PagedList::new(parse_novel_items(&response.body)?, index, true))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::testing::StubClient;
    use crate::scraper::{Body, ErrorKind, Method};
    use pretty_assertions::assert_eq;

    const LISTING: &str = r#"<ul class="novel-list">
<li class="novel-item"><a href="/novel/martial-peak.html" title="Martial Peak">
  <img src="/images/loading.gif" data-src="/d/file/martial-peak.jpg"></a></li>
<li class="novel-item"><a href="/novel/no-cover.html" title="No Cover"><img src="/x.jpg"></a></li>
<li class="novel-item"><a href="/novel/martial-peak.html" title="Martial Peak">
  <img src="/images/loading.gif" data-src="/d/file/martial-peak.jpg"></a></li>
</ul>"#;

    fn fanmtl(client: StubClient) -> (Arc<StubClient>, FanMtl) {
        let client = Arc::new(client);
        (client.clone(), FanMtl::new(client))
    }

    #[test]
    fn listing_requires_lazy_cover_and_makes_urls_absolute() -> Response<()> {
        assert_eq!(
            parse_novel_items(LISTING)?,
            vec![BookResult::new("Martial Peak", "https://www.fanmtl.com/novel/martial-peak.html")
                .with_cover("https://www.fanmtl.com/d/file/martial-peak.jpg")]
        );
        Ok(())
    }

    #[test]
    fn catalog_is_capped_at_max_pages() -> Response<()> {
        assert!(!parse_catalog(LISTING, 0)?.is_last_page);
        assert!(!parse_catalog(LISTING, MAX_CATALOG_PAGES - 2)?.is_last_page);
        assert!(parse_catalog(LISTING, MAX_CATALOG_PAGES - 1)?.is_last_page);
        assert_eq!(parse_catalog("<ul></ul>", 3)?, PagedList::empty(3));
        Ok(())
    }

    #[test]
    fn chapter_list_skips_untitled_entries() -> Response<()> {
        let html = r#"<div id="chapters"><ul class="chapter-list">
<li><a href="/novel/mp_1.html"><strong class="chapter-title">Chapter 1</strong></a></li>
<li><a href="/novel/mp_2.html"><strong class="chapter-title"> </strong></a></li>
<li><span class="chapter-title">No link</span></li>
</ul></div>"#;
        assert_eq!(
            parse_chapter_list(html)?,
            vec![ChapterResult::new("Chapter 1", "https://www.fanmtl.com/novel/mp_1.html")]
        );
        Ok(())
    }

    #[test]
    fn cover_keeps_absolute_sources() -> Response<()> {
        let html = r#"<figure class="cover"><img src="/l.gif" data-src="https://cdn.fanmtl.com/c.jpg"></figure>"#;
        assert_eq!(parse_cover(html)?.as_deref(), Some("https://cdn.fanmtl.com/c.jpg"));
        assert_eq!(parse_cover("<img src='/a.jpg'>")?, None);
        Ok(())
    }

    #[tokio::test]
    async fn catalog_url_uses_one_based_page() -> Response<()> {
        let (_, source) = fanmtl(StubClient::new().page(
            "https://www.fanmtl.com/list/all/all-newstime-5.html",
            LISTING,
        ));
        let page = source.get_catalog_list(4).await?;
        assert_eq!(page.index, 4);
        assert_eq!(page.list.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn catalog_beyond_page_cap_is_empty_without_requests() -> Response<()> {
        let (client, source) = fanmtl(StubClient::new().page(
            "https://www.fanmtl.com/list/all/all-newstime-45.html",
            LISTING,
        ));
        assert_eq!(source.get_catalog_list(44).await?, PagedList::empty(44));
        assert_eq!(
            source.get_catalog_list(MAX_CATALOG_PAGES).await?,
            PagedList::empty(MAX_CATALOG_PAGES)
        );
        assert_eq!(client.request_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn search_posts_form_and_has_one_page() -> Response<()> {
        let (client, source) = fanmtl(StubClient::new().page(SEARCH_URL, LISTING));
        let page = source.get_catalog_search(0, "martial").await?;
        assert_eq!(page.list.len(), 1);
        assert!(page.is_last_page);
        assert_eq!(source.get_catalog_search(1, "martial").await?, PagedList::empty(1));

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::Post);
        let keyboard = match &requests[0].body {
            Some(Body::Form(pairs)) => pairs
                .iter()
                .find(|(k, _)| k == "keyboard")
                .map(|(_, v)| v.clone()),
            _ => None,
        };
        assert_eq!(keyboard.as_deref(), Some("martial"));
        Ok(())
    }

    #[test]
    fn chapter_text_joins_paragraph_lines() {
        let (_, source) = fanmtl(StubClient::new());
        let doc = Html::parse_document(
            r#"<div class="titles"><h2>Chapter 7 Breakthrough</h2></div>
<div class="chapter-content"><p>Yang Kai stood.</p><p></p><p>He  smiled.</p></div>"#,
        );
        assert_eq!(source.get_chapter_title(&doc).as_deref(), Some("Chapter 7 Breakthrough"));
        assert_eq!(
            source.get_chapter_text(&doc).ok().as_deref(),
            Some("Yang Kai stood.\nHe smiled.")
        );
        let kind = source
            .get_chapter_text(&Html::parse_document("<div></div>"))
            .err()
            .map(|e| e.kind());
        assert_eq!(kind, Some(ErrorKind::Parsing));
    }
}
