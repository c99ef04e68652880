//! CLI parsing and orchestration. Parses args, builds the client, registry and worker pool,
//! runs one subcommand and prints text or JSON. Maps errors to exit codes.

use crate::config;
use crate::logging;
use crate::model::{BookResult, ChapterContent, ChapterResult};
use crate::scraper::{
    search_catalogs, Capability, Catalog, CatalogSearchResult, Database, Descriptor, ErrorKind,
    HttpClient, IteratorState, LanguageCode, NetworkClient, PagedList, PagedListIterator,
    Registry, RegistryError, ScrapeError, Source, WorkerPool,
};
use clap::{Parser, Subcommand};
use futures::FutureExt;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_CONCURRENCY: usize = 4;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Scrape(#[from] ScrapeError),

    #[error("{0}")]
    Setup(String),

    #[error("Invalid source registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("{0}")]
    Output(String),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Scrape(_) | CliRunError::Setup(_) | CliRunError::Registry(_) => 2,
            CliRunError::Output(_) => 3,
        }
    }
}

impl From<std::io::Error> for CliRunError {
    fn from(e: std::io::Error) -> Self {
        CliRunError::Output(format!("Cannot write output: {}", e))
    }
}

impl From<serde_json::Error> for CliRunError {
    fn from(e: serde_json::Error) -> Self {
        CliRunError::Output(format!("Cannot serialize output: {}", e))
    }
}

#[derive(Parser, Debug)]
#[command(name = "novelscrape")]
#[command(about = "Browse, search and read web novels from the supported sites")]
#[command(
    after_help = "Config file keys (user_agent, timeout_secs, max_concurrent_requests, log_level, languages) are read from ./novelscrape.toml or the user config dir. CLI flags override config. RUST_LOG overrides --log-level."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Print results as JSON on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress progress output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print verbose error chain and log at info level.
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Log filter, e.g. debug or novelscrape=trace (overrides config).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// HTTP User-Agent (overrides config).
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    /// Maximum concurrent source operations (overrides config; default 4).
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List registered sources and databases.
    Sources,

    /// Show which source handles a URL.
    Resolve { url: String },

    /// Browse a source's catalog.
    Catalog {
        /// Source id (see `sources`).
        source: String,

        /// Page to fetch (1-based).
        #[arg(long, default_value = "1", value_parser = parse_page, conflicts_with = "pages")]
        page: usize,

        /// Crawl the first N pages instead, stopping early at the last page.
        #[arg(long, value_parser = parse_page)]
        pages: Option<usize>,
    },

    /// Search every catalog, or a single source or database with --source.
    Search {
        query: String,

        /// Restrict to one catalog or database id.
        #[arg(long)]
        source: Option<String>,

        /// Only search catalogs in this language (repeatable; overrides config).
        #[arg(long, value_parser = parse_language)]
        language: Vec<LanguageCode>,

        /// Result page (1-based).
        #[arg(long, default_value = "1", value_parser = parse_page)]
        page: usize,
    },

    /// List a book's chapters in reading order.
    Chapters { url: String },

    /// Show a book's cover URL and description.
    Describe { url: String },

    /// Download one chapter and print its text.
    Chapter { url: String },
}

fn parse_page(s: &str) -> Result<usize, String> {
    let n: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid page: '{}' is not a positive number", s))?;
    if n == 0 {
        return Err("Invalid page: pages start at 1".to_string());
    }
    Ok(n)
}

fn parse_language(s: &str) -> Result<LanguageCode, String> {
    s.parse()
}

/// Everything a subcommand needs, built once per run.
pub struct Context {
    pub registry: Registry,
    pub pool: WorkerPool,
    pub json: bool,
    pub quiet: bool,
    /// Language filter for fan-out search when none is given on the command line.
    pub default_languages: Vec<LanguageCode>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceInfo<'a> {
    #[serde(flatten)]
    descriptor: &'a Descriptor,
    kind: &'static str,
    capabilities: Vec<Capability>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorReport {
    kind: ErrorKind,
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchOutcome {
    source_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<PagedList<BookResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorReport>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CatalogCrawl {
    source_id: String,
    pages_fetched: usize,
    finished: bool,
    books: Vec<BookResult>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BookDetails {
    source_id: String,
    url: String,
    cover_image_url: Option<String>,
    description: Option<String>,
}

fn print_json<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<(), CliRunError> {
    let s = serde_json::to_string_pretty(value)?;
    writeln!(out, "{}", s)?;
    Ok(())
}

fn print_books(out: &mut dyn Write, books: &[BookResult]) -> Result<(), CliRunError> {
    for book in books {
        writeln!(out, "{}\n  {}", book.title, book.url)?;
    }
    Ok(())
}

fn book_url(book: &BookResult) -> String {
    book.url.clone()
}

fn unsupported_url(url: &str) -> CliRunError {
    CliRunError::InvalidInput(format!(
        "Unsupported URL: {}. Run `novelscrape sources` to list supported sites.",
        url
    ))
}

fn unknown_source(id: &str) -> CliRunError {
    CliRunError::InvalidInput(format!(
        "Unknown source id: '{}'. Run `novelscrape sources` to list ids.",
        id
    ))
}

/// Spinner on stderr, or a hidden bar when progress is suppressed.
fn spinner(quiet: bool, message: &str) -> indicatif::ProgressBar {
    if quiet {
        return indicatif::ProgressBar::hidden();
    }
    let bar = indicatif::ProgressBar::new_spinner();
    if let Ok(style) = indicatif::ProgressStyle::default_spinner().template("{spinner} {msg} ({elapsed})") {
        bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn list_sources(ctx: &Context, out: &mut dyn Write) -> Result<(), CliRunError> {
    let mut infos: Vec<SourceInfo> = ctx
        .registry
        .sources()
        .iter()
        .map(|s| SourceInfo {
            descriptor: s.descriptor(),
            kind: "source",
            capabilities: s.capabilities(),
        })
        .collect();
    infos.extend(ctx.registry.databases().iter().map(|d| SourceInfo {
        descriptor: d.descriptor(),
        kind: "database",
        capabilities: Vec::new(),
    }));
    if ctx.json {
        return print_json(out, &infos);
    }
    for info in &infos {
        let caps: Vec<&str> = info
            .capabilities
            .iter()
            .map(|c| match c {
                Capability::Base => "base",
                Capability::Catalog => "catalog",
            })
            .collect();
        let caps = if caps.is_empty() { info.kind.to_string() } else { caps.join(",") };
        writeln!(
            out,
            "{:<26} {:<2} {:<13} {}",
            info.descriptor.id, info.descriptor.language, caps, info.descriptor.base_url
        )?;
    }
    Ok(())
}

fn resolve(ctx: &Context, url: &str, out: &mut dyn Write) -> Result<(), CliRunError> {
    let info = if let Some(s) = ctx.registry.resolve_source(url) {
        SourceInfo {
            descriptor: s.descriptor(),
            kind: "source",
            capabilities: s.capabilities(),
        }
    } else if let Some(d) = ctx.registry.resolve_database(url) {
        SourceInfo {
            descriptor: d.descriptor(),
            kind: "database",
            capabilities: Vec::new(),
        }
    } else {
        return Err(unsupported_url(url));
    };
    if ctx.json {
        return print_json(out, &info);
    }
    writeln!(
        out,
        "{} ({}) [{}]",
        info.descriptor.id, info.descriptor.display_name, info.kind
    )?;
    Ok(())
}

async fn catalog(
    ctx: &Context,
    source_id: &str,
    page: usize,
    pages: Option<usize>,
    out: &mut dyn Write,
) -> Result<(), CliRunError> {
    let catalog = match ctx.registry.get_catalog(source_id) {
        Some(c) => Arc::clone(c),
        None if ctx.registry.get(source_id).is_some() => {
            return Err(CliRunError::InvalidInput(format!(
                "Source '{}' has no catalog.",
                source_id
            )))
        }
        None => return Err(unknown_source(source_id)),
    };

    let Some(max_pages) = pages else {
        let list = catalog.get_catalog_list(page - 1).await?;
        if ctx.json {
            return print_json(out, &list);
        }
        print_books(out, &list.list)?;
        if list.is_exhausted() {
            writeln!(out, "(last page)")?;
        }
        return Ok(());
    };

    let fetcher = Arc::clone(&catalog);
    let mut crawl = PagedListIterator::new(book_url, move |index| {
        let catalog = Arc::clone(&fetcher);
        async move { catalog.get_catalog_list(index).await }.boxed()
    });
    let bar = spinner(ctx.quiet, "Fetching catalog");
    let result = crawl.fetch_pages(max_pages).await;
    bar.finish_and_clear();
    result?;
    info!(source = source_id, pages = crawl.next_index(), books = crawl.items().len(), "catalog crawl done");

    let report = CatalogCrawl {
        source_id: source_id.to_string(),
        pages_fetched: crawl.next_index(),
        finished: crawl.state() == IteratorState::Finished,
        books: crawl.into_items(),
    };
    if ctx.json {
        return print_json(out, &report);
    }
    print_books(out, &report.books)?;
    writeln!(
        out,
        "({} books from {} pages{})",
        report.books.len(),
        report.pages_fetched,
        if report.finished { ", end of catalog" } else { "" }
    )?;
    Ok(())
}

fn outcome(result: CatalogSearchResult) -> SearchOutcome {
    match result.response {
        Ok(page) => SearchOutcome {
            source_id: result.source_id,
            page: Some(page),
            error: None,
        },
        Err(e) => SearchOutcome {
            source_id: result.source_id,
            page: None,
            error: Some(ErrorReport {
                kind: e.kind(),
                message: e.to_string(),
            }),
        },
    }
}

async fn search(
    ctx: &Context,
    query: &str,
    source_id: Option<&str>,
    languages: &[LanguageCode],
    page: usize,
    out: &mut dyn Write,
) -> Result<(), CliRunError> {
    let index = page - 1;
    if let Some(id) = source_id {
        let list = if let Some(catalog) = ctx.registry.get_catalog(id) {
            catalog.get_catalog_search(index, query).await?
        } else if let Some(database) = ctx.registry.get_database(id) {
            database.search_by_title(index, query).await?
        } else if ctx.registry.get(id).is_some() {
            return Err(CliRunError::InvalidInput(format!("Source '{}' cannot search.", id)));
        } else {
            return Err(unknown_source(id));
        };
        if ctx.json {
            return print_json(out, &list);
        }
        return print_books(out, &list.list);
    }

    let languages = if languages.is_empty() {
        ctx.default_languages.as_slice()
    } else {
        languages
    };
    let bar = spinner(ctx.quiet, "Searching");
    let progress = |done: usize, total: usize| {
        bar.set_message(format!("Searched {}/{} sources", done, total));
    };
    let results = search_catalogs(&ctx.registry, &ctx.pool, query, index, languages, Some(&progress)).await;
    bar.finish_and_clear();

    let failed = results.iter().filter(|r| r.response.is_err()).count();
    if !results.is_empty() && failed == results.len() {
        if let Some(Err(e)) = results.into_iter().map(|r| r.response).next() {
            return Err(e.into());
        }
        return Ok(());
    }

    let outcomes: Vec<SearchOutcome> = results.into_iter().map(outcome).collect();
    if ctx.json {
        return print_json(out, &outcomes);
    }
    for o in &outcomes {
        match (&o.page, &o.error) {
            (Some(page), _) => {
                writeln!(out, "== {} ({} results)", o.source_id, page.list.len())?;
                print_books(out, &page.list)?;
            }
            (None, Some(e)) => writeln!(out, "== {} failed: {}", o.source_id, e.message)?,
            (None, None) => {}
        }
    }
    Ok(())
}

async fn chapters(ctx: &Context, url: &str, out: &mut dyn Write) -> Result<(), CliRunError> {
    let source = ctx.registry.resolve_source(url).ok_or_else(|| unsupported_url(url))?;
    let list: Vec<ChapterResult> = source.source().get_chapter_list(url).await?;
    if ctx.json {
        return print_json(out, &list);
    }
    for (i, chapter) in list.iter().enumerate() {
        writeln!(out, "{:>5}. {}\n       {}", i + 1, chapter.title, chapter.url)?;
    }
    Ok(())
}

async fn describe(ctx: &Context, url: &str, out: &mut dyn Write) -> Result<(), CliRunError> {
    let details = if let Some(s) = ctx.registry.resolve_source(url) {
        let source = s.source();
        let (cover, description) = futures::join!(
            source.get_book_cover_image_url(url),
            source.get_book_description(url)
        );
        BookDetails {
            source_id: s.descriptor().id.clone(),
            url: url.to_string(),
            cover_image_url: cover?,
            description: description?,
        }
    } else if let Some(database) = ctx.registry.resolve_database(url) {
        BookDetails {
            source_id: database.descriptor().id.clone(),
            url: url.to_string(),
            cover_image_url: None,
            description: database.get_book_description(url).await?,
        }
    } else {
        return Err(unsupported_url(url));
    };
    if ctx.json {
        return print_json(out, &details);
    }
    writeln!(out, "Source: {}", details.source_id)?;
    if let Some(cover) = &details.cover_image_url {
        writeln!(out, "Cover: {}", cover)?;
    }
    writeln!(out)?;
    writeln!(out, "{}", details.description.as_deref().unwrap_or("(no description)"))?;
    Ok(())
}

async fn chapter(ctx: &Context, url: &str, out: &mut dyn Write) -> Result<(), CliRunError> {
    let source = ctx.registry.resolve_source(url).ok_or_else(|| unsupported_url(url))?;
    let content: ChapterContent = source.source().fetch_chapter(url).await?;
    if ctx.json {
        return print_json(out, &content);
    }
    if let Some(title) = &content.title {
        writeln!(out, "{}\n", title)?;
    }
    writeln!(out, "{}", content.text)?;
    Ok(())
}

/// Run one subcommand against an already-built context.
pub async fn execute(ctx: &Context, command: &Command, out: &mut dyn Write) -> Result<(), CliRunError> {
    match command {
        Command::Sources => list_sources(ctx, out),
        Command::Resolve { url } => resolve(ctx, url, out),
        Command::Catalog { source, page, pages } => catalog(ctx, source, *page, *pages, out).await,
        Command::Search {
            query,
            source,
            language,
            page,
        } => search(ctx, query, source.as_deref(), language, *page, out).await,
        Command::Chapters { url } => chapters(ctx, url, out).await,
        Command::Describe { url } => describe(ctx, url, out).await,
        Command::Chapter { url } => chapter(ctx, url, out).await,
    }
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let config = config::load_config().map_err(CliRunError::InvalidInput)?;

    let log_level = args
        .log_level
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.log_level.clone()))
        .or_else(|| args.verbose.then(|| "info".to_string()));
    logging::init(log_level.as_deref());
    if let Some(path) = config.as_ref().and_then(|c| c.path.as_deref()) {
        debug!(path = %path.display(), "loaded config");
    }

    let timeout_secs = args
        .timeout
        .or_else(|| config.as_ref().and_then(|c| c.timeout_secs));
    let user_agent = args
        .user_agent
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.user_agent.clone()));
    let concurrency = args
        .concurrency
        .or_else(|| config.as_ref().and_then(|c| c.max_concurrent_requests))
        .unwrap_or(DEFAULT_CONCURRENCY);
    let default_languages = match &config {
        Some(c) => c.language_codes().map_err(CliRunError::InvalidInput)?,
        None => Vec::new(),
    };

    let mut builder = HttpClient::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout_secs(secs);
    }
    if let Some(ua) = user_agent {
        builder = builder.user_agent(ua);
    }
    let client = builder
        .build()
        .map_err(|e| CliRunError::Setup(format!("Failed to create HTTP client: {}", e)))?;
    let client: Arc<dyn NetworkClient> = Arc::new(client);

    let ctx = Context {
        registry: Registry::with_default_sources(client)?,
        pool: WorkerPool::new(concurrency),
        json: args.json,
        quiet: args.quiet,
        default_languages,
    };
    info!(sources = ctx.registry.sources().len(), concurrency, "registry ready");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliRunError::Setup(format!("Failed to start async runtime: {}", e)))?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    runtime.block_on(execute(&ctx, &args.command, &mut out))
}
