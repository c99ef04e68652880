//! Bounded worker pool for source operations, cancellable tasks, and the cross-source
//! catalog search built on them.

use super::error::Response;
use super::paged::PagedList;
use super::registry::Registry;
use super::{Catalog, LanguageCode};
use crate::model::BookResult;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

/// Runs futures on the tokio runtime with at most `max_concurrent` in flight.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Spawn `future`; it starts once a permit is free. Must be called inside a tokio
    /// runtime.
    pub fn spawn<F, T>(&self, future: F) -> Task<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let handle = tokio::spawn(async move {
            // The semaphore is never closed, so this only waits.
            let _permit = permits.acquire_owned().await;
            future.await
        });
        Task {
            handle,
            cancelled: false,
        }
    }
}

/// Handle to a spawned operation. Dropping it (or calling [Task::cancel]) aborts the
/// operation, which drops any in-flight request and releases its connection.
pub struct Task<T> {
    handle: JoinHandle<T>,
    cancelled: bool,
}

impl<T> Task<T> {
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the result. `None` once the task was cancelled, even if it had already
    /// finished.
    pub async fn join(mut self) -> Option<T> {
        if self.cancelled {
            return None;
        }
        match (&mut self.handle).await {
            Ok(value) => Some(value),
            Err(e) if e.is_cancelled() => None,
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Outcome of one source in [search_catalogs].
#[derive(Debug)]
pub struct CatalogSearchResult {
    pub source_id: String,
    pub response: Response<PagedList<BookResult>>,
}

/// Run `get_catalog_search(index, query)` on every catalog source (restricted to
/// `languages` when non-empty) through `pool`. Results come back in registry order;
/// `progress` is called with (done, total) after each source finishes.
pub async fn search_catalogs(
    registry: &Registry,
    pool: &WorkerPool,
    query: &str,
    index: usize,
    languages: &[LanguageCode],
    progress: Option<&dyn Fn(usize, usize)>,
) -> Vec<CatalogSearchResult> {
    let tasks: Vec<(String, Task<_>)> = registry
        .catalogs()
        .filter(|s| languages.is_empty() || languages.contains(&s.descriptor().language))
        .filter_map(|s| {
            let catalog = Arc::clone(s.catalog()?);
            let query = query.to_string();
            let task = pool.spawn(async move { catalog.get_catalog_search(index, &query).await });
            Some((s.descriptor().id.clone(), task))
        })
        .collect();

    let total = tasks.len();
    debug!(sources = total, index, "searching catalogs");
    let mut results = Vec::with_capacity(total);
    for (done, (source_id, task)) in tasks.into_iter().enumerate() {
        if let Some(response) = task.join().await {
            results.push(CatalogSearchResult {
                source_id,
                response,
            });
        }
        if let Some(p) = progress {
            p(done + 1, total);
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::testing::StubClient;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn pool_bounds_in_flight_operations() {
        let pool = WorkerPool::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                pool.spawn(async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    i
                })
            })
            .collect();
        let mut out = Vec::new();
        for task in tasks {
            out.extend(task.join().await);
        }
        assert_eq!(out, (0..8).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn cancelled_task_yields_nothing_and_stops_work() {
        let pool = WorkerPool::new(1);
        let reached_end = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&reached_end);
        let mut task = pool.spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            flag.store(true, Ordering::SeqCst);
            42
        });
        task.cancel();
        assert_eq!(task.join().await, None);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!reached_end.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancel_after_completion_still_yields_nothing() {
        let pool = WorkerPool::new(1);
        let mut task = pool.spawn(async { 7 });
        while !task.is_finished() {
            tokio::task::yield_now().await;
        }
        task.cancel();
        assert_eq!(task.join().await, None);
    }

    #[tokio::test]
    async fn blank_search_across_catalogs_issues_no_requests() -> Result<(), Box<dyn std::error::Error>> {
        let client = Arc::new(StubClient::new());
        let registry = Registry::with_default_sources(client.clone())?;
        let pool = WorkerPool::new(4);
        let calls = AtomicUsize::new(0);
        let progress = |_: usize, _: usize| {
            calls.fetch_add(1, Ordering::SeqCst);
        };
        let results = search_catalogs(&registry, &pool, "   ", 0, &[], Some(&progress)).await;
        assert_eq!(results.len(), registry.catalogs().count());
        assert_eq!(calls.load(Ordering::SeqCst), results.len());
        for result in &results {
            let page = result.response.as_ref().map_err(|e| e.to_string())?;
            assert_eq!(page, &PagedList::empty(0), "source {}", result.source_id);
        }
        assert_eq!(client.request_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn language_filter_excludes_other_languages() -> Result<(), Box<dyn std::error::Error>> {
        let registry = Registry::with_default_sources(Arc::new(StubClient::new()))?;
        let pool = WorkerPool::new(2);
        let results =
            search_catalogs(&registry, &pool, "", 0, &[LanguageCode::Indonesian], None).await;
        assert!(results.is_empty());
        Ok(())
    }
}
