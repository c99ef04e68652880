//! One page of catalog results, and the caller-side driver that walks pages.
//!
//! Stop rule: a page with `is_last_page` OR an empty list ends iteration. Providers can
//! only approximate the last page, so `is_last_page = false` is never authoritative.

use super::error::Response;
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::HashSet;
use std::hash::Hash;

/// One page of results. `index` is 0-based and echoes the requested page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PagedList<T> {
    pub list: Vec<T>,
    pub index: usize,
    pub is_last_page: bool,
}

impl<T> PagedList<T> {
    pub fn new(list: Vec<T>, index: usize, is_last_page: bool) -> Self {
        Self {
            list,
            index,
            is_last_page,
        }
    }

    /// "No results" for `index`.
    pub fn empty(index: usize) -> Self {
        Self::new(Vec::new(), index, true)
    }

    /// Maps a 404 for a page after the first to an empty last page. Paginated archives
    /// answer 404 once `index` runs past the end.
    pub fn or_empty_past_end(result: Response<Self>, index: usize) -> Response<Self> {
        match result {
            Err(e) if index > 0 && e.http_status() == Some(404) => Ok(Self::empty(index)),
            other => other,
        }
    }

    /// True when a caller must not request `index + 1`.
    pub fn is_exhausted(&self) -> bool {
        self.is_last_page || self.list.is_empty()
    }
}

/// Where a [PagedListIterator] stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    Idle,
    Loading,
    /// Last fetch failed; the next `fetch_next` retries the same index.
    Error,
    Finished,
}

type PageFetcher<T> = Box<dyn FnMut(usize) -> BoxFuture<'static, Response<PagedList<T>>> + Send>;

/// Drives `index = 0, 1, 2, …` against one query and accumulates unique items.
///
/// The index only advances after a successful page, so a failed call can simply be
/// repeated. Items whose key was already seen on an earlier page are dropped.
pub struct PagedListIterator<T, K> {
    fetch: PageFetcher<T>,
    key: fn(&T) -> K,
    seen: HashSet<K>,
    items: Vec<T>,
    next_index: usize,
    state: IteratorState,
}

impl<T, K> PagedListIterator<T, K>
where
    T: Send + 'static,
    K: Eq + Hash,
{
    pub fn new<F>(key: fn(&T) -> K, fetch: F) -> Self
    where
        F: FnMut(usize) -> BoxFuture<'static, Response<PagedList<T>>> + Send + 'static,
    {
        Self {
            fetch: Box::new(fetch),
            key,
            seen: HashSet::new(),
            items: Vec::new(),
            next_index: 0,
            state: IteratorState::Idle,
        }
    }

    pub fn state(&self) -> IteratorState {
        self.state
    }

    /// Every unique item fetched so far, in page order.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Index the next `fetch_next` will request.
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Fetch the next page. Returns the number of new items appended, `Ok(0)` once
    /// finished (without issuing a request).
    pub async fn fetch_next(&mut self) -> Response<usize> {
        if self.state == IteratorState::Finished {
            return Ok(0);
        }
        self.state = IteratorState::Loading;
        let page = match (self.fetch)(self.next_index).await {
            Ok(page) => page,
            Err(e) => {
                self.state = IteratorState::Error;
                return Err(e);
            }
        };
        let exhausted = page.is_exhausted();
        let before = self.items.len();
        for item in page.list {
            if self.seen.insert((self.key)(&item)) {
                self.items.push(item);
            }
        }
        self.next_index += 1;
        self.state = if exhausted {
            IteratorState::Finished
        } else {
            IteratorState::Idle
        };
        Ok(self.items.len() - before)
    }

    /// Fetch until finished or `max_pages` pages were consumed by this call.
    pub async fn fetch_pages(&mut self, max_pages: usize) -> Response<usize> {
        let mut added = 0;
        for _ in 0..max_pages {
            if self.state == IteratorState::Finished {
                break;
            }
            added += self.fetch_next().await?;
        }
        Ok(added)
    }

    /// Forget everything and start again from index 0.
    pub fn reset(&mut self) {
        self.seen.clear();
        self.items.clear();
        self.next_index = 0;
        self.state = IteratorState::Idle;
    }
}
