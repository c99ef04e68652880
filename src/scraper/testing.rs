//! In-memory [NetworkClient] for adapter tests. Unknown URLs answer HTTP 404.

use super::client::{NetworkClient, RawResponse, Request};
use super::error::{HttpStatusError, Response};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub(crate) struct StubClient {
    pages: HashMap<String, (u16, String)>,
    requests: Mutex<Vec<Request>>,
}

impl StubClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 for `url` (any method).
    pub(crate) fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), (200, body.to_string()));
        self
    }

    pub(crate) fn status(mut self, url: &str, status: u16) -> Self {
        self.pages.insert(url.to_string(), (status, String::new()));
        self
    }

    /// Every request received so far, in order.
    pub(crate) fn requests(&self) -> Vec<Request> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests().len()
    }
}

#[async_trait]
impl NetworkClient for StubClient {
    async fn call(&self, request: Request) -> Response<RawResponse> {
        let url = request.url.clone();
        if let Ok(mut log) = self.requests.lock() {
            log.push(request);
        }
        match self.pages.get(&url) {
            Some((status, body)) if (200..300).contains(status) => Ok(RawResponse {
                url,
                status: *status,
                body: body.clone(),
            }),
            Some((status, _)) => Err(HttpStatusError {
                status: *status,
                url,
            }
            .into()),
            None => Err(HttpStatusError { status: 404, url }.into()),
        }
    }
}
