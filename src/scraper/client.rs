//! Async HTTP client abstraction and the fault-to-[Response] funnel.
//!
//! Adapters only see [NetworkClient]; the reqwest-backed [HttpClient] is what the
//! registry is normally built with. Retries and request pacing are left to callers.

use super::error::{HttpStatusError, Response, ScrapeError};
use async_trait::async_trait;
use futures::FutureExt;
use scraper::Html;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; novelscrape/0.1; +https://github.com/novelscrape)";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Request body. Form bodies are sent as `application/x-www-form-urlencoded`.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Form(Vec<(String, String)>),
    Json(serde_json::Value),
}

/// One HTTP request. Built per call and never shared.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Body>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            ..Self::get(url)
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set a form-encoded body.
    pub fn form<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.body = Some(Body::Form(pairs));
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = Some(Body::Json(value));
        self
    }
}

/// A successful (2xx) response with its body already read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    /// Parse the body as an HTML document. Html is not `Send`: parse after the last await.
    pub fn to_document(&self) -> Html {
        Html::parse_document(&self.body)
    }

    pub fn to_json(&self) -> Response<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Issues requests on behalf of sources. Non-2xx statuses come back as
/// [ScrapeError::Network].
#[async_trait]
pub trait NetworkClient: Send + Sync {
    async fn call(&self, request: Request) -> Response<RawResponse>;

    async fn get(&self, url: &str) -> Response<RawResponse> {
        self.call(Request::get(url)).await
    }

    async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Response<RawResponse> {
        let request = headers
            .iter()
            .fold(Request::get(url), |r, (k, v)| r.header(*k, *v));
        self.call(request).await
    }
}

/// reqwest-backed [NetworkClient]. Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    /// Build a client with default User-Agent and timeout.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }
}

#[async_trait]
impl NetworkClient for HttpClient {
    async fn call(&self, request: Request) -> Response<RawResponse> {
        debug!(method = ?request.method, url = %request.url, "sending request");
        let mut builder = match request.method {
            Method::Get => self.inner.get(request.url.as_str()),
            Method::Post => self.inner.post(request.url.as_str()),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &request.body {
            Some(Body::Form(pairs)) => builder.form(pairs),
            Some(Body::Json(value)) => builder.json(value),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        let url = response.url().to_string();
        if !status.is_success() {
            return Err(HttpStatusError {
                status: status.as_u16(),
                url,
            }
            .into());
        }
        let body = response.text().await?;
        debug!(url = %url, status = status.as_u16(), bytes = body.len(), "received response");
        Ok(RawResponse {
            url,
            status: status.as_u16(),
            body,
        })
    }
}

/// Builder for [HttpClient] with optional User-Agent and timeout.
#[derive(Debug)]
pub struct HttpClientBuilder {
    user_agent: Option<String>,
    timeout_secs: u64,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl HttpClientBuilder {
    /// Set a custom User-Agent. If not set, a browser-like default is used.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set request timeout in seconds. Default 30.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<HttpClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(HttpClient { inner })
    }
}

/// Cause attached to [ScrapeError::Unknown] when an operation panicked.
#[derive(Debug, Error)]
#[error("panicked: {0}")]
pub struct PanicError(pub String);

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run one fetch+parse sequence and turn its outcome into a [Response].
///
/// `Ok(v)` passes through untouched. Errors are converted with `Into<ScrapeError>`
/// (which classifies them); a panic inside `block` becomes [ScrapeError::Unknown].
/// Every failure is logged once here with `context`.
pub async fn try_connect<T, E, F>(context: &str, block: F) -> Response<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<ScrapeError>,
{
    let result = match AssertUnwindSafe(block).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.into()),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            Err(ScrapeError::unknown(
                format!("{} failed unexpectedly", context),
                Some(Box::new(PanicError(message))),
            ))
        }
    };
    if let Err(ref e) = result {
        warn!(context, kind = ?e.kind(), error = %e, "operation failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use std::io;

    #[tokio::test]
    async fn try_connect_passes_value_through() {
        let value = vec!["a".to_string(), "b".to_string()];
        let expected = value.clone();
        let out = try_connect("test", async move { Ok::<_, ScrapeError>(value) }).await;
        assert_eq!(out.ok(), Some(expected));
    }

    #[tokio::test]
    async fn try_connect_classifies_timeout_as_network() {
        let out: Response<()> = try_connect("test", async {
            Err(io::Error::new(io::ErrorKind::TimedOut, "request timed out"))
        })
        .await;
        let err = match out {
            Err(e) => e,
            Ok(()) => panic!("expected an error"),
        };
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(!err.message().is_empty());
        let kind = err
            .cause()
            .and_then(|c| c.downcast_ref::<io::Error>())
            .map(|c| c.kind());
        assert_eq!(kind, Some(io::ErrorKind::TimedOut));
    }

    #[tokio::test]
    async fn try_connect_turns_panic_into_unknown() {
        let out: Response<u32> = try_connect("panicky", async {
            let missing: Option<u32> = None;
            Ok::<_, ScrapeError>(missing.expect("required element"))
        })
        .await;
        let err = match out {
            Err(e) => e,
            Ok(v) => panic!("expected an error, got {}", v),
        };
        assert_eq!(err.kind(), ErrorKind::Unknown);
        let cause = err
            .cause()
            .and_then(|c| c.downcast_ref::<PanicError>())
            .map(|p| p.0.clone());
        assert_eq!(cause.as_deref(), Some("required element"));
    }

    #[test]
    fn to_json_rejects_html() {
        let response = RawResponse {
            url: "https://example.com/".to_string(),
            status: 200,
            body: "<html></html>".to_string(),
        };
        let err = match response.to_json() {
            Err(e) => e,
            Ok(v) => panic!("expected parse failure, got {}", v),
        };
        assert_eq!(err.kind(), ErrorKind::Parsing);
    }

    #[test]
    fn request_builders_set_method_headers_and_body() {
        let request = Request::post("https://example.com/search")
            .header("Referer", "https://example.com/")
            .form([("keyboard", "sword"), ("show", "title")]);
        assert_eq!(request.method, Method::Post);
        assert_eq!(
            request.headers,
            vec![("Referer".to_string(), "https://example.com/".to_string())]
        );
        assert_eq!(
            request.body,
            Some(Body::Form(vec![
                ("keyboard".to_string(), "sword".to_string()),
                ("show".to_string(), "title".to_string()),
            ]))
        );
        assert_eq!(Request::get("https://example.com/").body, None);
    }
}
