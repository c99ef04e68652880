//! Immutable, chainable URL builder. Every step consumes the builder and returns a new
//! one, so two callers can never observe each other's intermediate state.

use super::error::Response;
use std::fmt;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBuilder {
    url: Url,
}

impl UrlBuilder {
    /// Parse an absolute URL. Malformed input is a Parsing error.
    pub fn parse(input: &str) -> Response<Self> {
        Ok(Self {
            url: Url::parse(input.trim())?,
        })
    }

    /// Append path segments. `segment` may contain `/`; empty pieces are skipped and a
    /// trailing slash on the current path does not produce an empty segment.
    pub fn add_path(mut self, segment: &str) -> Self {
        if let Ok(mut segments) = self.url.path_segments_mut() {
            segments.pop_if_empty();
            segments.extend(segment.split('/').filter(|s| !s.is_empty()));
        }
        self
    }

    pub fn add_paths<'a>(self, segments: impl IntoIterator<Item = &'a str>) -> Self {
        segments.into_iter().fold(self, |b, s| b.add_path(s))
    }

    /// End the path with `/`.
    pub fn trailing_slash(mut self) -> Self {
        if !self.url.path().ends_with('/') {
            if let Ok(mut segments) = self.url.path_segments_mut() {
                segments.push("");
            }
        }
        self
    }

    pub fn add_query_param(mut self, key: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(key, value);
        self
    }

    pub fn add_query_params<'a>(
        mut self,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        {
            let mut query = self.url.query_pairs_mut();
            for (key, value) in pairs {
                query.append_pair(key, value);
            }
        }
        self
    }

    pub fn clear_query(mut self) -> Self {
        self.url.set_query(None);
        self
    }

    /// Apply `f` only when `condition` holds.
    pub fn apply_if(self, condition: bool, f: impl FnOnce(Self) -> Self) -> Self {
        if condition {
            f(self)
        } else {
            self
        }
    }

    pub fn build(self) -> String {
        self.url.into()
    }
}

impl fmt::Display for UrlBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

impl From<UrlBuilder> for String {
    fn from(builder: UrlBuilder) -> Self {
        builder.build()
    }
}

/// Resolve `href` against `base`; absolute hrefs are returned unchanged.
pub fn absolute_url(base: &str, href: &str) -> Response<String> {
    let base = Url::parse(base)?;
    Ok(base.join(href.trim())?.into())
}
