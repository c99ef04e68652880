//! Values produced by sources. Created per call and owned by the caller; nothing here
//! points back into a source or the network client.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One book in a catalog listing or search. Identity is `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookResult {
    pub title: String,
    /// Absolute URL of the book page on its source.
    pub url: String,
    /// May be empty when the listing has no cover.
    #[serde(default)]
    pub cover_image_url: String,
    #[serde(default)]
    pub description: String,
}

impl BookResult {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            cover_image_url: String::new(),
            description: String::new(),
        }
    }

    pub fn with_cover(mut self, cover_image_url: impl Into<String>) -> Self {
        self.cover_image_url = cover_image_url.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// One chapter entry of a book. Lists of these are in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterResult {
    pub title: String,
    pub url: String,
}

impl ChapterResult {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Title and normalized text of a downloaded chapter page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterContent {
    pub title: Option<String>,
    pub text: String,
}

/// Drop books whose URL already appeared earlier in `books`, keeping order.
pub fn dedup_by_url(books: Vec<BookResult>) -> Vec<BookResult> {
    let mut seen = HashSet::new();
    books
        .into_iter()
        .filter(|b| seen.insert(b.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn book_result_serializes_camel_case() -> Result<(), Box<dyn Error>> {
        let book = BookResult::new("Shadow Slave", "https://novlove.com/novel/shadow-slave/")
            .with_cover("https://novlove.com/cover.jpg");
        let value: serde_json::Value = serde_json::to_value(&book)?;
        assert_eq!(value["title"].as_str(), Some("Shadow Slave"));
        assert_eq!(
            value["coverImageUrl"].as_str(),
            Some("https://novlove.com/cover.jpg")
        );
        assert_eq!(value["description"].as_str(), Some(""));
        Ok(())
    }

    #[test]
    fn book_result_defaults_optional_fields() -> Result<(), Box<dyn Error>> {
        let book: BookResult =
            serde_json::from_str(r#"{"title":"T","url":"https://example.com/t"}"#)?;
        assert!(book.cover_image_url.is_empty());
        assert!(book.description.is_empty());
        Ok(())
    }

    #[test]
    fn dedup_keeps_first_occurrence_in_order() {
        let books = vec![
            BookResult::new("A", "https://x.com/a"),
            BookResult::new("B", "https://x.com/b"),
            BookResult::new("A again", "https://x.com/a"),
            BookResult::new("C", "https://x.com/c"),
        ];
        let titles: Vec<_> = dedup_by_url(books).into_iter().map(|b| b.title).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }
}
