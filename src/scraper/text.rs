//! DOM subtree to normalized plain text.
//!
//! Paragraph-like elements become blank-line separated blocks, `<br>` is a single line
//! break, runs of whitespace inside a line collapse to one space, and non-content
//! elements (scripts, styles, form controls) are dropped.

use scraper::node::Node;
use scraper::{ElementRef, Selector};

const SKIPPED: &[&str] = &[
    "script", "style", "noscript", "template", "button", "input", "select", "option",
    "textarea", "form", "iframe", "svg", "nav",
];

const BLOCKS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main",
    "ol", "p", "pre", "section", "table", "tr", "ul",
];

pub struct TextExtractor;

impl TextExtractor {
    /// Normalized text of `element` and its descendants.
    pub fn get(element: ElementRef<'_>) -> String {
        Self::get_excluding(element, &[])
    }

    /// Like [TextExtractor::get] but also drops any descendant matching one of `excluded`
    /// (site chrome inside the content node, e.g. an "alternate titles" box).
    pub fn get_excluding(element: ElementRef<'_>, excluded: &[&Selector]) -> String {
        let mut raw = String::new();
        walk(element, excluded, &mut raw);
        normalize(&raw)
    }
}

fn walk(element: ElementRef<'_>, excluded: &[&Selector], out: &mut String) {
    for child in element.children() {
        match child.value() {
            // Source newlines are layout, not content.
            Node::Text(text) => out.push_str(&text.replace(['\n', '\r'], " ")),
            Node::Element(el) => {
                let name = el.name();
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                if SKIPPED.contains(&name) {
                    continue;
                }
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                if excluded.iter().any(|s| s.matches(&child_ref)) {
                    continue;
                }
                let block = BLOCKS.contains(&name);
                if block {
                    out.push_str("\n\n");
                }
                walk(child_ref, excluded, out);
                if block {
                    out.push_str("\n\n");
                }
            }
            _ => {}
        }
    }
}

/// Collapse intra-line whitespace, trim lines, keep at most one blank line between
/// blocks, trim the whole result.
fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0usize;
    for line in raw.split('\n') {
        let collapsed = line
            .split(|c: char| c.is_whitespace() || c == '\u{a0}')
            .filter(|w| !w.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if collapsed.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 1 { "\n\n" } else { "\n" });
        }
        out.push_str(&collapsed);
        blank_run = 0;
    }
    out
}
