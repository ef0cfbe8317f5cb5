// src/extractors/normalize.rs

// --- Imports ---
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::node::{Element, Node};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::ops::Range;

// Elements whose content is never visible narrative text
const SUPPRESSED_TAGS: &[&str] = &["script", "style", "ix:header", "ix:nonnumeric", "ix:nonfraction"];

// Containers explicitly marked as a table of contents
static TOC_CONTAINER_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div[class*='toc'], nav[class*='toc'], div[id*='toc'], nav[id*='toc']")
        .expect("Failed to compile TOC_CONTAINER_SELECTOR")
});

// "Item 7", "Item 1A" ... as listed in a contents table
static ITEM_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bitem\s+(\d{1,2}[a-c]?)\b").expect("Failed to compile ITEM_LABEL_RE")
});

/// Plain text of a filing: single spaces only, no markup.
///
/// Alongside the text it keeps the byte ranges that came from table-of-contents
/// structure (in-document links, `toc` containers, tables listing several items).
/// Those ranges let the section locator tell a contents entry from a real heading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedDocument {
    text: String,
    toc_spans: Vec<Range<usize>>,
    degradations: usize,
}

impl NormalizedDocument {
    /// Normalizes text that carries no markup structure.
    pub fn from_text(text: &str) -> Self {
        let mut builder = TextBuilder::default();
        builder.push_words(text, false);
        builder.finish(0)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn toc_spans(&self) -> &[Range<usize>] {
        &self.toc_spans
    }

    /// Number of markup errors the parser recovered from.
    pub fn degradations(&self) -> usize {
        self.degradations
    }

    /// Whether the byte at `offset` came from table-of-contents markup.
    pub fn in_toc(&self, offset: usize) -> bool {
        let idx = self.toc_spans.partition_point(|span| span.end <= offset);
        self.toc_spans.get(idx).map_or(false, |span| span.start <= offset)
    }
}

#[derive(Default)]
struct TextBuilder {
    text: String,
    toc_spans: Vec<Range<usize>>,
}

impl TextBuilder {
    fn push_words(&mut self, fragment: &str, in_toc: bool) {
        for word in fragment.split_whitespace() {
            if !self.text.is_empty() {
                self.text.push(' ');
            }
            let start = self.text.len();
            self.text.push_str(word);
            if in_toc {
                self.mark_toc(start, self.text.len());
            }
        }
    }

    fn mark_toc(&mut self, start: usize, end: usize) {
        // Words separated by a single space belong to the same span
        if let Some(last) = self.toc_spans.last_mut() {
            if last.end + 1 >= start {
                last.end = end;
                return;
            }
        }
        self.toc_spans.push(start..end);
    }

    fn finish(self, degradations: usize) -> NormalizedDocument {
        NormalizedDocument {
            text: self.text,
            toc_spans: self.toc_spans,
            degradations,
        }
    }
}

/// Converts raw filing markup into a [`NormalizedDocument`].
///
/// Never fails: html5ever recovers from malformed markup, and each recovery is
/// counted as a degradation rather than aborting the document.
pub fn normalize(raw_markup: &str) -> NormalizedDocument {
    let document = Html::parse_document(raw_markup);
    let degradations = document.errors.len();
    if degradations > 0 {
        tracing::debug!("Recovered from {} markup errors while parsing", degradations);
    }

    let mut builder = TextBuilder::default();
    // Iterative pre-order walk; filings can nest deeply
    let mut stack = vec![(document.tree.root(), false)];
    while let Some((node, in_toc)) = stack.pop() {
        let in_toc = match node.value() {
            Node::Text(text) => {
                builder.push_words(text, in_toc);
                continue;
            }
            Node::Element(element) => {
                if is_suppressed(element) {
                    continue;
                }
                in_toc || ElementRef::wrap(node).map_or(false, is_toc_marker)
            }
            _ => in_toc,
        };
        let children: Vec<_> = node.children().collect();
        stack.extend(children.into_iter().rev().map(|child| (child, in_toc)));
    }

    let normalized = builder.finish(degradations);
    tracing::debug!(
        "Normalized document: {} bytes of text, {} table-of-contents spans",
        normalized.text.len(),
        normalized.toc_spans.len()
    );
    normalized
}

fn is_suppressed(element: &Element) -> bool {
    if SUPPRESSED_TAGS.contains(&element.name()) {
        return true;
    }
    element.attr("style").map_or(false, |style| {
        let compact: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        compact.contains("display:none")
    })
}

/// Checks whether an element opens table-of-contents structure.
fn is_toc_marker(element: ElementRef) -> bool {
    let name = element.value().name();

    // In-document link, the usual shape of a contents entry
    if name == "a" && element.value().attr("href").map_or(false, |href| href.starts_with('#')) {
        tracing::trace!("In-document link treated as contents entry");
        return true;
    }

    if TOC_CONTAINER_SELECTOR.matches(&element) {
        tracing::trace!("<{}> matches table-of-contents container selector", name);
        return true;
    }

    // A table listing several distinct items is a contents table, not a heading row
    if name == "table" {
        let text = element.text().collect::<Vec<_>>().join(" ");
        let labels: HashSet<String> = ITEM_LABEL_RE
            .captures_iter(&text)
            .map(|caps| caps[1].to_ascii_lowercase())
            .collect();
        if labels.len() >= 2 {
            tracing::trace!("Table lists {} items, treated as contents table", labels.len());
            return true;
        }
    }

    false
}
