// src/extractors/section.rs

// --- Imports ---
use crate::extractors::normalize::NormalizedDocument;
use crate::utils::error::ExtractError;
use regex::{Match, Regex, RegexBuilder};
use serde::Serialize;

/// Text used in place of a section that could not be delimited.
pub const NOT_FOUND: &str = "Not found";

/// How to carve one section out of normalized text.
///
/// Occurrence 0 of a heading is usually its table-of-contents entry, so by
/// default the section starts after occurrence 1.
#[derive(Debug, Clone)]
pub struct BoundarySpec {
    start: Regex,
    end: Regex,
    start_index: usize,
}

impl BoundarySpec {
    pub const DEFAULT_START_INDEX: usize = 1;

    /// Compiles both heading patterns case-insensitively.
    pub fn new(start_pattern: &str, end_pattern: &str) -> Result<Self, ExtractError> {
        Ok(Self {
            start: compile(start_pattern)?,
            end: compile(end_pattern)?,
            start_index: Self::DEFAULT_START_INDEX,
        })
    }

    pub fn with_start_index(mut self, start_index: usize) -> Self {
        self.start_index = start_index;
        self
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    pub fn start_pattern(&self) -> &Regex {
        &self.start
    }

    pub fn end_pattern(&self) -> &Regex {
        &self.end
    }
}

fn compile(pattern: &str) -> Result<Regex, ExtractError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ExtractError::RegexError {
            pattern: pattern.to_string(),
            source,
        })
}

/// Which assumption picked the start heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Anchor {
    /// First heading occurrence outside table-of-contents markup; `skipped`
    /// earlier occurrences sat inside contents structure.
    Structural { skipped: usize },
    /// No structure available; the occurrence at `ordinal` was assumed to be the real heading.
    Positional { ordinal: usize },
}

/// A delimited section and the assumption behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located<'t> {
    pub text: &'t str,
    pub anchor: Anchor,
}

/// Positional extraction: the trimmed text strictly between start occurrence
/// `spec.start_index()` and the first end heading after it.
///
/// Returns `None` when there are not enough start occurrences or no end
/// heading follows. A document without a contents entry, where the heading
/// occurs only once, is therefore reported as not found too.
pub fn extract<'t>(text: &'t str, spec: &BoundarySpec) -> Option<&'t str> {
    let starts: Vec<Match<'t>> = spec.start.find_iter(text).collect();
    let start = starts.get(spec.start_index)?;
    span_until_end(text, start.end(), &spec.end)
}

/// Section lookup that prefers structural signals over position.
///
/// When any start occurrence lies inside table-of-contents markup, the first
/// occurrence outside it is used. If that yields nothing (every occurrence is
/// marked, or no end heading follows) or no occurrence is marked at all, this
/// is [`extract`].
pub fn locate<'d>(doc: &'d NormalizedDocument, spec: &BoundarySpec) -> Option<Located<'d>> {
    let text = doc.text();
    let starts: Vec<Match<'d>> = spec.start.find_iter(text).collect();
    if starts.is_empty() {
        tracing::trace!("No occurrence of start pattern /{}/", spec.start.as_str());
        return None;
    }

    if starts.iter().any(|m| doc.in_toc(m.start())) {
        if let Some(located) = locate_structural(doc, &starts, spec) {
            return Some(located);
        }
        tracing::debug!(
            "Contents markup gave no usable start among {} occurrences; taking occurrence {}",
            starts.len(),
            spec.start_index()
        );
    } else {
        tracing::debug!(
            "No contents markup around {} start occurrences; taking occurrence {}",
            starts.len(),
            spec.start_index()
        );
    }

    extract(text, spec).map(|section| Located {
        text: section,
        anchor: Anchor::Positional {
            ordinal: spec.start_index(),
        },
    })
}

fn locate_structural<'d>(doc: &'d NormalizedDocument, starts: &[Match<'d>], spec: &BoundarySpec) -> Option<Located<'d>> {
    let (skipped, start) = starts.iter().enumerate().find(|(_, m)| !doc.in_toc(m.start()))?;
    tracing::debug!(
        "Start heading '{}' at byte {} after {} contents entries",
        start.as_str(),
        start.start(),
        skipped
    );
    let section = span_until_end(doc.text(), start.end(), &spec.end)?;
    Some(Located {
        text: section,
        anchor: Anchor::Structural { skipped },
    })
}

fn span_until_end<'t>(text: &'t str, from: usize, end: &Regex) -> Option<&'t str> {
    let end = end.find_iter(text).find(|m| m.start() > from)?;
    Some(text[from..end.start()].trim())
}

/// Result of looking up one section: text or the not-found sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionOutcome {
    Found { text: String, anchor: Anchor },
    NotFound,
}

impl SectionOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            SectionOutcome::Found { text, .. } => Some(text),
            SectionOutcome::NotFound => None,
        }
    }

    pub fn anchor(&self) -> Option<Anchor> {
        match self {
            SectionOutcome::Found { anchor, .. } => Some(*anchor),
            SectionOutcome::NotFound => None,
        }
    }

    /// Section text, or [`NOT_FOUND`].
    pub fn text_or_sentinel(&self) -> &str {
        self.text().unwrap_or(NOT_FOUND)
    }
}

impl From<Option<Located<'_>>> for SectionOutcome {
    fn from(located: Option<Located<'_>>) -> Self {
        match located {
            Some(Located { text, anchor }) => SectionOutcome::Found {
                text: text.to_string(),
                anchor,
            },
            None => SectionOutcome::NotFound,
        }
    }
}
