// src/utils/html_debug.rs
use crate::extractors::forms::FormLayout;
use crate::extractors::normalize::NormalizedDocument;
use html_escape::encode_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Boundary {
    Start,
    End,
}

#[derive(Debug, Clone)]
struct Highlight {
    start: usize,
    end: usize,
    boundary: Boundary,
    label: &'static str,
    in_toc: bool,
}

impl Highlight {
    fn css_class(&self) -> &'static str {
        match (self.boundary, self.in_toc) {
            (Boundary::Start, false) => "highlight-start",
            (Boundary::End, false) => "highlight-end",
            (Boundary::Start, true) => "highlight-toc-start",
            (Boundary::End, true) => "highlight-toc-end",
        }
    }
}

/// Renders the normalized text as HTML with every start/end heading match of
/// `layout` highlighted, numbered by occurrence. Matches inside
/// table-of-contents markup get their own colour.
pub fn annotate_boundaries(doc: &NormalizedDocument, layout: &FormLayout) -> String {
    let text = doc.text();
    let mut highlights = Vec::new();
    for section in &layout.sections {
        let patterns = [
            (Boundary::Start, section.spec.start_pattern()),
            (Boundary::End, section.spec.end_pattern()),
        ];
        for (boundary, pattern) in patterns {
            for m in pattern.find_iter(text) {
                highlights.push(Highlight {
                    start: m.start(),
                    end: m.end(),
                    boundary,
                    label: section.id.label(),
                    in_toc: doc.in_toc(m.start()),
                });
            }
        }
    }
    // Longest match first; a start heading wins over an end heading at the same spot
    highlights.sort_by_key(|h| (h.start, std::cmp::Reverse(h.end), h.boundary));

    // Add debug styling in head
    let mut html = String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n");
    html.push_str("body { font-family: sans-serif; line-height: 1.5; }\n");
    html.push_str(".highlight-start { background-color: #90EE90; }\n");
    html.push_str(".highlight-end { background-color: #FFA500; }\n");
    html.push_str(".highlight-toc-start { background-color: #ADD8E6; }\n");
    html.push_str(".highlight-toc-end { background-color: #FFC0CB; }\n");
    html.push_str("</style>\n</head>\n<body>\n");
    html.push_str(&format!(
        "<p><b>{} layout, {} table-of-contents spans, {} recovered markup errors</b></p>\n<p>",
        layout.form,
        doc.toc_spans().len(),
        doc.degradations()
    ));

    let mut last_pos = 0;
    let mut ordinals = std::collections::HashMap::new();
    for h in highlights {
        // Start and end patterns of neighbouring sections can match the same heading
        if h.start < last_pos {
            continue;
        }
        html.push_str(&encode_text(&text[last_pos..h.start]));

        let ordinal = ordinals.entry((h.label, h.boundary)).or_insert(0usize);
        html.push_str(&format!(
            "<span class=\"{}\" title=\"{} {:?} #{} at {}-{}\">",
            h.css_class(),
            h.label,
            h.boundary,
            ordinal,
            h.start,
            h.end
        ));
        *ordinal += 1;
        html.push_str(&encode_text(&text[h.start..h.end]));
        html.push_str("</span>");
        last_pos = h.end;
    }
    html.push_str(&encode_text(&text[last_pos..]));

    html.push_str("</p>\n</body>\n</html>\n");
    html
}
