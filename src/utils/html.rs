// src/utils/html.rs

//! Text views over parsed documents.

use scraper::{ElementRef, Html, Selector};

/// Elements whose text is never part of the page content.
const NON_CONTENT: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// Visible text of an element, one trimmed line per text node.
pub fn element_lines(element: ElementRef<'_>) -> Vec<String> {
    element
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|e| NON_CONTENT.contains(&e.name()))
            });
            if hidden {
                return None;
            }
            let line = text.trim();
            (!line.is_empty()).then(|| line.to_string())
        })
        .collect()
}

/// Visible text of the whole document, newline separated.
pub fn visible_text(document: &Html) -> String {
    element_lines(document.root_element()).join("\n")
}

/// Trimmed `<title>` text, if present and non-empty.
pub fn page_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let title: String = document.select(&selector).next()?.text().collect();
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}
