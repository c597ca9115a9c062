//! Candidate scoring for content extraction
//!
//! Ranks DOM containers by content density and structural cues: semantic
//! tags are boosted, chrome tags penalized, class/id vocabulary matched
//! token-wise, and hyperlink-heavy regions discounted.

use scraper::{ElementRef, Selector};
use std::sync::OnceLock;

/// Class/id tokens that usually mark body content.
const POSITIVE_HINTS: &[&str] = &[
    "article", "body", "content", "entry", "main", "page", "post", "story", "text", "blog",
];

/// Class/id tokens that usually mark chrome, ads, or widgets.
const NEGATIVE_HINTS: &[&str] = &[
    "comment", "comments", "sidebar", "ad", "ads", "advert", "advertisement", "banner", "footer",
    "foot", "nav", "navigation", "menu", "share", "social", "widget", "promo", "sponsor",
    "related", "breadcrumb", "masthead", "popup", "modal",
];

const HINT_WEIGHT: f64 = 25.0;

fn anchor_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("a").unwrap())
}

/// Structural prior for a candidate, before any paragraph scores accrue.
pub(crate) fn initial_score(el: ElementRef<'_>) -> f64 {
    tag_weight(el.value().name()) + class_id_weight(el)
}

fn tag_weight(name: &str) -> f64 {
    match name {
        "article" => 30.0,
        "main" => 25.0,
        "section" => 8.0,
        "div" => 5.0,
        "td" | "pre" | "blockquote" => 3.0,
        "ol" | "ul" | "dl" => -3.0,
        "nav" | "aside" | "footer" | "header" | "form" => -25.0,
        _ => 0.0,
    }
}

/// Token-wise match of class/id values against the hint vocabularies.
/// Tokenizing avoids substring traps like "ad" inside "header".
fn class_id_weight(el: ElementRef<'_>) -> f64 {
    let mut weight = 0.0;
    for attr in ["class", "id"] {
        let Some(value) = el.value().attr(attr) else {
            continue;
        };
        let value = value.to_ascii_lowercase();
        for token in value.split(|c: char| !c.is_ascii_alphanumeric()) {
            if token.is_empty() {
                continue;
            }
            if POSITIVE_HINTS.contains(&token) {
                weight += HINT_WEIGHT;
            }
            if NEGATIVE_HINTS.contains(&token) {
                weight -= HINT_WEIGHT;
            }
        }
    }
    weight
}

/// Portion of a subtree's text that sits inside hyperlinks, in `0..=1`.
/// Navigation blocks approach 1, article bodies stay near 0.
pub(crate) fn link_density(el: ElementRef<'_>) -> f64 {
    let total: usize = el.text().map(|t| t.trim().chars().count()).sum();
    if total == 0 {
        return 0.0;
    }
    let linked: usize = el
        .select(anchor_selector())
        .flat_map(|a| a.text())
        .map(|t| t.trim().chars().count())
        .sum();
    (linked as f64 / total as f64).min(1.0)
}

/// Score contributed by one paragraph-like element to its ancestors.
/// Commas (ASCII and fullwidth) and raw length both signal prose.
pub(crate) fn paragraph_score(text: &str) -> f64 {
    let chars = text.chars().count();
    let commas = text.matches(',').count() + text.matches('，').count();
    1.0 + commas as f64 + (chars as f64 / 100.0).min(3.0)
}
