//! Readability-style content extraction
//!
//! Parses arbitrary HTML, ranks candidate containers by content density,
//! and isolates the primary article from navigation, ads, and
//! boilerplate. Extraction either yields a real [`Article`] or fails;
//! callers never receive a silently empty result.

mod score;

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Fallback when no title can be derived from the document.
pub const TITLE_PLACEHOLDER: &str = "Untitled";

/// Minimum final score a container must reach to qualify as content.
const MIN_CANDIDATE_SCORE: f64 = 10.0;

/// Paragraphs shorter than this contribute nothing to candidate scores.
const MIN_PARAGRAPH_CHARS: usize = 25;

/// Longest excerpt synthesized from body text when metadata is absent.
const MAX_EXCERPT_CHARS: usize = 200;

/// Elements removed from the selected subtree during serialization.
const STRIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "frame", "object", "embed", "form",
    "button", "input", "select", "textarea", "option", "label", "link", "meta", "svg", "canvas",
    "audio", "video", "source", "track", "dialog",
];

/// HTML void elements: no children, no end tag.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("No qualifying content region found in document")]
    NoContent,

    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// Whether extracted body content keeps its markup or is reduced to
/// plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Html,
    Text,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionOptions {
    pub output_format: OutputFormat,
}

/// The isolated primary content of a page.
#[derive(Debug, Clone)]
pub struct Article {
    /// Never empty; falls back to [`TITLE_PLACEHOLDER`].
    pub title: String,
    /// Lead string from metadata or the first sentence; possibly empty.
    pub excerpt: String,
    /// Character count of the plain-text rendering.
    pub length: usize,
    /// From site metadata; possibly empty.
    pub site_name: String,
    /// Markup or plain text, per [`OutputFormat`].
    pub content: String,
    /// Plain-text rendering; `Some` only in [`OutputFormat::Html`] mode.
    pub text_content: Option<String>,
}

/// Boilerplate-removing extractor. Stateless; one call per document.
pub struct ContentExtractor;

impl ContentExtractor {
    /// Isolate the primary article of `html`, resolving relative
    /// references against `base_url`.
    pub fn extract(
        html: &str,
        base_url: &str,
        options: &ExtractionOptions,
    ) -> Result<Article, ExtractError> {
        let base = Url::parse(base_url).map_err(|e| ExtractError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        let doc = Html::parse_document(html);
        let content_nodes = select_content_nodes(&doc)?;

        let mut text = String::new();
        for node in &content_nodes {
            collect_text(*node, &mut text);
        }
        let text = normalize_text(&text);
        if text.is_empty() {
            return Err(ExtractError::NoContent);
        }

        let title = derive_title(&doc);
        let excerpt = derive_excerpt(&doc, &text);
        let site_name = meta_content(&doc, r#"meta[property="og:site_name"]"#).unwrap_or_default();
        let length = text.chars().count();

        debug!(length, title = %title, "content extracted");

        let article = match options.output_format {
            OutputFormat::Html => {
                let mut markup = String::new();
                for node in &content_nodes {
                    serialize_clean(*node, &base, &mut markup);
                }
                Article {
                    title,
                    excerpt,
                    length,
                    site_name,
                    content: markup,
                    text_content: Some(text),
                }
            }
            OutputFormat::Text => Article {
                title,
                excerpt,
                length,
                site_name,
                content: text,
                text_content: None,
            },
        };
        Ok(article)
    }
}

fn paragraph_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("p, pre, td, blockquote").unwrap())
}

/// Score candidates and pick the primary content root plus qualifying
/// siblings, in document order.
fn select_content_nodes(doc: &Html) -> Result<Vec<ElementRef<'_>>, ExtractError> {
    // Paragraph scores accrue to the parent and, at half value, the
    // grandparent, so wrapper-split articles still rank as one region.
    let mut scores = HashMap::new();
    let mut elements = HashMap::new();

    for para in doc.select(paragraph_selector()) {
        let text = squash(para.text());
        if text.chars().count() < MIN_PARAGRAPH_CHARS {
            continue;
        }
        let base_score = score::paragraph_score(&text);

        if let Some(parent) = para.parent().and_then(ElementRef::wrap) {
            *scores
                .entry(parent.id())
                .or_insert_with(|| score::initial_score(parent)) += base_score;
            elements.entry(parent.id()).or_insert(parent);

            if let Some(grandparent) = parent.parent().and_then(ElementRef::wrap) {
                *scores
                    .entry(grandparent.id())
                    .or_insert_with(|| score::initial_score(grandparent)) += base_score / 2.0;
                elements.entry(grandparent.id()).or_insert(grandparent);
            }
        }
    }

    let mut final_scores = HashMap::new();
    for (id, raw) in &scores {
        let el = elements[id];
        final_scores.insert(*id, raw * (1.0 - score::link_density(el)));
    }

    let (&top_id, &top_score) = final_scores
        .iter()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .ok_or(ExtractError::NoContent)?;
    if top_score < MIN_CANDIDATE_SCORE {
        return Err(ExtractError::NoContent);
    }
    let top = elements[&top_id];
    debug!(score = top_score, tag = top.value().name(), "selected content root");

    // Recover siblings the page split off the main container: anything
    // scoring within tolerance of the root, or a substantial paragraph.
    let sibling_threshold = (top_score * 0.2).max(MIN_CANDIDATE_SCORE);
    let mut nodes = Vec::new();
    if let Some(parent) = top.parent().and_then(ElementRef::wrap) {
        for child in parent.children().filter_map(ElementRef::wrap) {
            if child.id() == top.id() {
                nodes.push(child);
            } else if final_scores
                .get(&child.id())
                .is_some_and(|s| *s >= sibling_threshold)
            {
                nodes.push(child);
            } else if child.value().name() == "p"
                && squash(child.text()).chars().count() >= 80
            {
                nodes.push(child);
            }
        }
    }
    if nodes.is_empty() {
        nodes.push(top);
    }
    Ok(nodes)
}

/// Collapse all whitespace runs to single spaces and trim.
fn squash<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    let mut pending_space = false;
    for part in parts {
        for c in part.chars() {
            if c.is_whitespace() {
                pending_space = !out.is_empty();
            } else {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                out.push(c);
            }
        }
    }
    out
}

/// Plain-text rendering of a subtree, stripping non-content elements and
/// breaking lines after block elements.
fn collect_text(el: ElementRef<'_>, out: &mut String) {
    let name = el.value().name();
    if STRIP_TAGS.contains(&name) {
        return;
    }
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
    if is_block(name) {
        out.push('\n');
    }
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "section"
            | "article"
            | "main"
            | "aside"
            | "li"
            | "tr"
            | "table"
            | "br"
            | "hr"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "blockquote"
            | "pre"
            | "ul"
            | "ol"
            | "dl"
            | "figure"
            | "figcaption"
    )
}

/// Trim lines, collapse inner whitespace, and drop blank-line runs.
fn normalize_text(raw: &str) -> String {
    let mut out = String::new();
    for line in raw.lines() {
        let line = squash(std::iter::once(line));
        if line.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&line);
    }
    out
}

/// Serialize a subtree, dropping stripped tags, inline event handlers,
/// and style attributes, and resolving `href`/`src` against the base URL.
fn serialize_clean(el: ElementRef<'_>, base: &Url, out: &mut String) {
    let name = el.value().name();
    if STRIP_TAGS.contains(&name) {
        return;
    }

    out.push('<');
    out.push_str(name);
    for (attr, value) in el.value().attrs() {
        if attr.starts_with("on") || attr == "style" {
            continue;
        }
        let resolved;
        let value = if matches!(attr, "href" | "src")
            && let Ok(absolute) = base.join(value)
        {
            resolved = absolute.to_string();
            &resolved
        } else {
            value
        };
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        escape_into(value, out);
        out.push('"');
    }
    out.push('>');

    if VOID_TAGS.contains(&name) {
        return;
    }

    for child in el.children() {
        match child.value() {
            Node::Text(text) => escape_into(text, out),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    serialize_clean(child_el, base, out);
                }
            }
            _ => {}
        }
    }

    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn escape_into(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    doc.select(&selector)
        .find_map(|el| el.value().attr("content"))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn first_text(doc: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    doc.select(&selector)
        .map(|el| squash(el.text()))
        .find(|t| !t.is_empty())
}

fn derive_title(doc: &Html) -> String {
    meta_content(doc, r#"meta[property="og:title"]"#)
        .or_else(|| first_text(doc, "title"))
        .or_else(|| first_text(doc, "h1"))
        .unwrap_or_else(|| TITLE_PLACEHOLDER.to_string())
}

fn derive_excerpt(doc: &Html, text: &str) -> String {
    meta_content(doc, r#"meta[name="description"]"#)
        .or_else(|| meta_content(doc, r#"meta[property="og:description"]"#))
        .unwrap_or_else(|| first_sentence(text))
}

/// First sentence-equivalent span of the extracted text, capped at
/// [`MAX_EXCERPT_CHARS`].
fn first_sentence(text: &str) -> String {
    let flat = squash(std::iter::once(text));
    let mut out = String::new();
    for c in flat.chars() {
        out.push(c);
        if matches!(c, '.' | '!' | '?' | '。' | '！' | '？') || out.chars().count() >= MAX_EXCERPT_CHARS
        {
            break;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_URL: &str = "https://example.com/posts/rust";

    const ARTICLE_FIXTURE: &str = r#"<html>
      <head>
        <title>Rust in Production</title>
        <meta name="description" content="How we ship Rust services.">
        <meta property="og:site_name" content="Example Engineering">
      </head>
      <body>
        <nav><a href="/">Home</a><a href="/blog">Blog</a><a href="/about">About</a></nav>
        <article>
          <h1>Rust in Production</h1>
          <p>We moved our ingestion pipeline to Rust last spring, and the rewrite paid for
             itself within a quarter, mostly through fewer pages and calmer on-call weeks.</p>
          <p>The second thing we noticed, once the services settled, was that memory usage
             stopped being a conversation topic entirely, which nobody had predicted.</p>
          <p>Read the <a href="/follow-up">follow-up post</a> for the benchmark numbers,
             the allocator tuning, and the parts that did not go smoothly at all.</p>
        </article>
        <footer><a href="/contact">Contact</a> © 2026 Example Engineering</footer>
      </body>
    </html>"#;

    #[test]
    fn extracts_article_and_excludes_boilerplate() {
        let article =
            ContentExtractor::extract(ARTICLE_FIXTURE, BASE_URL, &ExtractionOptions::default())
                .expect("extraction should succeed");

        let text = article.text_content.as_deref().expect("html mode keeps text");
        assert!(text.contains("ingestion pipeline"));
        assert!(text.contains("memory usage"));
        assert!(!text.contains("Home"), "nav text leaked into content");
        assert!(!text.contains("Contact"), "footer text leaked into content");
        assert!(article.content.contains("<p>"), "html mode keeps markup");
    }

    #[test]
    fn length_matches_text_content() {
        let article =
            ContentExtractor::extract(ARTICLE_FIXTURE, BASE_URL, &ExtractionOptions::default())
                .unwrap();
        let text = article.text_content.as_deref().unwrap();
        assert_eq!(article.length, text.chars().count());
    }

    #[test]
    fn derives_metadata() {
        let article =
            ContentExtractor::extract(ARTICLE_FIXTURE, BASE_URL, &ExtractionOptions::default())
                .unwrap();
        assert_eq!(article.title, "Rust in Production");
        assert_eq!(article.excerpt, "How we ship Rust services.");
        assert_eq!(article.site_name, "Example Engineering");
    }

    #[test]
    fn resolves_relative_links_against_base() {
        let article =
            ContentExtractor::extract(ARTICLE_FIXTURE, BASE_URL, &ExtractionOptions::default())
                .unwrap();
        assert!(
            article.content.contains(r#"href="https://example.com/follow-up""#),
            "relative href not resolved: {}",
            article.content
        );
    }

    #[test]
    fn text_mode_returns_plain_text_only() {
        let options = ExtractionOptions {
            output_format: OutputFormat::Text,
        };
        let article = ContentExtractor::extract(ARTICLE_FIXTURE, BASE_URL, &options).unwrap();
        assert!(article.text_content.is_none());
        assert!(!article.content.contains('<'));
        assert_eq!(article.length, article.content.chars().count());
    }

    #[test]
    fn empty_body_fails_with_no_content() {
        let html = "<html><head><title>Empty</title></head><body></body></html>";
        let err = ContentExtractor::extract(html, BASE_URL, &ExtractionOptions::default())
            .expect_err("empty body must not extract");
        assert!(matches!(err, ExtractError::NoContent));
    }

    #[test]
    fn link_farm_fails_with_no_content() {
        let html = r#"<html><body><nav>
            <p><a href="/a">A link list, with commas, pretending to be prose here</a></p>
            <p><a href="/b">Another link only paragraph that carries no real content</a></p>
        </nav></body></html>"#;
        let err = ContentExtractor::extract(html, BASE_URL, &ExtractionOptions::default())
            .expect_err("pure link farm must not qualify");
        assert!(matches!(err, ExtractError::NoContent));
    }

    #[test]
    fn scripts_and_forms_are_stripped() {
        let html = r#"<html><body><article>
            <p>Some long enough paragraph describing the actual article content, with commas,
               and a reasonable amount of text to score well in candidate selection.</p>
            <script>alert("tracking")</script>
            <form><input name="q"><button>Search</button></form>
            <p>Another long enough paragraph continuing the body of the article so that the
               container keeps a healthy density score across the subtree.</p>
        </article></body></html>"#;
        let article =
            ContentExtractor::extract(html, BASE_URL, &ExtractionOptions::default()).unwrap();
        assert!(!article.content.contains("script"));
        assert!(!article.content.contains("tracking"));
        assert!(!article.content.contains("form"));
        let text = article.text_content.as_deref().unwrap();
        assert!(!text.contains("tracking"));
        assert!(!text.contains("Search"));
    }

    #[test]
    fn title_falls_back_to_placeholder() {
        let html = r#"<html><body><div>
            <p>A page with no title element anywhere, only this single content paragraph,
               which is still long enough, with commas, to qualify as the main region.</p>
            <p>A second paragraph follows to give the wrapper container enough density to
               pass the candidate threshold without any semantic tags at play.</p>
        </div></body></html>"#;
        let article =
            ContentExtractor::extract(html, BASE_URL, &ExtractionOptions::default()).unwrap();
        assert_eq!(article.title, TITLE_PLACEHOLDER);
    }

    #[test]
    fn excerpt_falls_back_to_first_sentence() {
        let html = r#"<html><body><article>
            <p>The opening sentence sets the scene. Everything after the first period is
               not part of the excerpt, however long the paragraph happens to run on.</p>
            <p>More body text follows here so the article is comfortably extractable, with
               commas, and enough length for scoring purposes overall.</p>
        </article></body></html>"#;
        let article =
            ContentExtractor::extract(html, BASE_URL, &ExtractionOptions::default()).unwrap();
        assert_eq!(article.excerpt, "The opening sentence sets the scene.");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = ContentExtractor::extract("<p>x</p>", "not a url", &ExtractionOptions::default())
            .expect_err("invalid base URL must fail");
        assert!(matches!(err, ExtractError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn merges_qualifying_sibling_paragraphs() {
        // Article body split across a wrapper div and a stray paragraph.
        let html = r#"<html><body><main>
            <div class="post-content">
                <p>The wrapper div holds the bulk of the article text, sentence after
                   sentence, with commas, and makes an easy top candidate overall.</p>
                <p>A second paragraph keeps the density of the wrapper high enough that
                   its score dominates every other container on the page.</p>
            </div>
            <p>An orphaned closing paragraph that the page template left outside of the
               wrapper div but that clearly still belongs to the article body itself.</p>
        </main></body></html>"#;
        let article =
            ContentExtractor::extract(html, BASE_URL, &ExtractionOptions::default()).unwrap();
        let text = article.text_content.as_deref().unwrap();
        assert!(text.contains("orphaned closing paragraph"));
        assert!(text.contains("bulk of the article"));
    }
}
