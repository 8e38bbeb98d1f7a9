//! Boilerplate-stripping text extraction.
//!
//! HTML is parsed with `scraper`; text under script, style, navigation and
//! other chrome elements is dropped and only the main content node is kept.
//! A regex pass then removes consent banners and CSS/JS leftovers.

use anyhow::{Context, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{RawContent, TextExtractor};

/// Elements whose text never belongs to the article
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "nav", "header", "footer", "aside", "form",
    "iframe",
];

/// Main content candidates, most specific first
const MAIN_SELECTORS: &[&str] = &["article", "main", "[role='main']", "body"];

/// Default extractor
pub struct HtmlTextExtractor {
    consent: Regex,
    css_block: Regex,
    script_call: Regex,
    markdown_image: Regex,
    data_uri: Regex,
    script_or_style: Regex,
    tag: Regex,
    whitespace: Regex,
}

impl HtmlTextExtractor {
    pub fn new() -> Result<Self> {
        let re = |pattern: &str| {
            Regex::new(pattern).with_context(|| format!("Invalid extractor pattern: {}", pattern))
        };

        Ok(Self {
            consent: re(r"(?i)(we use cookies|cookie\s+settings|your\s+privacy|consent)")?,
            css_block: re(r"\{[^}]*\}")?,
            script_call: re(r"\b(?:function\s*\(|window\.|document\.)[^\n]{0,120}")?,
            markdown_image: re(r"!\[[^\]]*\]\([^)]*\)")?,
            data_uri: re(r"data:image/[^;]+;base64,[A-Za-z0-9+/=]+")?,
            script_or_style: re(r"(?is)<script[^>]*>.*?</script>|<style[^>]*>.*?</style>")?,
            tag: re(r"(?s)<[^>]+>")?,
            whitespace: re(r"\s+")?,
        })
    }

    /// Text of the main content node, skipping chrome elements
    fn main_text(html: &str) -> String {
        let document = Html::parse_document(html);

        let main = MAIN_SELECTORS
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .find_map(|selector| document.select(&selector).next());

        collect_text(main.unwrap_or_else(|| document.root_element()))
    }

    /// Regex cleanup shared by both content kinds
    fn clean(&self, text: &str) -> String {
        let text = self.consent.replace_all(text, " ");
        let text = self.css_block.replace_all(&text, " ");
        let text = self.script_call.replace_all(&text, " ");
        let text = self.markdown_image.replace_all(&text, " ");
        let text = self.data_uri.replace_all(&text, " ");
        self.collapse(&text)
    }

    fn collapse(&self, text: &str) -> String {
        self.whitespace.replace_all(text, " ").trim().to_string()
    }

    /// Last resort: strip tags with regexes
    fn strip_tags(&self, html: &str) -> String {
        let text = self.script_or_style.replace_all(html, " ");
        let text = self.tag.replace_all(&text, " ");
        self.collapse(&decode_entities(&text))
    }
}

impl TextExtractor for HtmlTextExtractor {
    fn extract(&self, content: &RawContent) -> String {
        match content {
            RawContent::Text(text) => self.clean(&decode_entities(text)),
            RawContent::Html(html) => {
                let text = self.clean(&Self::main_text(html));
                if text.is_empty() {
                    self.strip_tags(html)
                } else {
                    text
                }
            }
        }
    }
}

/// Concatenate the text nodes below `element` that are not inside a
/// skipped tag
fn collect_text(element: ElementRef<'_>) -> String {
    let mut parts: Vec<String> = Vec::new();

    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let skipped = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|e| SKIPPED_TAGS.contains(&e.name()))
                .unwrap_or(false)
        });

        let text = text.trim();
        if !skipped && !text.is_empty() {
            parts.push(text.to_string());
        }
    }

    parts.join(" ")
}

/// Decode the handful of entities that show up in plain-text bodies
fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
