//! Structured metadata extraction from final markup.
//!
//! Purely declarative DOM querying; no network access and no failure
//! semantics of its own.

use std::collections::HashSet;

use scraper::{Html, Selector};
use serde::Serialize;
use url::Url;

const MAX_LINKS: usize = 200;
const MAX_IMAGES: usize = 50;

/// Record handed to consumers after a successful fetch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageRecord {
    pub title: Option<String>,
    pub description: Option<String>,
    pub links: Vec<String>,
    pub images: Vec<String>,
}

impl PageRecord {
    /// Build the record from markup, resolving relative URLs against the base.
    pub fn from_html(html: &str, base_url: &str) -> Self {
        let document = Html::parse_document(html);
        let base = Url::parse(base_url).ok();

        let title = select_text(&document, "title")
            .or_else(|| select_content(&document, r#"meta[property="og:title"]"#));
        let description = select_content(&document, r#"meta[name="description"]"#)
            .or_else(|| select_content(&document, r#"meta[property="og:description"]"#));

        let links = collect_urls(&document, base.as_ref(), "a[href]", "href", MAX_LINKS);

        let mut images = collect_urls(&document, base.as_ref(), "img[src]", "src", MAX_IMAGES);
        if let Some(og_image) =
            select_content(&document, r#"meta[property="og:image"]"#).and_then(|raw| resolve(base.as_ref(), &raw))
        {
            if !images.contains(&og_image) {
                images.insert(0, og_image);
            }
        }

        Self {
            title,
            description,
            links,
            images,
        }
    }
}

fn select_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let text: String = document.select(&selector).next()?.text().collect();
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn select_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let content = document
        .select(&selector)
        .next()?
        .value()
        .attr("content")?
        .trim()
        .to_string();
    (!content.is_empty()).then_some(content)
}

/// Collect attribute URLs in document order, deduplicated and capped.
fn collect_urls(
    document: &Html,
    base: Option<&Url>,
    selector: &str,
    attr: &str,
    cap: usize,
) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    for element in document.select(&selector) {
        if urls.len() >= cap {
            break;
        }
        let Some(resolved) = element.value().attr(attr).and_then(|raw| resolve(base, raw)) else {
            continue;
        };
        if seen.insert(resolved.clone()) {
            urls.push(resolved);
        }
    }
    urls
}

/// Resolve a raw attribute value to an absolute URL; fragments, javascript:
/// pseudo-links, and data: URIs are dropped.
fn resolve(base: Option<&Url>, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty()
        || raw.starts_with('#')
        || raw.starts_with("javascript:")
        || raw.starts_with("data:")
        || raw.starts_with("mailto:")
    {
        return None;
    }
    match base {
        Some(base) => base.join(raw).ok().map(|u| u.to_string()),
        None => Url::parse(raw).ok().map(|u| u.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r##"
        <html>
        <head>
            <title>  Example Page  </title>
            <meta name="description" content="A page about examples.">
            <meta property="og:image" content="/hero.png">
        </head>
        <body>
            <a href="/md5/abc">First</a>
            <a href="https://other.example/doc">Second</a>
            <a href="/md5/abc">Duplicate</a>
            <a href="#fragment">Skip</a>
            <a href="javascript:void(0)">Skip too</a>
            <img src="images/cover.jpg">
        </body>
        </html>
    "##;

    #[test]
    fn extracts_title_and_description() {
        let record = PageRecord::from_html(FIXTURE, "https://example.com/page");
        assert_eq!(record.title.as_deref(), Some("Example Page"));
        assert_eq!(record.description.as_deref(), Some("A page about examples."));
    }

    #[test]
    fn resolves_and_dedupes_links() {
        let record = PageRecord::from_html(FIXTURE, "https://example.com/page");
        assert_eq!(
            record.links,
            vec![
                "https://example.com/md5/abc".to_string(),
                "https://other.example/doc".to_string(),
            ]
        );
    }

    #[test]
    fn collects_images_with_og_image_first() {
        let record = PageRecord::from_html(FIXTURE, "https://example.com/page");
        assert_eq!(
            record.images,
            vec![
                "https://example.com/hero.png".to_string(),
                "https://example.com/images/cover.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn falls_back_to_og_title() {
        let html = r#"<html><head><meta property="og:title" content="OG Title"></head></html>"#;
        let record = PageRecord::from_html(html, "https://example.com/");
        assert_eq!(record.title.as_deref(), Some("OG Title"));
    }

    #[test]
    fn empty_document_yields_empty_record() {
        let record = PageRecord::from_html("", "https://example.com/");
        assert!(record.title.is_none());
        assert!(record.links.is_empty());
        assert!(record.images.is_empty());
    }
}
