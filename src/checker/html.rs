// src/checker/html.rs
// =============================================================================
// This module extracts links from root pages so the crawler can check them.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Supports CSS selectors for finding elements
// - Is built on html5ever (Mozilla's HTML parser)
//
// We also use the `url` crate to resolve relative links against the page.
//
// Malformed markup or unresolvable hrefs never fail the page: the link is
// simply dropped from the expansion set.
// =============================================================================

use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

// Extracts all crawlable links from HTML content
//
// Parameters:
//   html: the HTML content to parse
//   base_url: the URL of the page (for resolving relative links)
//   ignored_extensions: file types that are never worth fetching (images)
//
// Returns: absolute http/https URLs in document order
//
// The parsed document is dropped before returning, so callers can keep
// using the result across `.await` points.
pub fn extract_links(html: &str, base_url: &str, ignored_extensions: &HashSet<String>) -> Vec<String> {
    let mut links = Vec::new();

    let base = match Url::parse(base_url) {
        Ok(url) => url,
        Err(_) => return links,
    };

    let selector = match Selector::parse("a[href]") {
        Ok(selector) => selector,
        Err(_) => return links,
    };

    let document = Html::parse_document(html);

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(absolute) = resolve_link(&base, href) else {
            continue;
        };
        if !is_checkable_link(&absolute) || has_ignored_extension(&absolute, ignored_extensions) {
            continue;
        }
        links.push(absolute.to_string());
    }

    links
}

// Resolves a possibly-relative href to an absolute URL
//
// Examples:
//   base = "https://example.com/page"
//   href = "/docs"              -> Some("https://example.com/docs")
//   href = "#top"               -> None
//   href = "javascript:void(0)" -> None
fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
    {
        return None;
    }

    base.join(href).ok()
}

fn is_checkable_link(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

fn has_ignored_extension(url: &Url, ignored: &HashSet<String>) -> bool {
    let file_name = url.path().rsplit('/').next().unwrap_or_default();
    match file_name.rsplit_once('.') {
        Some((_, ext)) => ignored.contains(&ext.to_lowercase()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images() -> HashSet<String> {
        ["png", "jpg", "jpeg", "gif"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_absolute_link() {
        let html = r#"<a href="https://www.rust-lang.org">Rust</a>"#;
        let links = extract_links(html, "https://example.com", &images());
        assert_eq!(links, vec!["https://www.rust-lang.org/"]);
    }

    #[test]
    fn test_resolve_relative_link() {
        let html = r#"<a href="/backup/db.sql">Dump</a>"#;
        let links = extract_links(html, "https://example.com/page", &images());
        assert_eq!(links, vec!["https://example.com/backup/db.sql"]);
    }

    #[test]
    fn test_skip_special_schemes() {
        let html = r##"
            <a href="mailto:test@example.com">Email</a>
            <a href="tel:123">Call</a>
            <a href="javascript:void(0)">Nothing</a>
            <a href="#section">Anchor</a>
            <a href="ftp://example.com/file">FTP</a>
        "##;
        let links = extract_links(html, "https://example.com", &images());
        assert!(links.is_empty());
    }

    #[test]
    fn test_skip_ignored_images() {
        let html = r#"
            <a href="/logo.PNG">Logo</a>
            <a href="/photo.jpg">Photo</a>
            <a href="/site.zip">Zip</a>
        "#;
        let links = extract_links(html, "http://example.com/", &images());
        assert_eq!(links, vec!["http://example.com/site.zip"]);
    }

    #[test]
    fn test_malformed_markup_still_yields_links() {
        let html = r#"<div><a href="a">A<a href="../b">B</div><p><a href="http://[bad">x</a>"#;
        let links = extract_links(html, "http://example.com/dir/", &images());
        assert_eq!(links, vec!["http://example.com/dir/a", "http://example.com/b"]);
    }

    #[test]
    fn test_root_relative_link() {
        let links = extract_links(r#"<a href="/a">A</a>"#, "http://example.com/dir/", &images());
        assert_eq!(links, vec!["http://example.com/a"]);
    }

    #[test]
    fn test_invalid_base_returns_nothing() {
        let links = extract_links(r#"<a href="/x">x</a>"#, "not a url", &images());
        assert!(links.is_empty());
    }
}
