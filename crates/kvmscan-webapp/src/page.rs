//! HTML inspection: page title and declared favicon location

use scraper::{Html, Selector};
use url::Url;

/// Path tried when the page declares no icon
pub const DEFAULT_FAVICON_PATH: &str = "/favicon.ico";

/// First non-empty `<title>` text in document order, trimmed
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;

    document
        .select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|title| !title.is_empty())
}

/// `href` of the first `<link>` whose `rel` is `icon` or `shortcut icon`
pub fn extract_favicon_href(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("link[rel][href]").ok()?;

    document.select(&selector).find_map(|el| {
        let rel = el.value().attr("rel")?;
        let rel = rel
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");
        if rel != "icon" && rel != "shortcut icon" {
            return None;
        }
        let href = el.value().attr("href")?.trim();
        (!href.is_empty()).then(|| href.to_string())
    })
}

/// Resolve the favicon location against the page it was found on.
///
/// Absolute URLs are used as is, root-relative paths go on the page's
/// origin and anything else is relative to the page's path. Without a
/// declared icon, `/favicon.ico` on the origin.
pub fn favicon_url(page: &Url, href: Option<&str>) -> Result<Url, url::ParseError> {
    page.join(href.unwrap_or(DEFAULT_FAVICON_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_title() {
        let html = "<html><head><title>GLKVM</title></head><body></body></html>";
        assert_eq!(extract_title(html).as_deref(), Some("GLKVM"));
    }

    #[test]
    fn test_first_non_empty_title_wins() {
        let html = r#"<html><head><title>  </title></head>
            <body><div><title>PiKVM</title></div><title>Other</title></body></html>"#;
        assert_eq!(extract_title(html).as_deref(), Some("PiKVM"));
    }

    #[test]
    fn test_missing_title() {
        assert_eq!(extract_title("<html><body><p>hi</p></body></html>"), None);
        assert_eq!(extract_title(""), None);
    }

    #[test]
    fn test_extract_favicon_href() {
        let html = r#"<html><head>
            <link rel="stylesheet" href="/app.css">
            <link rel="Shortcut  Icon" href="/static/favicon.png">
            <link rel="icon" href="/second.ico">
        </head></html>"#;
        assert_eq!(
            extract_favicon_href(html).as_deref(),
            Some("/static/favicon.png")
        );
    }

    #[test]
    fn test_favicon_href_requires_value() {
        let html = r#"<link rel="icon" href=""><link rel="apple-touch-icon" href="/a.png">"#;
        assert_eq!(extract_favicon_href(html), None);
    }

    #[test]
    fn test_favicon_url_resolution() {
        let page = Url::parse("https://10.0.0.9/ui/index.html").unwrap();

        assert_eq!(
            favicon_url(&page, Some("https://cdn.example/icon.ico")).unwrap().as_str(),
            "https://cdn.example/icon.ico"
        );
        assert_eq!(
            favicon_url(&page, Some("/static/icon.png")).unwrap().as_str(),
            "https://10.0.0.9/static/icon.png"
        );
        assert_eq!(
            favicon_url(&page, Some("icon.png")).unwrap().as_str(),
            "https://10.0.0.9/ui/icon.png"
        );
        assert_eq!(
            favicon_url(&page, None).unwrap().as_str(),
            "https://10.0.0.9/favicon.ico"
        );
    }
}
