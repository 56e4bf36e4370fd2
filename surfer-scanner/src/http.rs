use crate::error::{Result, SurfError};
use crate::extractor::LinkExtractor;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

const USER_AGENT: &str = "Surfer/0.1";

/// Absolute http(s) URLs anywhere in a response body.
const ABSOLUTE_URL_PATTERN: &str = r"https?://(?:www\.)?[-a-zA-Z0-9@:%._\+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b(?:[-a-zA-Z0-9()@:%_\+.~#?&/=]*)";

pub const DEFAULT_MAX_LINKS: usize = 50;

/// How links are pulled out of a fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractMode {
    /// `a[href]` elements of an HTML document, resolved against the page URL.
    #[default]
    Anchors,
    /// Every absolute http(s) URL appearing in the raw body.
    Pattern,
}

impl ExtractMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "anchors" | "html" => Some(ExtractMode::Anchors),
            "pattern" | "regex" | "text" => Some(ExtractMode::Pattern),
            _ => None,
        }
    }
}

/// [`LinkExtractor`] that fetches pages over HTTP.
#[derive(Debug, Clone)]
pub struct HttpLinkExtractor {
    client: Client,
    mode: ExtractMode,
    max_links: usize,
    url_pattern: Regex,
}

impl HttpLinkExtractor {
    pub fn new() -> Result<Self> {
        Self::with_timeout(10)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        let url_pattern =
            Regex::new(ABSOLUTE_URL_PATTERN).map_err(|e| SurfError::ParseError(e.to_string()))?;

        Ok(Self {
            client,
            mode: ExtractMode::default(),
            max_links: DEFAULT_MAX_LINKS,
            url_pattern,
        })
    }

    pub fn with_mode(mut self, mode: ExtractMode) -> Self {
        self.mode = mode;
        self
    }

    /// Cap on links returned per page; `0` means no cap.
    pub fn with_max_links(mut self, max_links: usize) -> Self {
        self.max_links = max_links;
        self
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        Url::parse(url).map_err(|e| SurfError::InvalidUrl(format!("{}: {}", url, e)))?;

        debug!("Fetching {}", url);
        let start = Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SurfError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!("Fetched {} ({} bytes) in {:?}", url, body.len(), start.elapsed());
        Ok(body)
    }

    fn limit(&self, links: Vec<String>) -> Vec<String> {
        if self.max_links == 0 {
            links
        } else {
            links.into_iter().take(self.max_links).collect()
        }
    }
}

impl LinkExtractor for HttpLinkExtractor {
    async fn extract_links(&self, url: &str) -> Result<Vec<String>> {
        let body = self.fetch(url).await?;
        let links = match self.mode {
            ExtractMode::Anchors => extract_anchor_links(&body, url)?,
            ExtractMode::Pattern => extract_pattern_links(&self.url_pattern, &body),
        };
        debug!("Found {} link(s) on {}", links.len(), url);
        Ok(self.limit(links))
    }

    async fn extract_metadata(&self, url: &str) -> Result<BTreeMap<String, String>> {
        let body = self.fetch(url).await?;
        extract_page_metadata(&body)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| SurfError::ParseError(format!("{}: {}", css, e)))
}

/// Resolved `a[href]` targets of `html`, in document order, each listed once.
pub fn extract_anchor_links(html: &str, page_url: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let link_selector = selector("a[href]")?;

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for element in document.select(&link_selector) {
        if let Some(href) = element.value().attr("href")
            && let Some(absolute_url) = resolve_url(page_url, href)
            && seen.insert(absolute_url.clone())
        {
            links.push(absolute_url);
        }
    }

    Ok(links)
}

/// Absolute URLs matched by `pattern` anywhere in `body`, each listed once.
pub fn extract_pattern_links(pattern: &Regex, body: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    pattern
        .find_iter(body)
        .map(|m| m.as_str().to_string())
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

/// `<title>` plus every `<meta>` with a `name` or `property` and a `content`.
pub fn extract_page_metadata(html: &str) -> Result<BTreeMap<String, String>> {
    let document = Html::parse_document(html);
    let mut metadata = BTreeMap::new();

    if let Some(title) = document.select(&selector("title")?).next() {
        let text = title.text().collect::<String>().trim().to_string();
        if !text.is_empty() {
            metadata.insert("title".to_string(), text);
        }
    }

    for element in document.select(&selector("meta[content]")?) {
        let attrs = element.value();
        if let Some(key) = attrs.attr("name").or_else(|| attrs.attr("property"))
            && let Some(content) = attrs.attr("content")
        {
            metadata.insert(key.to_string(), content.to_string());
        }
    }

    Ok(metadata)
}

fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    // Skip empty, javascript:, mailto:, tel:, in-page anchors
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let base_url = Url::parse(base).ok()?;
    let mut resolved = base_url.join(href).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    resolved.set_fragment(None);

    Some(resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn html_response(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html")
            .set_body_string(body)
    }

    #[test]
    fn test_resolve_url_skips_non_navigational() {
        let base = "http://example.com/dir/page";
        assert_eq!(resolve_url(base, ""), None);
        assert_eq!(resolve_url(base, "#top"), None);
        assert_eq!(resolve_url(base, "mailto:a@b.c"), None);
        assert_eq!(resolve_url(base, "javascript:void(0)"), None);
        assert_eq!(resolve_url(base, "ftp://example.com/file"), None);
    }

    #[test]
    fn test_resolve_url_relative_and_fragment() {
        let base = "http://example.com/dir/page";
        assert_eq!(
            resolve_url(base, "other#section"),
            Some("http://example.com/dir/other".to_string())
        );
        assert_eq!(
            resolve_url(base, "/root"),
            Some("http://example.com/root".to_string())
        );
    }

    #[test]
    fn test_anchor_links_are_deduplicated_in_order() {
        let html = r#"<html><body>
            <a href="/b">B</a>
            <a href="/a">A</a>
            <a href="/b#again">B again</a>
        </body></html>"#;
        let links = extract_anchor_links(html, "http://example.com/").unwrap();
        assert_eq!(
            links,
            vec![
                "http://example.com/b".to_string(),
                "http://example.com/a".to_string()
            ]
        );
    }

    #[test]
    fn test_pattern_links_from_plain_text() {
        let pattern = Regex::new(ABSOLUTE_URL_PATTERN).unwrap();
        let body = "see https://example.com/docs and http://www.test.org, also https://example.com/docs";
        let links = extract_pattern_links(&pattern, body);
        assert_eq!(
            links,
            vec![
                "https://example.com/docs".to_string(),
                "http://www.test.org".to_string()
            ]
        );
    }

    #[test]
    fn test_metadata_title_and_meta() {
        let html = r#"<html><head>
            <title> Hello </title>
            <meta name="description" content="A page">
            <meta property="og:type" content="website">
            <meta charset="utf-8">
        </head></html>"#;
        let metadata = extract_page_metadata(html).unwrap();
        assert_eq!(metadata.get("title").map(String::as_str), Some("Hello"));
        assert_eq!(metadata.get("description").map(String::as_str), Some("A page"));
        assert_eq!(metadata.get("og:type").map(String::as_str), Some("website"));
        assert_eq!(metadata.len(), 3);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!(ExtractMode::from_str("anchors"), Some(ExtractMode::Anchors));
        assert_eq!(ExtractMode::from_str("REGEX"), Some(ExtractMode::Pattern));
        assert_eq!(ExtractMode::from_str("xml"), None);
    }

    #[tokio::test]
    async fn test_extract_links_over_http() {
        let mock_server = MockServer::start().await;
        let root_html = format!(
            r#"<html><body>
                <a href="{}/page1">Page 1</a>
                <a href="/page2">Page 2</a>
                <a href="mailto:someone@example.com">Mail</a>
            </body></html>"#,
            mock_server.uri()
        );

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html_response(&root_html))
            .mount(&mock_server)
            .await;

        let extractor = HttpLinkExtractor::new().unwrap();
        let links = extractor
            .extract_links(&format!("{}/", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(
            links,
            vec![
                format!("{}/page1", mock_server.uri()),
                format!("{}/page2", mock_server.uri())
            ]
        );
    }

    #[tokio::test]
    async fn test_max_links_caps_result() {
        let mock_server = MockServer::start().await;
        let mut html = String::from("<html><body>");
        for i in 0..10 {
            html.push_str(&format!(r#"<a href="/p{}">p</a>"#, i));
        }
        html.push_str("</body></html>");

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html_response(&html))
            .mount(&mock_server)
            .await;

        let extractor = HttpLinkExtractor::new().unwrap().with_max_links(3);
        let links = extractor
            .extract_links(&format!("{}/", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(links.len(), 3);
        assert!(links[0].ends_with("/p0"));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let extractor = HttpLinkExtractor::new().unwrap();
        let err = extractor
            .extract_links(&format!("{}/missing", mock_server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, SurfError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected_before_fetch() {
        let extractor = HttpLinkExtractor::new().unwrap();
        let err = extractor.extract_links("not a url").await.unwrap_err();
        assert!(matches!(err, SurfError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_metadata_over_http() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html_response(
                "<html><head><title>Root</title></head><body></body></html>",
            ))
            .mount(&mock_server)
            .await;

        let extractor = HttpLinkExtractor::new().unwrap();
        let metadata = extractor
            .extract_metadata(&format!("{}/", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(metadata.get("title").map(String::as_str), Some("Root"));
    }
}
