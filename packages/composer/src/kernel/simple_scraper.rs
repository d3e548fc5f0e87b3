//! Simple web scraper for target context - local HTTP + HTML parsing
//!
//! This implementation:
//! - Uses reqwest for HTTP requests
//! - Uses scraper crate for HTML parsing
//! - Uses htmd for HTML to Markdown conversion
//!
//! Limitations:
//! - No JavaScript rendering (use for static HTML sites only)
//! - Single page only; no link discovery

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{BaseWebScraper, ScrapeResult};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Simple web scraper using reqwest + scraper + htmd
pub struct SimpleScraper {
    client: reqwest::Client,
}

impl SimpleScraper {
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Fetch raw HTML from a URL
    async fn fetch_html(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .context("HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} for {}", status, url);
        }

        response
            .text()
            .await
            .context("Failed to read response body")
    }

    /// Extract title from HTML document
    fn extract_title(document: &Html) -> Option<String> {
        let title_selector = Selector::parse("title").ok()?;
        document
            .select(&title_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Extract main content HTML, stripping nav/header/footer/aside
    fn extract_main_content(document: &Html) -> String {
        let main_selectors = ["main", "article", "[role='main']", "#content", "#main"];

        for selector_str in main_selectors {
            if let Ok(selector) = Selector::parse(selector_str) {
                if let Some(main) = document.select(&selector).next() {
                    return main.html();
                }
            }
        }

        if let Ok(body_selector) = Selector::parse("body") {
            if let Some(body) = document.select(&body_selector).next() {
                return Self::remove_boilerplate(&body.html());
            }
        }

        document.html()
    }

    /// Remove common boilerplate elements from HTML string
    fn remove_boilerplate(html: &str) -> String {
        let document = Html::parse_fragment(html);
        let unwanted = [
            "nav", "header", "footer", "aside", "script", "style", "noscript", "iframe", "form",
            ".cookie-banner", "#cookie-consent",
        ];

        let mut result = html.to_string();
        for selector_str in unwanted {
            if let Ok(selector) = Selector::parse(selector_str) {
                for element in document.select(&selector) {
                    result = result.replace(&element.html(), "");
                }
            }
        }

        result
    }

    /// Convert HTML to Markdown, falling back to plain text
    fn html_to_markdown(html: &str) -> String {
        htmd::convert(html).unwrap_or_else(|_| {
            let document = Html::parse_document(html);
            document.root_element().text().collect::<String>()
        })
    }

    /// Parse a URL, adding https:// if no scheme is present
    fn normalize_url(url: &str) -> Result<Url> {
        let url = url.trim();
        let candidate = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("https://{}", url)
        };
        Url::parse(&candidate).with_context(|| format!("Invalid URL: {}", url))
    }
}

#[async_trait]
impl BaseWebScraper for SimpleScraper {
    async fn scrape(&self, url: &str) -> Result<ScrapeResult> {
        let url = Self::normalize_url(url)?;
        debug!(url = %url, "Scraping page");

        let html = self.fetch_html(&url).await?;
        let document = Html::parse_document(&html);

        let title = Self::extract_title(&document);
        let main_content = Self::extract_main_content(&document);
        let markdown = Self::html_to_markdown(&main_content);

        if markdown.trim().len() < 100 {
            warn!(url = %url, "Page has minimal content");
        }

        Ok(ScrapeResult {
            url: url.to_string(),
            markdown,
            title,
        })
    }
}
