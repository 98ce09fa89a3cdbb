//! Web search and page fetch.
//!
//! Three engine adapters with a fixed fallback order (SerpAPI, SearXNG,
//! DuckDuckGo) and a crude page-text extractor for URL grounding.

use crate::config::{Config, SearchApi};
use anyhow::{Context, Result};
use relay_shared::WebSource;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Results returned per search.
pub const MAX_RESULTS: usize = 5;
/// Page text cap per fetched URL.
pub const MAX_PAGE_CHARS: usize = 8_000;

#[derive(Clone)]
pub struct WebClient {
    http: reqwest::Client,
    search_api: SearchApi,
    api_key: Option<String>,
    searxng_url: String,
}

impl WebClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("relayd/0.4")
            .build()
            .unwrap_or_default();
        Self {
            http,
            search_api: config.search_api,
            api_key: config.search_api_key.clone(),
            searxng_url: config.searxng_url.clone(),
        }
    }

    /// Search with the configured engine, falling through the fixed order
    /// when an engine errors or returns nothing.
    pub async fn search(&self, query: &str) -> Vec<WebSource> {
        let order: Vec<SearchApi> = match self.search_api {
            SearchApi::SerpApi => vec![SearchApi::SerpApi, SearchApi::Searxng, SearchApi::DuckDuckGo],
            SearchApi::Searxng => vec![SearchApi::Searxng, SearchApi::DuckDuckGo],
            SearchApi::DuckDuckGo => vec![SearchApi::DuckDuckGo],
        };
        for engine in order {
            match self.search_with(engine, query).await {
                Ok(results) if !results.is_empty() => {
                    info!("web: {} results via {:?}", results.len(), engine);
                    return results;
                }
                Ok(_) => debug!("web: {:?} returned nothing", engine),
                Err(e) => warn!("web: {:?} failed: {}", engine, e),
            }
        }
        Vec::new()
    }

    async fn search_with(&self, engine: SearchApi, query: &str) -> Result<Vec<WebSource>> {
        match engine {
            SearchApi::SerpApi => self.search_serpapi(query).await,
            SearchApi::Searxng => self.search_searxng(query).await,
            SearchApi::DuckDuckGo => self.search_ddg(query).await,
        }
    }

    async fn search_serpapi(&self, query: &str) -> Result<Vec<WebSource>> {
        let key = self
            .api_key
            .as_deref()
            .context("SEARCH_API_KEY not configured")?;
        let url = "https://serpapi.com/search.json";
        let response = self
            .http
            .get(url)
            .query(&[("q", query), ("api_key", key), ("engine", "google")])
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;
        let results = body["organic_results"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .take(MAX_RESULTS)
                    .filter_map(|r| {
                        Some(WebSource {
                            title: r["title"].as_str()?.to_string(),
                            url: r["link"].as_str()?.to_string(),
                            snippet: r["snippet"].as_str().map(|s| s.to_string()),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(results)
    }

    async fn search_searxng(&self, query: &str) -> Result<Vec<WebSource>> {
        let url = format!("{}/search", self.searxng_url);
        let response = self
            .http
            .get(&url)
            .query(&[("q", query), ("format", "json")])
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;
        let results = body["results"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .take(MAX_RESULTS)
                    .filter_map(|r| {
                        Some(WebSource {
                            title: r["title"].as_str()?.to_string(),
                            url: r["url"].as_str()?.to_string(),
                            snippet: r["content"].as_str().map(|s| s.to_string()),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(results)
    }

    /// DuckDuckGo HTML endpoint, scraped with the same tag-stripping
    /// approach as the page extractor.
    async fn search_ddg(&self, query: &str) -> Result<Vec<WebSource>> {
        let response = self
            .http
            .get("https://html.duckduckgo.com/html/")
            .query(&[("q", query)])
            .send()
            .await?
            .error_for_status()?;
        let html = response.text().await?;
        Ok(parse_ddg_results(&html))
    }

    /// Fetch a page and extract readable text.
    pub async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("fetching {}", url))?
            .error_for_status()?;
        let html = response.text().await?;
        let text = extract_text(&html);
        Ok(text.chars().take(MAX_PAGE_CHARS).collect())
    }
}

/// Anchor results out of the DDG HTML listing.
fn parse_ddg_results(html: &str) -> Vec<WebSource> {
    let mut results = Vec::new();
    let mut rest = html;
    while let Some(start) = rest.find("class=\"result__a\"") {
        rest = &rest[start..];
        let Some(href_start) = rest.find("href=\"") else { break };
        let after_href = &rest[href_start + 6..];
        let Some(href_end) = after_href.find('"') else { break };
        let url = after_href[..href_end].to_string();

        let Some(gt) = rest.find('>') else { break };
        let after_tag = &rest[gt + 1..];
        let Some(close) = after_tag.find("</a>") else { break };
        let title = strip_tags(&after_tag[..close]).trim().to_string();

        if !title.is_empty() && url.starts_with("http") {
            results.push(WebSource { title, url, snippet: None });
            if results.len() >= MAX_RESULTS {
                break;
            }
        }
        rest = after_tag;
    }
    results
}

/// Strip scripts/styles and tags, collapse whitespace.
pub fn extract_text(html: &str) -> String {
    let mut content = remove_between(html, "<script", "</script>");
    content = remove_between(&content, "<style", "</style>");
    content = content
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("</p>", "\n\n")
        .replace("</div>", "\n")
        .replace("</li>", "\n");
    let stripped = strip_tags(&content);
    stripped
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_tags(content: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for c in content.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }
    result
}

fn remove_between(content: &str, start: &str, end: &str) -> String {
    let mut result = content.to_string();
    while let Some(start_pos) = result.find(start) {
        if let Some(end_pos) = result[start_pos..].find(end) {
            result.replace_range(start_pos..start_pos + end_pos + end.len(), "");
        } else {
            break;
        }
    }
    result
}

/// URLs present in a prompt.
pub fn extract_urls(prompt: &str) -> Vec<String> {
    prompt
        .split_whitespace()
        .filter(|w| w.starts_with("http://") || w.starts_with("https://"))
        .map(|w| w.trim_end_matches([')', ']', ',', '.', '>']).to_string())
        .collect()
}

/// Citation-friendly listing for the composed prompt.
pub fn citation_block(sources: &[WebSource]) -> String {
    let mut out = String::new();
    for (i, s) in sources.iter().enumerate() {
        out.push_str(&format!("[{}] {} - {}\n", i + 1, s.title, s.url));
        if let Some(snippet) = &s.snippet {
            out.push_str(&format!("    {}\n", snippet));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_strips_markup() {
        let html = "<html><script>evil()</script><body><p>Hello</p><div>world</div></body></html>";
        let text = extract_text(html);
        assert!(text.contains("Hello"));
        assert!(text.contains("world"));
        assert!(!text.contains("evil"));
    }

    #[test]
    fn test_extract_urls() {
        let urls = extract_urls("see https://example.com/a and (http://b.io/x).");
        assert_eq!(urls, vec!["https://example.com/a", "http://b.io/x"]);
        assert!(extract_urls("no links here").is_empty());
    }

    #[test]
    fn test_citation_block_numbering() {
        let sources = vec![
            WebSource { title: "One".into(), url: "https://a".into(), snippet: None },
            WebSource { title: "Two".into(), url: "https://b".into(), snippet: Some("s".into()) },
        ];
        let block = citation_block(&sources);
        assert!(block.contains("[1] One - https://a"));
        assert!(block.contains("[2] Two - https://b"));
        assert!(block.contains("    s"));
    }

    #[test]
    fn test_parse_ddg_results() {
        let html = r#"<a rel="nofollow" class="result__a" href="https://example.com/page">Example <b>Title</b></a>"#;
        let results = parse_ddg_results(html);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://example.com/page");
        assert_eq!(results[0].title, "Example Title");
    }
}
