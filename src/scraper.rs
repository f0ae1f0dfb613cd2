use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::ScrapeFailure;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const SCROLL_TOP_SETTLE_MS: u64 = 1000;
const CRAWL_POLL_INTERVAL: Duration = Duration::from_secs(2);
const CRAWL_TIMEOUT: Duration = Duration::from_secs(600);

/// How a page should be fetched: plain, or with scroll/wait actions to
/// coax lazy-loaded content into the DOM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeOptions {
    pub enable_actions: bool,
    pub scroll_passes: u32,
    pub wait_millis: u64,
}

impl ScrapeOptions {
    pub const BASIC: Self = Self {
        enable_actions: false,
        scroll_passes: 0,
        wait_millis: 0,
    };

    pub const ENHANCED: Self = Self {
        enable_actions: true,
        scroll_passes: 3,
        wait_millis: 2000,
    };

    fn actions(&self) -> Option<Vec<Action>> {
        if !self.enable_actions {
            return None;
        }
        let mut actions = Vec::with_capacity(self.scroll_passes as usize * 2 + 2);
        for _ in 0..self.scroll_passes {
            actions.push(Action::Scroll { direction: ScrollDirection::Down });
            actions.push(Action::Wait { milliseconds: self.wait_millis });
        }
        actions.push(Action::ExecuteJavascript {
            script: "window.scrollTo(0, 0);".to_string(),
        });
        actions.push(Action::Wait { milliseconds: SCROLL_TOP_SETTLE_MS });
        Some(actions)
    }
}

/// Markdown returned by a successful scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedPage {
    pub markdown: String,
    pub title: Option<String>,
    pub status_code: Option<u16>,
    /// Page URL as reported by the service; set for crawled pages.
    pub source_url: Option<String>,
}

pub type ScrapeResult = std::result::Result<ScrapedPage, ScrapeFailure>;
pub type CrawlResult = std::result::Result<Vec<ScrapedPage>, ScrapeFailure>;

/// Anything that can turn a URL into markdown. Implementations never
/// panic or error past this boundary; every problem is a `ScrapeFailure`.
pub trait ScrapeClient {
    async fn scrape(&self, url: &str, options: &ScrapeOptions) -> ScrapeResult;

    /// Follow links from `url`, returning up to `limit` pages.
    async fn crawl(&self, url: &str, limit: u32) -> CrawlResult;
}

impl<C: ScrapeClient> ScrapeClient for &C {
    async fn scrape(&self, url: &str, options: &ScrapeOptions) -> ScrapeResult {
        (**self).scrape(url, options).await
    }

    async fn crawl(&self, url: &str, limit: u32) -> CrawlResult {
        (**self).crawl(url, limit).await
    }
}

// ── Firecrawl wire format ──

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Action {
    Wait { milliseconds: u64 },
    Scroll { direction: ScrollDirection },
    ExecuteJavascript { script: String },
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ScrollDirection {
    Down,
}

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: [&'static str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    actions: Option<Vec<Action>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CrawlRequest<'a> {
    url: &'a str,
    limit: u32,
    scrape_options: CrawlScrapeOptions,
}

#[derive(Serialize)]
struct CrawlScrapeOptions {
    formats: [&'static str; 1],
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    data: Option<ResponseData>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct CrawlStarted {
    #[serde(default)]
    success: bool,
    id: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct CrawlStatus {
    status: String,
    #[serde(default)]
    data: Vec<ResponseData>,
    next: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ResponseData {
    markdown: Option<String>,
    metadata: Option<Metadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Metadata {
    title: Option<String>,
    status_code: Option<u16>,
    #[serde(rename = "sourceURL")]
    source_url: Option<String>,
}

impl ResponseData {
    fn into_page(self) -> ScrapeResult {
        let markdown = self
            .markdown
            .ok_or_else(|| ScrapeFailure::Unknown("response contained no markdown".to_string()))?;
        let (title, status_code, source_url) = match self.metadata {
            Some(m) => (m.title.filter(|t| !t.trim().is_empty()), m.status_code, m.source_url),
            None => (None, None, None),
        };
        Ok(ScrapedPage {
            markdown,
            title,
            status_code,
            source_url,
        })
    }
}

/// `ScrapeClient` backed by Firecrawl's `/v1/scrape` and `/v1/crawl` endpoints.
pub struct FirecrawlClient {
    http: reqwest::Client,
    base: String,
    api_key: String,
    poll_interval: Duration,
    crawl_timeout: Duration,
}

impl FirecrawlClient {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_timeout(config, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(config: &Config, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            http,
            base: config.api_url.clone(),
            api_key: config.api_key.clone(),
            poll_interval: CRAWL_POLL_INTERVAL,
            crawl_timeout: CRAWL_TIMEOUT,
        })
    }

    pub fn with_crawl_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.crawl_timeout = timeout;
        self
    }

    /// Send an authenticated request and decode the JSON body, mapping
    /// HTTP and transport errors to `ScrapeFailure`.
    async fn call<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, ScrapeFailure> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let text = response.text().await.map_err(classify_transport)?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(classify_status(status, detail));
        }

        serde_json::from_str(&text).map_err(|_| {
            ScrapeFailure::Unknown(format!("malformed response body ({} bytes)", text.len()))
        })
    }

    async fn send(&self, url: &str, options: &ScrapeOptions) -> ScrapeResult {
        let body = ScrapeRequest {
            url,
            formats: ["markdown"],
            actions: options.actions(),
        };

        let start = Instant::now();
        let endpoint = format!("{}/v1/scrape", self.base);
        let parsed: ScrapeResponse = self.call(self.http.post(&endpoint).json(&body)).await?;
        debug!("POST {} for {} in {}ms", endpoint, url, start.elapsed().as_millis());

        if !parsed.success {
            let detail = parsed.error.unwrap_or_else(|| "service reported failure".to_string());
            return Err(ScrapeFailure::Unknown(detail));
        }

        parsed
            .data
            .ok_or_else(|| ScrapeFailure::Unknown("response contained no data".to_string()))?
            .into_page()
    }

    async fn run_crawl(&self, url: &str, limit: u32) -> CrawlResult {
        let body = CrawlRequest {
            url,
            limit,
            scrape_options: CrawlScrapeOptions { formats: ["markdown"] },
        };
        let started: CrawlStarted = self
            .call(self.http.post(format!("{}/v1/crawl", self.base)).json(&body))
            .await?;
        if !started.success {
            let detail = started.error.unwrap_or_else(|| "service refused crawl".to_string());
            return Err(ScrapeFailure::Unknown(detail));
        }
        let id = started
            .id
            .ok_or_else(|| ScrapeFailure::Unknown("crawl response contained no job id".to_string()))?;
        debug!("Crawl {} started for {} (limit {})", id, url, limit);

        let deadline = Instant::now() + self.crawl_timeout;
        let mut status_url = format!("{}/v1/crawl/{}", self.base, id);
        let mut pages = Vec::new();
        loop {
            let job: CrawlStatus = self.call(self.http.get(&status_url)).await?;
            match job.status.as_str() {
                "completed" => {
                    // Pages the service could not render come back without markdown.
                    pages.extend(job.data.into_iter().filter_map(|d| d.into_page().ok()));
                    match job.next {
                        Some(next) => status_url = next,
                        None => break,
                    }
                }
                "failed" | "cancelled" => {
                    let detail = job.error.unwrap_or_else(|| format!("crawl {} {}", id, job.status));
                    return Err(ScrapeFailure::Unknown(detail));
                }
                _ => {
                    if Instant::now() >= deadline {
                        return Err(ScrapeFailure::Network(format!(
                            "crawl {} did not finish within {}s",
                            id,
                            self.crawl_timeout.as_secs()
                        )));
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        debug!("Crawl {} finished with {} pages", id, pages.len());
        Ok(pages)
    }
}

impl ScrapeClient for FirecrawlClient {
    async fn scrape(&self, url: &str, options: &ScrapeOptions) -> ScrapeResult {
        self.send(url, options).await
    }

    async fn crawl(&self, url: &str, limit: u32) -> CrawlResult {
        self.run_crawl(url, limit).await
    }
}

fn classify_status(status: StatusCode, detail: String) -> ScrapeFailure {
    match status.as_u16() {
        401 | 403 => ScrapeFailure::Auth(detail),
        402 | 429 => ScrapeFailure::RateLimit(detail),
        408 | 504 => ScrapeFailure::Network(detail),
        _ => ScrapeFailure::Unknown(detail),
    }
}

fn classify_transport(e: reqwest::Error) -> ScrapeFailure {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        ScrapeFailure::Network(e.to_string())
    } else {
        ScrapeFailure::Unknown(e.to_string())
    }
}
