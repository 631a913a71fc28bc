// src/ingest/adapters/mod.rs
//! Platform adapters: one per external platform, selected by the source's
//! platform tag through [`AdapterRegistry`].

pub mod facebook;
pub mod instagram;
pub mod rss;
pub mod twitter;
pub mod youtube;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::ingest::types::{NewPost, ScrapeResult, Source};

/// Typed adapter failure. Converted into a failed [`ScrapeResult`] at the
/// adapter boundary.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("{platform}: missing access credential")]
    MissingCredential { platform: &'static str },
    #[error("{platform}: missing required setting '{key}'")]
    MissingSetting {
        platform: &'static str,
        key: &'static str,
    },
    #[error("unsupported platform '{0}'")]
    UnsupportedPlatform(String),
    #[error("{platform}: request failed: {source}")]
    Transport {
        platform: &'static str,
        source: reqwest::Error,
    },
    #[error("{platform}: HTTP {status}: {body}")]
    Status {
        platform: &'static str,
        status: u16,
        body: String,
    },
    #[error("{platform}: malformed payload: {message}")]
    Parse {
        platform: &'static str,
        message: String,
    },
}

impl ScrapeError {
    pub(crate) fn parse(platform: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            platform,
            message: err.to_string(),
        }
    }
}

#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Registry key, lower-case.
    fn platform(&self) -> &str;

    async fn fetch_posts(&self, source: &Source) -> Result<Vec<NewPost>, ScrapeError>;

    /// Boundary call: every failure becomes `success = false`.
    async fn scrape(&self, source: &Source) -> ScrapeResult {
        match self.fetch_posts(source).await {
            Ok(posts) => {
                counter!("posts_fetched_total", "platform" => self.platform().to_string())
                    .increment(posts.len() as u64);
                ScrapeResult::ok(posts)
            }
            Err(e) => {
                tracing::warn!(
                    source_id = source.id,
                    platform = self.platform(),
                    error = %e,
                    "adapter failed"
                );
                ScrapeResult::failed(e)
            }
        }
    }
}

/// HTTP client settings shared by the built-in adapters.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            user_agent: concat!("social-ingest/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpSettings {
    pub fn build_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .connect_timeout(Duration::from_secs(5).min(self.timeout))
            .timeout(self.timeout)
            .build()
    }
}

/// Platform tag -> adapter.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in platform, sharing one HTTP client.
    pub fn with_defaults(http: &HttpSettings) -> anyhow::Result<Self> {
        let client = http.build_client()?;
        let mut reg = Self::new();
        reg.register(Arc::new(rss::RssAdapter::new(client.clone())));
        reg.register(Arc::new(twitter::TwitterAdapter::new(client.clone())));
        reg.register(Arc::new(facebook::FacebookAdapter::new(client.clone())));
        reg.register(Arc::new(instagram::InstagramAdapter::new(client.clone())));
        reg.register(Arc::new(youtube::YoutubeAdapter::new(client)));
        Ok(reg)
    }

    /// Adds (or replaces) the adapter for its platform tag.
    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        let tag = adapter.platform().to_ascii_lowercase();
        self.adapters.insert(tag, adapter);
    }

    pub fn get(&self, platform: &str) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters
            .get(&platform.trim().to_ascii_lowercase())
            .cloned()
    }

    pub fn platforms(&self) -> Vec<String> {
        let mut v: Vec<String> = self.adapters.keys().cloned().collect();
        v.sort();
        v
    }

    /// Dispatch by the source's platform tag. Unknown tags fail immediately.
    pub async fn scrape(&self, source: &Source) -> ScrapeResult {
        match self.get(&source.platform) {
            Some(adapter) => adapter.scrape(source).await,
            None => {
                let e = ScrapeError::UnsupportedPlatform(source.platform.clone());
                tracing::warn!(source_id = source.id, error = %e, "no adapter registered");
                ScrapeResult::failed(e)
            }
        }
    }
}

// ---- shared normalization helpers ----

/// Send a prepared request and return the body of a 2xx response.
pub(crate) async fn fetch_body(
    platform: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<String, ScrapeError> {
    // URLs may carry tokens in the query string; keep them out of errors.
    let resp = request.send().await.map_err(|e| ScrapeError::Transport {
        platform,
        source: e.without_url(),
    })?;
    let status = resp.status();
    let body = resp.text().await.map_err(|e| ScrapeError::Transport {
        platform,
        source: e.without_url(),
    })?;
    if !status.is_success() {
        return Err(ScrapeError::Status {
            platform,
            status: status.as_u16(),
            body: body.chars().take(300).collect(),
        });
    }
    Ok(body)
}

/// `#word` tokens with the marker stripped, first occurrence order, no repeats.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    static RE: OnceCell<Regex> = OnceCell::new();
    // Leading class keeps entities like `&#39;` and mid-word `#` out.
    let re = RE.get_or_init(|| Regex::new(r"(?:^|[^\w&])#(\w+)").expect("hashtag regex"));
    let mut out: Vec<String> = Vec::new();
    for caps in re.captures_iter(text) {
        let tag = caps[1].to_string();
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// `src` of every `<img>` tag in rich content.
pub fn extract_media_urls(html: &str) -> Vec<String> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).expect("img regex")
    });
    let mut out: Vec<String> = Vec::new();
    for caps in re.captures_iter(html) {
        let url = html_escape::decode_html_entities(&caps[1]).to_string();
        if !out.contains(&url) {
            out.push(url);
        }
    }
    out
}

pub fn is_image_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let lower = path.to_ascii_lowercase();
    [".jpg", ".jpeg", ".png", ".gif", ".webp"]
        .iter()
        .any(|ext| lower.ends_with(ext))
}

/// RFC 3339, the Graph API `+0000` variant, or RFC 2822.
pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    DateTime::parse_from_rfc2822(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn timestamp_or_now(ts: Option<&str>) -> DateTime<Utc> {
    ts.and_then(parse_timestamp).unwrap_or_else(Utc::now)
}

pub(crate) fn require_credential<'a>(
    source: &'a Source,
    platform: &'static str,
) -> Result<&'a str, ScrapeError> {
    source
        .credential()
        .ok_or(ScrapeError::MissingCredential { platform })
}

pub(crate) fn require_setting<'a>(
    source: &'a Source,
    platform: &'static str,
    key: &'static str,
) -> Result<&'a str, ScrapeError> {
    source
        .setting_str(key)
        .ok_or(ScrapeError::MissingSetting { platform, key })
}
