// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub type SourceId = i64;
pub type PostId = i64;
pub type NewsId = i64;

/// Config key gating promotion of ingested posts into news.
pub const AUTO_CONVERT_KEY: &str = "autoConvertToNews";

fn default_sync_interval() -> u64 {
    3600
}

fn default_active() -> bool {
    true
}

/// One external account/feed to poll.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    pub id: SourceId,
    #[serde(default)]
    pub name: String,
    /// Lower-case platform tag, e.g. "rss", "twitter".
    pub platform: String,
    #[serde(default)]
    pub access_token: Option<String>,
    /// Adapter-specific settings (feed URL, page id, ...).
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
}

impl Source {
    pub fn new(id: SourceId, platform: &str) -> Self {
        Self {
            id,
            name: String::new(),
            platform: platform.to_ascii_lowercase(),
            access_token: None,
            config: Map::new(),
            sync_interval_secs: default_sync_interval(),
            active: true,
            last_sync: None,
        }
    }

    pub fn with_setting(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.config.insert(key.to_string(), value.into());
        self
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.access_token = Some(token.to_string());
        self
    }

    /// Stored credential, if present and non-blank.
    pub fn credential(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// String setting, trimmed; blank counts as absent.
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.config
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Numeric setting; accepts JSON numbers and numeric strings.
    pub fn setting_u64(&self, key: &str) -> Option<u64> {
        match self.config.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn auto_convert_to_news(&self) -> bool {
        match self.config.get(AUTO_CONVERT_KEY) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// Label used in logs: name when set, otherwise `platform#id`.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            format!("{}#{}", self.platform, self.id)
        } else {
            self.name.clone()
        }
    }
}

// Hand-written so credentials never end up in logs.
impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("platform", &self.platform)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("config", &self.config)
            .field("sync_interval_secs", &self.sync_interval_secs)
            .field("active", &self.active)
            .field("last_sync", &self.last_sync)
            .finish()
    }
}

/// A normalized item as returned by an adapter, before persistence.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewPost {
    pub platform: String,
    /// The platform's own id; with `platform` this is the dedup key.
    pub native_id: String,
    pub title: Option<String>,
    pub content: String,
    pub media_urls: Vec<String>,
    pub author_name: Option<String>,
    pub author_avatar: Option<String>,
    /// Permalink to the original item.
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    pub hashtags: Vec<String>,
    pub location: Option<String>,
}

/// A persisted post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: PostId,
    pub source_id: SourceId,
    #[serde(flatten)]
    pub item: NewPost,
    pub processed: bool,
    pub news_id: Option<NewsId>,
    pub created_at: DateTime<Utc>,
}

/// Data for a news entry produced by conversion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewNews {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub category: String,
    pub image: Option<String>,
    pub author_name: Option<String>,
    pub author_avatar: Option<String>,
    pub source_platform: String,
    pub source_url: Option<String>,
    pub source_native_id: String,
    pub published_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub auto_generated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct News {
    pub id: NewsId,
    #[serde(flatten)]
    pub entry: NewNews,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one adapter invocation. Never persisted.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ScrapeResult {
    pub success: bool,
    pub posts: Vec<NewPost>,
    pub error: Option<String>,
}

impl ScrapeResult {
    pub fn ok(posts: Vec<NewPost>) -> Self {
        Self {
            success: true,
            posts,
            error: None,
        }
    }

    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            success: false,
            posts: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}
