use async_trait::async_trait;
use serde::Deserialize;

use super::{extract_hashtags, fetch_body, require_credential, require_setting, timestamp_or_now};
use super::{PlatformAdapter, ScrapeError};
use crate::ingest::types::{NewPost, Source};

pub const PLATFORM: &str = "facebook";
pub(crate) const GRAPH_BASE_URL: &str = "https://graph.facebook.com/v19.0";

const FIELDS: &str = "id,message,story,created_time,full_picture,permalink_url,from{name},\
place{name},shares,reactions.summary(total_count).limit(0),comments.summary(total_count).limit(0)";

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    data: Vec<FbPost>,
    error: Option<GraphError>,
}

#[derive(Debug, Deserialize)]
struct FbPost {
    id: String,
    message: Option<String>,
    story: Option<String>,
    created_time: Option<String>,
    full_picture: Option<String>,
    permalink_url: Option<String>,
    from: Option<Named>,
    place: Option<Named>,
    shares: Option<Count>,
    reactions: Option<Summarized>,
    comments: Option<Summarized>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Count {
    #[serde(default)]
    count: u64,
}

#[derive(Debug, Deserialize)]
struct Summarized {
    summary: Option<Summary>,
}

#[derive(Debug, Deserialize)]
struct Summary {
    #[serde(default)]
    total_count: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphError {
    #[serde(default)]
    pub message: String,
}

fn total(s: &Option<Summarized>) -> u64 {
    s.as_ref()
        .and_then(|s| s.summary.as_ref())
        .map_or(0, |s| s.total_count)
}

/// Facebook page posts via the Graph API. Page access token + `pageId`.
pub struct FacebookAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl FacebookAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: GRAPH_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn parse_posts(json: &str) -> Result<Vec<NewPost>, ScrapeError> {
        let page: Page = serde_json::from_str(json).map_err(|e| ScrapeError::parse(PLATFORM, e))?;
        if let Some(err) = page.error {
            return Err(ScrapeError::parse(PLATFORM, err.message));
        }

        let out = page
            .data
            .into_iter()
            .map(|p| {
                let content = p.message.or(p.story).unwrap_or_default();
                NewPost {
                    platform: PLATFORM.to_string(),
                    native_id: p.id,
                    title: None,
                    hashtags: extract_hashtags(&content),
                    content,
                    media_urls: p.full_picture.into_iter().collect(),
                    author_name: p.from.and_then(|f| f.name),
                    author_avatar: None,
                    url: p.permalink_url,
                    published_at: timestamp_or_now(p.created_time.as_deref()),
                    likes: total(&p.reactions),
                    comments: total(&p.comments),
                    shares: p.shares.map_or(0, |s| s.count),
                    location: p.place.and_then(|pl| pl.name),
                }
            })
            .collect();
        Ok(out)
    }
}

#[async_trait]
impl PlatformAdapter for FacebookAdapter {
    fn platform(&self) -> &str {
        PLATFORM
    }

    async fn fetch_posts(&self, source: &Source) -> Result<Vec<NewPost>, ScrapeError> {
        let token = require_credential(source, PLATFORM)?;
        let page_id = require_setting(source, PLATFORM, "pageId")?;
        let limit = source.setting_u64("limit").unwrap_or(20).clamp(1, 100);

        let url = format!("{}/{}/posts", self.base_url, page_id);
        let req = self.client.get(url).query(&[
            ("fields", FIELDS.to_string()),
            ("limit", limit.to_string()),
            ("access_token", token.to_string()),
        ]);
        let body = fetch_body(PLATFORM, req).await?;
        Self::parse_posts(&body)
    }
}
