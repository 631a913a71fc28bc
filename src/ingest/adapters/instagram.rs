use async_trait::async_trait;
use serde::Deserialize;

use super::facebook::{GraphError, GRAPH_BASE_URL};
use super::{extract_hashtags, fetch_body, require_credential, timestamp_or_now};
use super::{PlatformAdapter, ScrapeError};
use crate::ingest::types::{NewPost, Source};

pub const PLATFORM: &str = "instagram";

const FIELDS: &str = "id,caption,media_type,media_url,thumbnail_url,permalink,timestamp,\
like_count,comments_count,username,children{media_type,media_url,thumbnail_url}";

#[derive(Debug, Deserialize)]
struct MediaPage {
    #[serde(default)]
    data: Vec<IgMedia>,
    error: Option<GraphError>,
}

#[derive(Debug, Deserialize)]
struct IgMedia {
    id: String,
    caption: Option<String>,
    media_type: Option<String>,
    media_url: Option<String>,
    thumbnail_url: Option<String>,
    permalink: Option<String>,
    timestamp: Option<String>,
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    comments_count: u64,
    username: Option<String>,
    children: Option<Children>,
}

#[derive(Debug, Deserialize)]
struct Children {
    #[serde(default)]
    data: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    media_type: Option<String>,
    media_url: Option<String>,
    thumbnail_url: Option<String>,
}

/// Video items contribute their thumbnail (the stream URL is not an image).
fn visual_url(
    media_type: Option<&str>,
    media_url: Option<String>,
    thumb: Option<String>,
) -> Option<String> {
    match media_type {
        Some("VIDEO") => thumb.or(media_url),
        _ => media_url,
    }
}

/// Instagram media via the Graph API. Access token; `userId` defaults to `me`.
pub struct InstagramAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl InstagramAdapter {
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

    pub fn parse_media(json: &str) -> Result<Vec<NewPost>, ScrapeError> {
        let page: MediaPage =
            serde_json::from_str(json).map_err(|e| ScrapeError::parse(PLATFORM, e))?;
        if let Some(err) = page.error {
            return Err(ScrapeError::parse(PLATFORM, err.message));
        }

        let out = page
            .data
            .into_iter()
            .map(|m| {
                let mut media_urls = Vec::new();
                match m.children {
                    Some(children) if !children.data.is_empty() => {
                        for c in children.data {
                            if let Some(u) =
                                visual_url(c.media_type.as_deref(), c.media_url, c.thumbnail_url)
                            {
                                media_urls.push(u);
                            }
                        }
                    }
                    _ => {
                        if let Some(u) =
                            visual_url(m.media_type.as_deref(), m.media_url, m.thumbnail_url)
                        {
                            media_urls.push(u);
                        }
                    }
                }
                let content = m.caption.unwrap_or_default();
                NewPost {
                    platform: PLATFORM.to_string(),
                    native_id: m.id,
                    hashtags: extract_hashtags(&content),
                    content,
                    media_urls,
                    author_name: m.username,
                    url: m.permalink,
                    published_at: timestamp_or_now(m.timestamp.as_deref()),
                    likes: m.like_count,
                    comments: m.comments_count,
                    ..Default::default()
                }
            })
            .collect();
        Ok(out)
    }
}

#[async_trait]
impl PlatformAdapter for InstagramAdapter {
    fn platform(&self) -> &str {
        PLATFORM
    }

    async fn fetch_posts(&self, source: &Source) -> Result<Vec<NewPost>, ScrapeError> {
        let token = require_credential(source, PLATFORM)?;
        let user_id = source.setting_str("userId").unwrap_or("me");
        let limit = source.setting_u64("limit").unwrap_or(20).clamp(1, 100);

        let url = format!("{}/{}/media", self.base_url, user_id);
        let req = self.client.get(url).query(&[
            ("fields", FIELDS.to_string()),
            ("limit", limit.to_string()),
            ("access_token", token.to_string()),
        ]);
        let body = fetch_body(PLATFORM, req).await?;
        Self::parse_media(&body)
    }
}
