use async_trait::async_trait;
use serde::Deserialize;

use super::{extract_hashtags, fetch_body, require_credential, require_setting, timestamp_or_now};
use super::{PlatformAdapter, ScrapeError};
use crate::ingest::types::{NewPost, Source};

pub const PLATFORM: &str = "youtube";
const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: ItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    published_at: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    channel_title: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    maxres: Option<Thumb>,
    high: Option<Thumb>,
    medium: Option<Thumb>,
    default: Option<Thumb>,
}

#[derive(Debug, Deserialize)]
struct Thumb {
    url: String,
}

/// Latest uploads of a channel via the Data API. API key + `channelId`.
pub struct YoutubeAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl YoutubeAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Non-video hits (playlists, channels) carry no `videoId` and are skipped.
    pub fn parse_search(json: &str) -> Result<Vec<NewPost>, ScrapeError> {
        let resp: SearchResponse =
            serde_json::from_str(json).map_err(|e| ScrapeError::parse(PLATFORM, e))?;
        if let Some(err) = resp.error {
            return Err(ScrapeError::parse(PLATFORM, err.message));
        }

        let mut out = Vec::with_capacity(resp.items.len());
        for item in resp.items {
            let Some(video_id) = item.id.video_id else {
                continue;
            };
            let sn = item.snippet;
            // Snippet titles arrive HTML-escaped (`&#39;`, `&amp;`).
            let title = html_escape::decode_html_entities(&sn.title).trim().to_string();
            let thumbs = sn.thumbnails;
            let thumbnail = [thumbs.maxres, thumbs.high, thumbs.medium, thumbs.default]
                .into_iter()
                .flatten()
                .next()
                .map(|t| t.url);

            out.push(NewPost {
                platform: PLATFORM.to_string(),
                url: Some(format!("https://www.youtube.com/watch?v={video_id}")),
                native_id: video_id,
                hashtags: extract_hashtags(&format!("{} {}", title, sn.description)),
                title: Some(title).filter(|t| !t.is_empty()),
                content: sn.description,
                media_urls: thumbnail.into_iter().collect(),
                author_name: sn.channel_title,
                published_at: timestamp_or_now(sn.published_at.as_deref()),
                ..Default::default()
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl PlatformAdapter for YoutubeAdapter {
    fn platform(&self) -> &str {
        PLATFORM
    }

    async fn fetch_posts(&self, source: &Source) -> Result<Vec<NewPost>, ScrapeError> {
        let key = require_credential(source, PLATFORM)?;
        let channel_id = require_setting(source, PLATFORM, "channelId")?;
        let max_results = source.setting_u64("maxResults").unwrap_or(20).clamp(1, 50);

        let req = self.client.get(format!("{}/search", self.base_url)).query(&[
            ("part", "snippet".to_string()),
            ("channelId", channel_id.to_string()),
            ("order", "date".to_string()),
            ("type", "video".to_string()),
            ("maxResults", max_results.to_string()),
            ("key", key.to_string()),
        ]);
        let body = fetch_body(PLATFORM, req).await?;
        Self::parse_search(&body)
    }
}
