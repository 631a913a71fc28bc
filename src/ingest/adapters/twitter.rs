use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use super::{extract_hashtags, fetch_body, require_credential, require_setting, timestamp_or_now};
use super::{PlatformAdapter, ScrapeError};
use crate::ingest::types::{NewPost, Source};

pub const PLATFORM: &str = "twitter";
const DEFAULT_BASE_URL: &str = "https://api.twitter.com/2";

#[derive(Debug, Deserialize)]
struct Timeline {
    #[serde(default)]
    data: Vec<Tweet>,
    #[serde(default)]
    includes: Includes,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    created_at: Option<String>,
    author_id: Option<String>,
    #[serde(default)]
    public_metrics: Metrics,
    attachments: Option<Attachments>,
    geo: Option<Geo>,
}

#[derive(Debug, Default, Deserialize)]
struct Metrics {
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    reply_count: u64,
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    quote_count: u64,
}

#[derive(Debug, Deserialize)]
struct Attachments {
    #[serde(default)]
    media_keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Geo {
    place_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    media: Vec<Media>,
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    places: Vec<Place>,
}

#[derive(Debug, Deserialize)]
struct Media {
    media_key: String,
    url: Option<String>,
    preview_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    name: Option<String>,
    username: Option<String>,
    profile_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Place {
    id: String,
    full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    title: String,
    #[serde(default)]
    detail: String,
}

/// Twitter/X API v2 user timeline. Bearer token + `userId` setting.
pub struct TwitterAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl TwitterAdapter {
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

    pub fn parse_timeline(json: &str) -> Result<Vec<NewPost>, ScrapeError> {
        let tl: Timeline =
            serde_json::from_str(json).map_err(|e| ScrapeError::parse(PLATFORM, e))?;
        if tl.data.is_empty() {
            if let Some(err) = tl.errors.first() {
                return Err(ScrapeError::parse(
                    PLATFORM,
                    format!("{}: {}", err.title, err.detail),
                ));
            }
        }

        let media: HashMap<&str, &Media> = tl
            .includes
            .media
            .iter()
            .map(|m| (m.media_key.as_str(), m))
            .collect();
        let users: HashMap<&str, &User> =
            tl.includes.users.iter().map(|u| (u.id.as_str(), u)).collect();
        let places: HashMap<&str, &Place> =
            tl.includes.places.iter().map(|p| (p.id.as_str(), p)).collect();

        let mut out = Vec::with_capacity(tl.data.len());
        for tw in &tl.data {
            let author = tw.author_id.as_deref().and_then(|id| users.get(id));
            let media_urls = tw
                .attachments
                .iter()
                .flat_map(|a| a.media_keys.iter())
                .filter_map(|k| media.get(k.as_str()))
                .filter_map(|m| m.url.clone().or_else(|| m.preview_image_url.clone()))
                .collect();
            let url = author
                .and_then(|u| u.username.as_deref())
                .map(|name| format!("https://x.com/{name}/status/{}", tw.id));
            let location = tw
                .geo
                .as_ref()
                .and_then(|g| g.place_id.as_deref())
                .and_then(|id| places.get(id))
                .and_then(|p| p.full_name.clone());

            out.push(NewPost {
                platform: PLATFORM.to_string(),
                native_id: tw.id.clone(),
                title: None,
                content: tw.text.clone(),
                media_urls,
                author_name: author.and_then(|u| u.name.clone()),
                author_avatar: author.and_then(|u| u.profile_image_url.clone()),
                url,
                published_at: timestamp_or_now(tw.created_at.as_deref()),
                likes: tw.public_metrics.like_count,
                comments: tw.public_metrics.reply_count,
                shares: tw
                    .public_metrics
                    .retweet_count
                    .saturating_add(tw.public_metrics.quote_count),
                hashtags: extract_hashtags(&tw.text),
                location,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl PlatformAdapter for TwitterAdapter {
    fn platform(&self) -> &str {
        PLATFORM
    }

    async fn fetch_posts(&self, source: &Source) -> Result<Vec<NewPost>, ScrapeError> {
        let token = require_credential(source, PLATFORM)?;
        let user_id = require_setting(source, PLATFORM, "userId")?;
        // The API rejects values outside 5..=100.
        let max_results = source.setting_u64("maxResults").unwrap_or(20).clamp(5, 100);

        let url = format!("{}/users/{}/tweets", self.base_url, user_id);
        let req = self.client.get(url).bearer_auth(token).query(&[
            ("max_results", max_results.to_string()),
            (
                "tweet.fields",
                "created_at,public_metrics,attachments,geo,author_id".to_string(),
            ),
            (
                "expansions",
                "attachments.media_keys,author_id,geo.place_id".to_string(),
            ),
            ("media.fields", "url,preview_image_url,type".to_string()),
            ("user.fields", "name,username,profile_image_url".to_string()),
            ("place.fields", "full_name".to_string()),
        ]);
        let body = fetch_body(PLATFORM, req).await?;
        Self::parse_timeline(&body)
    }
}
