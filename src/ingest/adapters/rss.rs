use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use super::{
    extract_hashtags, extract_media_urls, fetch_body, is_image_url, parse_timestamp,
    require_setting,
};
use super::{PlatformAdapter, ScrapeError};
use crate::ingest::types::{NewPost, Source};
use crate::ingest::{collapse_whitespace, plain_text};

pub const PLATFORM: &str = "rss";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    author: Option<String>,
    /// `<dc:creator>`; elements match on their local name.
    creator: Option<String>,
    enclosure: Option<Enclosure>,
}

#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct Enclosure {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "@type")]
    kind: Option<String>,
}

fn parse_pub_date(ts: &str) -> Option<DateTime<Utc>> {
    match OffsetDateTime::parse(ts.trim(), &Rfc2822) {
        Ok(dt) => DateTime::from_timestamp(dt.unix_timestamp(), 0),
        // Feeds in the wild also use ISO dates or zone names `time` rejects.
        Err(_) => parse_timestamp(ts),
    }
}

/// RSS 2.0 feed reader. Needs the `feedUrl` setting, no credential.
pub struct RssAdapter {
    client: reqwest::Client,
}

impl RssAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Parse a feed document into normalized posts. Items with neither a
    /// guid nor a link have no stable id and are dropped.
    pub fn parse_feed(xml: &str) -> Result<Vec<NewPost>, ScrapeError> {
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean).map_err(|e| ScrapeError::parse(PLATFORM, e))?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let native_id = match it
                .guid
                .map(|g| g.value.trim().to_string())
                .filter(|g| !g.is_empty())
                .or_else(|| it.link.clone())
            {
                Some(id) => id,
                None => {
                    tracing::debug!(title = ?it.title, "rss item without guid/link skipped");
                    continue;
                }
            };

            let description = it.description.unwrap_or_default();
            let title = it
                .title
                .map(|t| collapse_whitespace(&html_escape::decode_html_entities(&t)))
                .filter(|t| !t.is_empty());

            let mut media_urls = Vec::new();
            if let Some(enc) = it.enclosure {
                let is_image = enc
                    .kind
                    .as_deref()
                    .is_some_and(|k| k.starts_with("image/"));
                if let Some(url) = enc.url.filter(|u| is_image || is_image_url(u)) {
                    media_urls.push(url);
                }
            }
            for url in extract_media_urls(&description) {
                if !media_urls.contains(&url) {
                    media_urls.push(url);
                }
            }

            let text_for_tags = format!(
                "{} {}",
                title.as_deref().unwrap_or_default(),
                plain_text(&description)
            );

            out.push(NewPost {
                platform: PLATFORM.to_string(),
                native_id,
                title,
                content: description.trim().to_string(),
                media_urls,
                author_name: it.author.or(it.creator).filter(|a| !a.trim().is_empty()),
                url: it.link,
                published_at: it
                    .pub_date
                    .as_deref()
                    .and_then(parse_pub_date)
                    .unwrap_or_else(Utc::now),
                hashtags: extract_hashtags(&text_for_tags),
                ..Default::default()
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl PlatformAdapter for RssAdapter {
    fn platform(&self) -> &str {
        PLATFORM
    }

    async fn fetch_posts(&self, source: &Source) -> Result<Vec<NewPost>, ScrapeError> {
        let url = require_setting(source, PLATFORM, "feedUrl")?;
        let body = fetch_body(PLATFORM, self.client.get(url)).await?;
        Self::parse_feed(&body)
    }
}

// XML only knows five named entities; HTML ones in feeds break the parser.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
