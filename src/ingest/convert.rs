// src/ingest/convert.rs
//! Promotion of ingested posts into news entries.
//!
//! A post is converted at most once: the `processed` flag is re-read right
//! before acting, and the store refuses to mark a post converted twice.
//! Overlapping cycles may still race between those two points; that window
//! is accepted rather than locked.

use anyhow::{anyhow, Result};
use chrono::Utc;
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::sync::Arc;
use uuid::Uuid;

use crate::ingest::adapters::is_image_url;
use crate::ingest::plain_text;
use crate::ingest::store::{IngestionStore, StoreError};
use crate::ingest::types::{NewNews, News, Post, PostId, SourceId};

pub const NEWS_CATEGORY: &str = "social";
/// Upper bound on conversions in one scrape cycle.
pub const MAX_CONVERSIONS_PER_RUN: usize = 10;

const TITLE_MAX_CHARS: usize = 50;
const EXCERPT_MAX_CHARS: usize = 200;
const SLUG_BASE_MAX_CHARS: usize = 50;
const ELLIPSIS: &str = "...";

/// First `max` chars plus `...` when longer; unchanged otherwise.
pub fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str(ELLIPSIS);
    out
}

pub fn derive_title(post: &Post) -> String {
    if let Some(t) = post.item.title.as_deref().map(str::trim) {
        if !t.is_empty() {
            return t.to_string();
        }
    }
    let text = plain_text(&post.item.content);
    if text.is_empty() {
        return format!("{} post", platform_label(&post.item.platform));
    }
    truncate_with_ellipsis(&text, TITLE_MAX_CHARS)
}

pub fn make_excerpt(content: &str) -> String {
    truncate_with_ellipsis(&plain_text(content), EXCERPT_MAX_CHARS)
}

/// Lower-case ASCII words joined by single hyphens, at most 50 chars.
pub fn slug_base(text: &str) -> String {
    static RE_STRIP: OnceCell<Regex> = OnceCell::new();
    static RE_SEP: OnceCell<Regex> = OnceCell::new();
    let strip = RE_STRIP.get_or_init(|| Regex::new(r"[^a-z0-9\s_-]").expect("slug regex"));
    let sep = RE_SEP.get_or_init(|| Regex::new(r"[\s_-]+").expect("slug sep regex"));

    let lower = text.to_lowercase();
    let kept = strip.replace_all(&lower, "");
    let joined = sep.replace_all(&kept, "-");
    let trimmed: String = joined
        .trim_matches('-')
        .chars()
        .take(SLUG_BASE_MAX_CHARS)
        .collect();
    trimmed.trim_end_matches('-').to_string()
}

/// Millisecond timestamp (hex) plus four random hex chars.
fn uniqueness_token() -> String {
    let millis = Utc::now().timestamp_millis().max(0);
    let rand = Uuid::new_v4().simple().to_string();
    format!("{:x}{}", millis, &rand[..4])
}

pub fn make_slug(text: &str) -> String {
    let base = slug_base(text);
    let base = if base.is_empty() { "post" } else { base.as_str() };
    format!("{}-{}", base, uniqueness_token())
}

pub fn platform_label(platform: &str) -> String {
    match platform {
        "rss" => "RSS".to_string(),
        "youtube" => "YouTube".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

/// Raw content, embedded images, then an attribution line.
pub fn format_content(post: &Post, title: &str) -> String {
    let item = &post.item;
    let mut out = item.content.trim().to_string();

    let alt = html_escape::encode_double_quoted_attribute(title);
    for url in item.media_urls.iter().filter(|u| is_image_url(u)) {
        out.push_str(&format!(
            "\n\n<img src=\"{}\" alt=\"{}\" loading=\"lazy\" />",
            html_escape::encode_double_quoted_attribute(url),
            alt
        ));
    }

    let platform = platform_label(&item.platform);
    let origin = match item.url.as_deref() {
        Some(url) => format!(
            "<a href=\"{}\" rel=\"noopener\" target=\"_blank\">{}</a>",
            html_escape::encode_double_quoted_attribute(url),
            platform
        ),
        None => platform,
    };
    out.push_str(&format!(
        "\n\n<p class=\"social-attribution\"><small>Originally posted on {} on {}</small></p>",
        origin,
        item.published_at.format("%B %-d, %Y")
    ));
    out
}

pub fn build_news(post: &Post) -> NewNews {
    let item = &post.item;
    let title = derive_title(post);
    NewNews {
        slug: make_slug(&title),
        excerpt: make_excerpt(&item.content),
        content: format_content(post, &title),
        title,
        category: NEWS_CATEGORY.to_string(),
        image: item.media_urls.first().cloned(),
        author_name: item.author_name.clone(),
        author_avatar: item.author_avatar.clone(),
        source_platform: item.platform.clone(),
        source_url: item.url.clone(),
        source_native_id: item.native_id.clone(),
        published_at: item.published_at,
        tags: item.hashtags.clone(),
        auto_generated: true,
    }
}

pub struct Converter {
    store: Arc<dyn IngestionStore>,
}

impl Converter {
    pub fn new(store: Arc<dyn IngestionStore>) -> Self {
        Self { store }
    }

    /// Convert one post. `Ok(None)` when it was already processed.
    pub async fn convert_post(&self, post_id: PostId) -> Result<Option<News>> {
        let post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| anyhow!("post {post_id} not found"))?;
        if post.processed {
            tracing::debug!(post_id, "post already converted, skipping");
            return Ok(None);
        }

        let mut draft = build_news(&post);
        let news = match self.store.create_news(draft.clone()).await {
            Err(StoreError::DuplicateSlug(_)) => {
                draft.slug = make_slug(&draft.title);
                self.store.create_news(draft).await?
            }
            other => other?,
        };

        match self.store.mark_post_converted(post.id, news.id).await {
            Ok(()) => {}
            Err(StoreError::AlreadyConverted(_)) => {
                // Lost a race with an overlapping cycle; the entry just
                // created is linked to nothing.
                match self.store.delete_news(news.id).await {
                    Ok(()) => tracing::warn!(
                        post_id,
                        news_id = news.id,
                        "post converted concurrently, duplicate news removed"
                    ),
                    Err(e) => tracing::error!(
                        post_id,
                        news_id = news.id,
                        slug = %news.entry.slug,
                        error = %e,
                        "post converted concurrently, orphan news left behind"
                    ),
                }
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        counter!("news_converted_total").increment(1);
        tracing::info!(
            post_id,
            news_id = news.id,
            slug = %news.entry.slug,
            "post promoted to news"
        );
        Ok(Some(news))
    }

    /// Convert up to `limit` unprocessed posts of a source, oldest first.
    /// One failing post is logged and skipped.
    pub async fn convert_pending(&self, source_id: SourceId, limit: usize) -> Result<usize> {
        let pending = self.store.list_unprocessed_posts(source_id, limit).await?;
        let mut converted = 0usize;
        for post in pending.iter().take(limit) {
            match self.convert_post(post.id).await {
                Ok(Some(_)) => converted += 1,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(source_id, post_id = post.id, error = ?e, "conversion failed")
                }
            }
        }
        Ok(converted)
    }
}
