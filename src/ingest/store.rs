// src/ingest/store.rs
//! Persistence seam for the ingestion pipeline.
//!
//! The pipeline only needs natural-key lookups, inserts and two single-row
//! updates, so any backend that can honour the (platform, native id)
//! uniqueness and the `processed` guard fits behind [`IngestionStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::ingest::types::{
    NewNews, NewPost, News, NewsId, Post, PostId, Source, SourceId,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("post {platform}/{native_id} already exists")]
    DuplicatePost { platform: String, native_id: String },
    #[error("post {0} is already converted")]
    AlreadyConverted(PostId),
    #[error("news slug '{0}' already exists")]
    DuplicateSlug(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait IngestionStore: Send + Sync {
    async fn list_sources(&self, active_only: bool) -> StoreResult<Vec<Source>>;
    async fn get_source(&self, id: SourceId) -> StoreResult<Option<Source>>;
    async fn update_source_last_sync(&self, id: SourceId, ts: DateTime<Utc>) -> StoreResult<()>;

    async fn find_post(&self, platform: &str, native_id: &str) -> StoreResult<Option<Post>>;
    async fn get_post(&self, id: PostId) -> StoreResult<Option<Post>>;
    /// Fails with [`StoreError::DuplicatePost`] when the natural key is taken.
    async fn create_post(&self, source_id: SourceId, data: NewPost) -> StoreResult<Post>;
    async fn count_posts(&self, source_id: SourceId) -> StoreResult<usize>;
    /// Oldest first (published time, then id), at most `limit`.
    async fn list_unprocessed_posts(&self, source_id: SourceId, limit: usize)
        -> StoreResult<Vec<Post>>;

    async fn create_news(&self, data: NewNews) -> StoreResult<News>;
    /// Removes a News entry no post links to (lost conversion race).
    async fn delete_news(&self, id: NewsId) -> StoreResult<()>;
    /// Sets `processed` and `news_id` together. Refuses already-processed posts.
    async fn mark_post_converted(&self, post_id: PostId, news_id: NewsId) -> StoreResult<()>;
}

#[derive(Default)]
struct Tables {
    sources: HashMap<SourceId, Source>,
    posts: Vec<Post>,
    post_keys: HashMap<(String, String), PostId>,
    news: Vec<News>,
    next_post_id: PostId,
    next_news_id: NewsId,
}

/// In-process store. Every operation takes the lock once, so each call is
/// atomic on its own; nothing spans calls.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(sources: impl IntoIterator<Item = Source>) -> Self {
        let store = Self::new();
        for s in sources {
            store.upsert_source(s);
        }
        store
    }

    /// Insert or replace a source definition.
    pub fn upsert_source(&self, source: Source) {
        self.inner.lock().sources.insert(source.id, source);
    }

    pub fn remove_source(&self, id: SourceId) -> Option<Source> {
        self.inner.lock().sources.remove(&id)
    }

    pub fn posts(&self) -> Vec<Post> {
        self.inner.lock().posts.clone()
    }

    pub fn news(&self) -> Vec<News> {
        self.inner.lock().news.clone()
    }
}

#[async_trait]
impl IngestionStore for MemoryStore {
    async fn list_sources(&self, active_only: bool) -> StoreResult<Vec<Source>> {
        let t = self.inner.lock();
        let mut out: Vec<Source> = t
            .sources
            .values()
            .filter(|s| !active_only || s.active)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.id);
        Ok(out)
    }

    async fn get_source(&self, id: SourceId) -> StoreResult<Option<Source>> {
        Ok(self.inner.lock().sources.get(&id).cloned())
    }

    async fn update_source_last_sync(&self, id: SourceId, ts: DateTime<Utc>) -> StoreResult<()> {
        let mut t = self.inner.lock();
        let src = t
            .sources
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("source {id}")))?;
        src.last_sync = Some(ts);
        Ok(())
    }

    async fn find_post(&self, platform: &str, native_id: &str) -> StoreResult<Option<Post>> {
        let t = self.inner.lock();
        let key = (platform.to_string(), native_id.to_string());
        Ok(t.post_keys
            .get(&key)
            .and_then(|id| t.posts.iter().find(|p| p.id == *id))
            .cloned())
    }

    async fn get_post(&self, id: PostId) -> StoreResult<Option<Post>> {
        Ok(self.inner.lock().posts.iter().find(|p| p.id == id).cloned())
    }

    async fn create_post(&self, source_id: SourceId, data: NewPost) -> StoreResult<Post> {
        let mut t = self.inner.lock();
        let key = (data.platform.clone(), data.native_id.clone());
        if t.post_keys.contains_key(&key) {
            return Err(StoreError::DuplicatePost {
                platform: key.0,
                native_id: key.1,
            });
        }
        t.next_post_id += 1;
        let post = Post {
            id: t.next_post_id,
            source_id,
            item: data,
            processed: false,
            news_id: None,
            created_at: Utc::now(),
        };
        t.post_keys.insert(key, post.id);
        t.posts.push(post.clone());
        Ok(post)
    }

    async fn count_posts(&self, source_id: SourceId) -> StoreResult<usize> {
        let t = self.inner.lock();
        Ok(t.posts.iter().filter(|p| p.source_id == source_id).count())
    }

    async fn list_unprocessed_posts(
        &self,
        source_id: SourceId,
        limit: usize,
    ) -> StoreResult<Vec<Post>> {
        let t = self.inner.lock();
        let mut out: Vec<Post> = t
            .posts
            .iter()
            .filter(|p| p.source_id == source_id && !p.processed)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.item
                .published_at
                .cmp(&b.item.published_at)
                .then(a.id.cmp(&b.id))
        });
        out.truncate(limit);
        Ok(out)
    }

    async fn create_news(&self, data: NewNews) -> StoreResult<News> {
        let mut t = self.inner.lock();
        if t.news.iter().any(|n| n.entry.slug == data.slug) {
            return Err(StoreError::DuplicateSlug(data.slug));
        }
        t.next_news_id += 1;
        let news = News {
            id: t.next_news_id,
            entry: data,
            created_at: Utc::now(),
        };
        t.news.push(news.clone());
        Ok(news)
    }

    async fn delete_news(&self, id: NewsId) -> StoreResult<()> {
        let mut t = self.inner.lock();
        let idx = t
            .news
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("news {id}")))?;
        t.news.remove(idx);
        Ok(())
    }

    async fn mark_post_converted(&self, post_id: PostId, news_id: NewsId) -> StoreResult<()> {
        let mut t = self.inner.lock();
        let post = t
            .posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or_else(|| StoreError::NotFound(format!("post {post_id}")))?;
        if post.processed {
            return Err(StoreError::AlreadyConverted(post_id));
        }
        post.processed = true;
        post.news_id = Some(news_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(native_id: &str) -> NewPost {
        NewPost {
            platform: "rss".into(),
            native_id: native_id.into(),
            content: "hello".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn natural_key_is_unique_per_platform() {
        let store = MemoryStore::new();
        store.create_post(1, item("a")).await.unwrap();
        let dup = store.create_post(1, item("a")).await;
        assert!(matches!(dup, Err(StoreError::DuplicatePost { .. })));

        let mut other = item("a");
        other.platform = "twitter".into();
        store.create_post(1, other).await.unwrap();
        assert_eq!(store.count_posts(1).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn mark_converted_only_once() {
        let store = MemoryStore::new();
        let p = store.create_post(1, item("x")).await.unwrap();
        store.mark_post_converted(p.id, 7).await.unwrap();
        let again = store.mark_post_converted(p.id, 8).await;
        assert!(matches!(again, Err(StoreError::AlreadyConverted(_))));
        let p = store.get_post(p.id).await.unwrap().unwrap();
        assert!(p.processed);
        assert_eq!(p.news_id, Some(7));
    }

    #[tokio::test]
    async fn unprocessed_are_oldest_first_and_capped() {
        let store = MemoryStore::new();
        for i in (0..5).rev() {
            let mut it = item(&format!("n{i}"));
            it.published_at = chrono::DateTime::from_timestamp(1_700_000_000 + i, 0).unwrap();
            store.create_post(4, it).await.unwrap();
        }
        let out = store.list_unprocessed_posts(4, 3).await.unwrap();
        let ids: Vec<_> = out.iter().map(|p| p.item.native_id.as_str()).collect();
        assert_eq!(ids, vec!["n0", "n1", "n2"]);
    }

    #[tokio::test]
    async fn delete_news_removes_only_that_entry() {
        let store = MemoryStore::new();
        let draft = |slug: &str| NewNews {
            slug: slug.into(),
            title: "t".into(),
            excerpt: String::new(),
            content: String::new(),
            category: "social".into(),
            image: None,
            author_name: None,
            author_avatar: None,
            source_platform: "rss".into(),
            source_url: None,
            source_native_id: "a".into(),
            published_at: Utc::now(),
            tags: Vec::new(),
            auto_generated: true,
        };
        let a = store.create_news(draft("a")).await.unwrap();
        let b = store.create_news(draft("b")).await.unwrap();

        store.delete_news(a.id).await.unwrap();
        let left: Vec<_> = store.news().into_iter().map(|n| n.id).collect();
        assert_eq!(left, vec![b.id]);
        assert!(matches!(
            store.delete_news(a.id).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
