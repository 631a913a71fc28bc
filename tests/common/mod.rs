// tests/common/mod.rs
// Shared doubles for the pipeline tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use social_ingest::ingest::types::{NewPost, Source};
use social_ingest::{AdapterRegistry, MemoryStore, PlatformAdapter, ScrapeError, ScraperService};

pub const MOCK: &str = "mock";

/// Adapter returning a preset batch; the batch can be swapped between cycles.
pub struct ScriptedAdapter {
    tag: &'static str,
    batch: Mutex<Result<Vec<NewPost>, String>>,
    calls: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new(tag: &'static str, posts: Vec<NewPost>) -> Arc<Self> {
        Arc::new(Self {
            tag,
            batch: Mutex::new(Ok(posts)),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_posts(&self, posts: Vec<NewPost>) {
        *self.batch.lock() = Ok(posts);
    }

    pub fn fail_with(&self, message: &str) {
        *self.batch.lock() = Err(message.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformAdapter for ScriptedAdapter {
    fn platform(&self) -> &str {
        self.tag
    }

    async fn fetch_posts(&self, _source: &Source) -> Result<Vec<NewPost>, ScrapeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let batch = self.batch.lock().clone();
        batch.map_err(|message| ScrapeError::Parse {
            platform: MOCK,
            message,
        })
    }
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// Post `n` of the mock platform, published `n` minutes after the base time.
pub fn post(n: i64) -> NewPost {
    NewPost {
        platform: MOCK.to_string(),
        native_id: format!("m-{n}"),
        content: format!("<p>Update number {n} from the neighborhood #local</p>"),
        url: Some(format!("https://mock.example/p/{n}")),
        published_at: base_time() + Duration::minutes(n),
        hashtags: vec!["local".to_string()],
        ..Default::default()
    }
}

pub fn posts(range: std::ops::RangeInclusive<i64>) -> Vec<NewPost> {
    range.map(post).collect()
}

pub fn mock_source(id: i64) -> Source {
    Source::new(id, MOCK)
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub adapter: Arc<ScriptedAdapter>,
    pub service: Arc<ScraperService>,
}

pub fn harness(sources: Vec<Source>, posts: Vec<NewPost>) -> Harness {
    let store = Arc::new(MemoryStore::with_sources(sources));
    let adapter = ScriptedAdapter::new(MOCK, posts);
    let mut registry = AdapterRegistry::new();
    registry.register(adapter.clone());
    let service = Arc::new(ScraperService::new(store.clone(), registry));
    Harness {
        store,
        adapter,
        service,
    }
}
