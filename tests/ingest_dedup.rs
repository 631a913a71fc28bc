// tests/ingest_dedup.rs
mod common;

use common::{harness, mock_source, post, posts, MOCK};
use social_ingest::ingest::store::IngestionStore;
use social_ingest::ingest::types::NewPost;
use social_ingest::CycleStatus;

#[tokio::test]
async fn same_item_twice_in_one_batch_is_stored_once() {
    let h = harness(vec![mock_source(1)], vec![post(1), post(1), post(2)]);

    let report = h.service.scrape_source(1).await;
    assert_eq!(report.status, CycleStatus::Completed);
    assert_eq!(report.fetched, 3);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(h.store.count_posts(1).await.unwrap(), 2);
}

#[tokio::test]
async fn repeated_cycles_never_duplicate_or_overwrite() {
    let h = harness(vec![mock_source(1)], posts(1..=3));
    h.service.scrape_source(1).await;

    // Same ids come back with edited content; existing rows stay as they were.
    let mut edited = posts(1..=3);
    for p in &mut edited {
        p.content = "edited upstream".into();
    }
    edited.push(post(4));
    h.adapter.set_posts(edited);

    let report = h.service.scrape_source(1).await;
    assert_eq!((report.inserted, report.skipped), (1, 3));
    assert_eq!(h.store.count_posts(1).await.unwrap(), 4);

    let stored = h.store.find_post(MOCK, "m-1").await.unwrap().unwrap();
    assert!(stored.item.content.contains("Update number 1"));
}

#[tokio::test]
async fn natural_key_is_shared_across_sources_of_one_platform() {
    let h = harness(vec![mock_source(1), mock_source(2)], posts(1..=2));
    h.service.scrape_source(1).await;
    let report = h.service.scrape_source(2).await;

    assert_eq!((report.inserted, report.skipped), (0, 2));
    assert_eq!(h.store.count_posts(2).await.unwrap(), 0);
    assert_eq!(h.store.posts().len(), 2);
}

#[tokio::test]
async fn items_without_native_id_are_dropped_and_platform_is_filled() {
    let blank = NewPost {
        native_id: "  ".into(),
        ..post(9)
    };
    let unlabelled = NewPost {
        platform: String::new(),
        ..post(10)
    };
    let h = harness(vec![mock_source(1)], vec![blank, unlabelled]);

    let report = h.service.scrape_source(1).await;
    assert_eq!((report.inserted, report.skipped), (1, 1));
    let stored = h.store.find_post(MOCK, "m-10").await.unwrap();
    assert!(stored.is_some(), "platform should default to the source's");
}

#[tokio::test]
async fn successful_cycle_stamps_last_sync() {
    let h = harness(vec![mock_source(1)], posts(1..=1));
    assert!(h.store.get_source(1).await.unwrap().unwrap().last_sync.is_none());

    h.service.scrape_source(1).await;
    assert!(h.store.get_source(1).await.unwrap().unwrap().last_sync.is_some());
}
