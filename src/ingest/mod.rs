// src/ingest/mod.rs
pub mod adapters;
pub mod config;
pub mod convert;
pub mod scheduler;
pub mod scraper;
pub mod store;
pub mod types;

use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;
use regex::Regex;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scrape_cycles_total", "Scrape cycles started, per platform.");
        describe_counter!(
            "scrape_errors_total",
            "Scrape cycles that ended in an adapter or store failure."
        );
        describe_counter!("posts_fetched_total", "Normalized posts returned by adapters.");
        describe_counter!("posts_inserted_total", "Posts stored for the first time.");
        describe_counter!(
            "posts_skipped_total",
            "Posts skipped because the (platform, native id) pair already exists."
        );
        describe_counter!("news_converted_total", "Posts promoted into news entries.");
        describe_gauge!("scheduler_tasks", "Installed scheduler tasks, sweep included.");
        describe_gauge!("sweep_last_run_ts", "Unix ts when the hourly sweep last ran.");
    });
}

/// Strip markup tags and trim. Entities and inner whitespace are left alone.
pub fn plain_text(s: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re = RE_TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex"));
    re.replace_all(s, "").trim().to_string()
}

/// Collapse runs of whitespace into single spaces.
pub fn collapse_whitespace(s: &str) -> String {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("ws regex"));
    re.replace_all(s.trim(), " ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_strips_tags_only() {
        let s = "  <p>Hello <b>big</b>\n world</p>  ";
        assert_eq!(plain_text(s), "Hello big\n world");
    }

    #[test]
    fn plain_text_handles_multiline_tags() {
        assert_eq!(plain_text("<a\nhref=\"x\">link</a>"), "link");
    }

    #[test]
    fn collapse_whitespace_trims_and_joins() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
    }
}
