// src/ingest/scraper.rs
use anyhow::{Context, Result};
use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;

use crate::ingest::adapters::AdapterRegistry;
use crate::ingest::convert::{Converter, MAX_CONVERSIONS_PER_RUN};
use crate::ingest::ensure_metrics_described;
use crate::ingest::store::{IngestionStore, StoreError};
use crate::ingest::types::{NewPost, Source, SourceId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum CycleStatus {
    Completed,
    /// Source missing or inactive; nothing was attempted.
    Skipped(String),
    Failed(String),
}

/// What one cycle did. Produced even when the cycle fails.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub source_id: SourceId,
    pub fetched: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub converted: usize,
    pub status: CycleStatus,
}

impl CycleReport {
    fn new(source_id: SourceId) -> Self {
        Self {
            source_id,
            fetched: 0,
            inserted: 0,
            skipped: 0,
            converted: 0,
            status: CycleStatus::Completed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CycleStatus::Completed
    }

    pub fn summary(&self) -> String {
        match &self.status {
            CycleStatus::Completed => format!(
                "fetched {}, inserted {}, skipped {}, converted {}",
                self.fetched, self.inserted, self.skipped, self.converted
            ),
            CycleStatus::Skipped(reason) => format!("skipped: {reason}"),
            CycleStatus::Failed(error) => format!("failed: {error}"),
        }
    }
}

/// Runs one fetch -> dedup -> persist -> (convert) cycle for one source.
pub struct ScraperService {
    store: Arc<dyn IngestionStore>,
    registry: AdapterRegistry,
    converter: Converter,
}

impl ScraperService {
    pub fn new(store: Arc<dyn IngestionStore>, registry: AdapterRegistry) -> Self {
        ensure_metrics_described();
        Self {
            converter: Converter::new(store.clone()),
            store,
            registry,
        }
    }

    pub fn store(&self) -> &Arc<dyn IngestionStore> {
        &self.store
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    /// Never fails: every error ends up in the report and the log.
    pub async fn scrape_source(&self, source_id: SourceId) -> CycleReport {
        let mut report = CycleReport::new(source_id);

        let source = match self.store.get_source(source_id).await {
            Ok(Some(s)) if s.active => s,
            Ok(Some(_)) => {
                tracing::info!(source_id, "source inactive, cycle skipped");
                report.status = CycleStatus::Skipped("source is inactive".into());
                return report;
            }
            Ok(None) => {
                tracing::info!(source_id, "source not found, cycle skipped");
                report.status = CycleStatus::Skipped("source not found".into());
                return report;
            }
            Err(e) => {
                tracing::error!(source_id, error = %e, "loading source failed");
                report.status = CycleStatus::Failed(e.to_string());
                return report;
            }
        };

        counter!("scrape_cycles_total", "platform" => source.platform.clone()).increment(1);
        if let Err(e) = self.run_cycle(&source, &mut report).await {
            counter!("scrape_errors_total", "platform" => source.platform.clone()).increment(1);
            tracing::error!(
                source_id,
                source = %source.label(),
                platform = %source.platform,
                error = %format!("{e:#}"),
                "scrape cycle failed"
            );
            report.status = CycleStatus::Failed(format!("{e:#}"));
        } else {
            tracing::info!(
                source_id,
                platform = %source.platform,
                fetched = report.fetched,
                inserted = report.inserted,
                skipped = report.skipped,
                converted = report.converted,
                "scrape cycle finished"
            );
        }
        report
    }

    async fn run_cycle(&self, source: &Source, report: &mut CycleReport) -> Result<()> {
        let result = self.registry.scrape(source).await;
        if !result.success {
            anyhow::bail!(result
                .error
                .unwrap_or_else(|| "adapter failed without detail".to_string()));
        }
        report.fetched = result.posts.len();

        let (inserted, skipped) = self.persist_posts(source, result.posts).await?;
        report.inserted = inserted;
        report.skipped = skipped;

        self.store
            .update_source_last_sync(source.id, Utc::now())
            .await
            .context("updating last sync")?;

        if source.auto_convert_to_news() {
            report.converted = self
                .converter
                .convert_pending(source.id, MAX_CONVERSIONS_PER_RUN)
                .await
                .context("converting posts")?;
        }
        Ok(())
    }

    /// Insert posts whose (platform, native id) is new; never touch existing
    /// ones. Returns (inserted, skipped).
    pub async fn persist_posts(
        &self,
        source: &Source,
        posts: Vec<NewPost>,
    ) -> Result<(usize, usize)> {
        let mut inserted = 0usize;
        let mut skipped = 0usize;
        for mut post in posts {
            if post.native_id.trim().is_empty() {
                tracing::debug!(source_id = source.id, "post without native id dropped");
                skipped += 1;
                continue;
            }
            if post.platform.is_empty() {
                post.platform = source.platform.clone();
            }

            if self
                .store
                .find_post(&post.platform, &post.native_id)
                .await?
                .is_some()
            {
                skipped += 1;
                continue;
            }
            // A concurrent cycle may insert between lookup and create.
            match self.store.create_post(source.id, post).await {
                Ok(_) => inserted += 1,
                Err(StoreError::DuplicatePost { .. }) => skipped += 1,
                Err(e) => return Err(e).context("storing post"),
            }
        }
        counter!("posts_inserted_total").increment(inserted as u64);
        counter!("posts_skipped_total").increment(skipped as u64);
        Ok((inserted, skipped))
    }
}
