// src/ingest/scheduler.rs
//! Timer ownership for the ingestion pipeline.
//!
//! ```text
//! JobScheduler
//!   ├─ "sweep"      (hourly)  ─► every stale active source ─► ScraperService
//!   └─ "source:<id>" (per source cadence)                  ─► ScraperService
//! ```
//!
//! Firings are independent and may overlap; the scraper's natural-key dedup
//! and the converter's `processed` re-check make that harmless.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use metrics::gauge;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::ingest::scraper::{CycleReport, ScraperService};
use crate::ingest::types::{Source, SourceId};

pub const SWEEP_TASK_ID: &str = "sweep";
/// Top of every hour.
pub const SWEEP_CRON: &str = "0 0 * * * *";
/// The sweep picks up sources not synced for this long.
const SWEEP_STALE_AFTER_SECS: i64 = 3600;

/// How often a source's task fires, derived from its sync interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    EveryMinute,
    EveryMinutes(u64),
    EveryHours(u64),
    Daily,
}

impl Cadence {
    pub fn from_interval_secs(secs: u64) -> Self {
        match secs {
            0..=59 => Cadence::EveryMinute,
            60..=3599 => Cadence::EveryMinutes(secs / 60),
            3600..=86399 => Cadence::EveryHours(secs / 3600),
            _ => Cadence::Daily,
        }
    }

    /// Six-field cron expression (seconds first).
    pub fn cron_expr(&self) -> String {
        match self {
            Cadence::EveryMinute => "0 * * * * *".to_string(),
            Cadence::EveryMinutes(n) => format!("0 */{n} * * * *"),
            Cadence::EveryHours(n) => format!("0 0 */{n} * * *"),
            Cadence::Daily => "0 0 0 * * *".to_string(),
        }
    }
}

pub fn source_task_id(id: SourceId) -> String {
    format!("source:{id}")
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub running: bool,
    pub active_tasks: usize,
    pub task_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerOutcome {
    pub success: bool,
    pub message: String,
    pub report: CycleReport,
}

#[derive(Default)]
struct SchedulerState {
    cron: Option<JobScheduler>,
    tasks: BTreeMap<String, Uuid>,
}

/// Owns the sweep task plus one task per active source. Constructed
/// explicitly and handed to whoever drives startup and shutdown.
pub struct Scheduler {
    service: Arc<ScraperService>,
    state: Mutex<SchedulerState>,
}

impl Scheduler {
    pub fn new(service: Arc<ScraperService>) -> Self {
        Self {
            service,
            state: Mutex::new(SchedulerState::default()),
        }
    }

    pub fn service(&self) -> &Arc<ScraperService> {
        &self.service
    }

    /// Install the sweep and every active source's task. No-op when running.
    pub async fn start(&self) -> Result<()> {
        let mut st = self.state.lock().await;
        if st.cron.is_some() {
            tracing::debug!("scheduler already running");
            return Ok(());
        }

        let cron = JobScheduler::new()
            .await
            .context("creating job scheduler")?;
        let mut tasks = BTreeMap::new();

        let sweep_id = cron
            .add(sweep_job(self.service.clone())?)
            .await
            .context("adding sweep job")?;
        tasks.insert(SWEEP_TASK_ID.to_string(), sweep_id);

        match self.service.store().list_sources(true).await {
            Ok(sources) => {
                for source in &sources {
                    // One bad source must not keep the others unscheduled.
                    if let Err(e) = install_source_task(&self.service, &cron, &mut tasks, source).await
                    {
                        tracing::error!(source_id = source.id, error = ?e, "installing source task failed");
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "listing sources failed; only the sweep is scheduled")
            }
        }

        cron.start().await.context("starting job scheduler")?;
        st.cron = Some(cron);
        st.tasks = tasks;
        gauge!("scheduler_tasks").set(st.tasks.len() as f64);
        tracing::info!(tasks = st.tasks.len(), "scheduler started");
        Ok(())
    }

    /// Cancel every future firing. In-flight cycles keep running.
    /// Safe to call when never started.
    pub async fn stop(&self) {
        let mut st = self.state.lock().await;
        let tasks = std::mem::take(&mut st.tasks);
        if let Some(mut cron) = st.cron.take() {
            for (name, id) in &tasks {
                if let Err(e) = cron.remove(id).await {
                    tracing::warn!(task = %name, error = ?e, "removing task failed");
                }
            }
            if let Err(e) = cron.shutdown().await {
                tracing::warn!(error = ?e, "job scheduler shutdown failed");
            }
            tracing::info!(removed = tasks.len(), "scheduler stopped");
        }
        gauge!("scheduler_tasks").set(0.0);
    }

    /// One cycle for one source, outside its schedule.
    pub async fn trigger_scraping(&self, source_id: SourceId) -> TriggerOutcome {
        let report = self.service.scrape_source(source_id).await;
        TriggerOutcome {
            success: report.is_success(),
            message: report.summary(),
            report,
        }
    }

    /// Re-read a source and replace (or drop) its task. Returns whether a
    /// task is installed afterwards.
    pub async fn reload_source(&self, source_id: SourceId) -> Result<bool> {
        let source = self
            .service
            .store()
            .get_source(source_id)
            .await
            .with_context(|| format!("loading source {source_id}"))?;

        let mut guard = self.state.lock().await;
        let SchedulerState { cron, tasks } = &mut *guard;

        let installed = match (cron.as_ref(), source) {
            (Some(cron), Some(source)) if source.active => {
                // The previous task is dropped only after the new one is added.
                install_source_task(&self.service, cron, tasks, &source).await?;
                true
            }
            (cron, source) => {
                if let Some(old) = tasks.remove(&source_task_id(source_id)) {
                    if let Some(cron) = cron {
                        if let Err(e) = cron.remove(&old).await {
                            tracing::warn!(source_id, error = ?e, "removing previous task failed");
                        }
                    }
                }
                if source.is_some_and(|s| s.active) {
                    tracing::debug!(source_id, "scheduler stopped; task will be installed on start");
                } else {
                    tracing::info!(source_id, "source inactive or deleted; no task");
                }
                false
            }
        };
        gauge!("scheduler_tasks").set(tasks.len() as f64);
        Ok(installed)
    }

    pub async fn status(&self) -> SchedulerStatus {
        let st = self.state.lock().await;
        SchedulerStatus {
            running: st.cron.is_some(),
            active_tasks: st.tasks.len(),
            task_ids: st.tasks.keys().cloned().collect(),
        }
    }

    /// Run the sweep now. Returns how many sources it scraped.
    pub async fn run_sweep(&self) -> usize {
        sweep_once(&self.service).await
    }
}

async fn install_source_task(
    service: &Arc<ScraperService>,
    cron: &JobScheduler,
    tasks: &mut BTreeMap<String, Uuid>,
    source: &Source,
) -> Result<()> {
    let cadence = Cadence::from_interval_secs(source.sync_interval_secs);
    let expr = cadence.cron_expr();
    let source_id = source.id;
    let service = service.clone();

    let job = Job::new_async(expr.as_str(), move |_uuid, _lock| {
        let service = service.clone();
        Box::pin(async move {
            let report = service.scrape_source(source_id).await;
            tracing::debug!(source_id, summary = %report.summary(), "scheduled cycle done");
        })
    })
    .with_context(|| format!("creating job for cron {expr}"))?;
    let uuid = cron.add(job).await.context("adding source job")?;

    if let Some(old) = tasks.insert(source_task_id(source_id), uuid) {
        if let Err(e) = cron.remove(&old).await {
            tracing::warn!(source_id, error = ?e, "removing replaced task failed");
        }
    }
    tracing::info!(
        source_id,
        platform = %source.platform,
        cron = %expr,
        "source task installed"
    );
    Ok(())
}

fn sweep_job(service: Arc<ScraperService>) -> Result<Job> {
    Job::new_async(SWEEP_CRON, move |_uuid, _lock| {
        let service = service.clone();
        Box::pin(async move {
            sweep_once(&service).await;
        })
    })
    .context("creating sweep job")
}

/// Scrape every active source whose last sync is missing or older than an
/// hour, stamping `last_sync` after each attempt whatever the outcome.
pub async fn sweep_once(service: &ScraperService) -> usize {
    let store = service.store();
    let sources = match store.list_sources(true).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "sweep: listing sources failed");
            return 0;
        }
    };

    let cutoff = Utc::now() - Duration::seconds(SWEEP_STALE_AFTER_SECS);
    let mut scraped = 0usize;
    for source in sources
        .iter()
        .filter(|s| s.last_sync.map_or(true, |t| t < cutoff))
    {
        let report = service.scrape_source(source.id).await;
        scraped += 1;
        if let Err(e) = store.update_source_last_sync(source.id, Utc::now()).await {
            tracing::warn!(source_id = source.id, error = %e, "sweep: updating last sync failed");
        }
        tracing::debug!(source_id = source.id, summary = %report.summary(), "sweep cycle done");
    }

    gauge!("sweep_last_run_ts").set(Utc::now().timestamp() as f64);
    tracing::info!(scraped, "sweep finished");
    scraped
}
