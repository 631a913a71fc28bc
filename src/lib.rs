// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod ingest;
pub mod metrics;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::ingest::adapters::{AdapterRegistry, HttpSettings, PlatformAdapter, ScrapeError};
pub use crate::ingest::scheduler::{Scheduler, SchedulerStatus, TriggerOutcome};
pub use crate::ingest::scraper::{CycleReport, CycleStatus, ScraperService};
pub use crate::ingest::store::{IngestionStore, MemoryStore, StoreError};
