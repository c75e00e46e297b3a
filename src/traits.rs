use crate::app::Run;
use crate::timeline::TimelineRecord;
use async_trait::async_trait;
use color_eyre::eyre::Result;

/// The one capability the poller needs. Kept to a single method so tests can
/// stand in a fake without touching the poller.
#[async_trait]
pub trait RunSource: Send + Sync {
    async fn list_runs(&self, limit: usize) -> Result<Vec<Run>>;
}

/// Per-run drill-down data, fetched on demand by the controller.
#[async_trait]
pub trait TimelineSource: Send + Sync {
    async fn fetch_timeline(&self, run_id: u64) -> Result<Vec<TimelineRecord>>;
    async fn fetch_log(&self, run_id: u64, log_id: u64) -> Result<String>;
}
