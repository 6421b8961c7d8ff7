//! Download analytics repository.

use crate::error::MetadataResult;
use crate::models::{DownloadSummary, NewDownload};
use async_trait::async_trait;

/// Append-only download event log and aggregation.
#[async_trait]
pub trait AnalyticsRepo: Send + Sync {
    /// Record a download event.
    async fn log_download(&self, event: NewDownload) -> MetadataResult<()>;

    /// Aggregate totals, recency windows, and per-platform/channel/runtime
    /// breakdowns. Channel and runtime come from the downloaded update's row.
    async fn download_summary(&self) -> MetadataResult<DownloadSummary>;
}
