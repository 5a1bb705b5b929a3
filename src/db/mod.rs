pub mod models;
pub mod rest;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{HistoryRecord, Job, JobId};

pub use rest::RestStore;
pub use sqlite::SqliteStore;

/// The persistence operations the sweep engine needs. Every call is scoped to one job id,
/// so runs for different jobs never touch each other's rows.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Most recently created job, used by batch mode.
    async fn select_latest_job(&self) -> Result<Option<Job>, StoreError>;

    async fn delete_history(&self, job: &JobId) -> Result<(), StoreError>;

    async fn insert_history(&self, records: &[HistoryRecord]) -> Result<(), StoreError>;

    async fn count_history(&self, job: &JobId) -> Result<i64, StoreError>;

    /// Write the result count back onto the job row (`qtd`).
    async fn update_job_count(&self, job: &JobId, qtd: i64) -> Result<(), StoreError>;
}
