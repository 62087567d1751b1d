//! Backend API surface: the repository client and its error taxonomy.

mod client;
mod error;

pub use client::SnapshotRepository;
pub use error::ApiError;

use crate::model::{ChainSnapshot, RunOutcome};
use async_trait::async_trait;

/// The two backend operations the console consumes.
///
/// The controller is written against this seam so its state machine can be
/// exercised with scripted completions instead of a live backend.
#[async_trait]
pub trait SnapshotApi: Send + Sync {
    /// Fetch up to `limit` snapshot rows, in server order.
    async fn list_snapshots(&self, limit: u32) -> Result<Vec<ChainSnapshot>, ApiError>;

    /// Ask the backend to attempt an immediate capture. `api_key` is attached
    /// as a credential header when present; when absent the request is sent
    /// unauthenticated and the backend decides whether that is acceptable.
    async fn trigger_run(&self, api_key: Option<&str>) -> Result<RunOutcome, ApiError>;
}
