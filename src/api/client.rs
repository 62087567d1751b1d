use crate::api::{ApiError, SnapshotApi};
use crate::model::{ChainSnapshot, RunOutcome, SnapshotPage};
use anyhow::{Context, Result};
use async_trait::async_trait;

/// Header carrying the operator credential on trigger calls.
const API_KEY_HEADER: &str = "X-API-Key";

/// Typed wrapper over the two backend endpoints.
///
/// Stateless beyond the shared connection pool. No retries and no timeouts
/// beyond what reqwest applies by default.
pub struct SnapshotRepository {
    http: reqwest::Client,
    base_url: String,
}

impl SnapshotRepository {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("chain-snapshot-cli/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl SnapshotApi for SnapshotRepository {
    async fn list_snapshots(&self, limit: u32) -> Result<Vec<ChainSnapshot>, ApiError> {
        let resp = self
            .http
            .get(self.url("/api/chain-snapshots"))
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(ApiError::Transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
            });
        }
        // Returned verbatim: ordering is server-determined and preserved.
        let page: SnapshotPage = resp.json().await.map_err(ApiError::Decode)?;
        Ok(page.items)
    }

    async fn trigger_run(&self, api_key: Option<&str>) -> Result<RunOutcome, ApiError> {
        let mut req = self.http.post(self.url("/api/admin/run-snapshot"));
        if let Some(key) = api_key {
            req = req.header(API_KEY_HEADER, key);
        }
        let resp = req.send().await.map_err(ApiError::Transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
            });
        }
        resp.json().await.map_err(ApiError::Decode)
    }
}
