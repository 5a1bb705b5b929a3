use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_RANGE;
use reqwest::{RequestBuilder, Response};
use tracing::debug;

use crate::config::{HISTORY_TABLE, JOBS_TABLE};
use crate::db::HistoryStore;
use crate::error::{AppError, StoreError};
use crate::types::{HistoryRecord, Job, JobId};

/// Store backed by a PostgREST-style collection API (`/rest/v1/<table>`).
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    key: String,
}

impl RestStore {
    pub fn new(base_url: &str, key: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
        })
    }

    fn table(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.key).bearer_auth(&self.key)
    }

    async fn send(&self, op: &'static str, req: RequestBuilder) -> Result<Response, StoreError> {
        let resp = self
            .authed(req)
            .send()
            .await
            .map_err(|e| StoreError::new(op, e))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::new(op, format!("HTTP {status}: {body}")))
    }
}

#[async_trait]
impl HistoryStore for RestStore {
    async fn select_latest_job(&self) -> Result<Option<Job>, StoreError> {
        const OP: &str = "select_latest_job";
        let req = self
            .client
            .get(self.table(JOBS_TABLE))
            .query(&[("select", "*"), ("order", "created_at.desc"), ("limit", "1")]);
        let jobs: Vec<Job> = self
            .send(OP, req)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::new(OP, e))?;
        Ok(jobs.into_iter().next())
    }

    async fn delete_history(&self, job: &JobId) -> Result<(), StoreError> {
        let req = self
            .client
            .delete(self.table(HISTORY_TABLE))
            .query(&[("job", format!("eq.{job}"))]);
        self.send("delete_history", req).await?;
        Ok(())
    }

    async fn insert_history(&self, records: &[HistoryRecord]) -> Result<(), StoreError> {
        let req = self
            .client
            .post(self.table(HISTORY_TABLE))
            .header("Prefer", "return=minimal")
            .json(records);
        self.send("insert_history", req).await?;
        debug!(rows = records.len(), "history rows inserted");
        Ok(())
    }

    async fn count_history(&self, job: &JobId) -> Result<i64, StoreError> {
        const OP: &str = "count_history";
        let req = self
            .client
            .head(self.table(HISTORY_TABLE))
            .header("Prefer", "count=exact")
            .query(&[("select", "*".to_string()), ("job", format!("eq.{job}"))]);
        let resp = self.send(OP, req).await?;
        let range = resp
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| StoreError::new(OP, "missing Content-Range header"))?;
        parse_content_range_total(range)
            .ok_or_else(|| StoreError::new(OP, format!("unparseable Content-Range: {range}")))
    }

    async fn update_job_count(&self, job: &JobId, qtd: i64) -> Result<(), StoreError> {
        let req = self
            .client
            .patch(self.table(JOBS_TABLE))
            .header("Prefer", "return=minimal")
            .query(&[("id", format!("eq.{job}"))])
            .json(&serde_json::json!({ "qtd": qtd }));
        self.send("update_job", req).await?;
        Ok(())
    }
}

/// Total from an exact-count `Content-Range` header: `0-24/312` or `*/0` → 312 / 0.
fn parse_content_range_total(value: &str) -> Option<i64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}
