use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};

use crate::api::health::HealthState;
use crate::sweep::JobProcessor;
use crate::types::{Job, JobId};

/// Hands each received job to its own task.
///
/// Different job ids run concurrently. Runs for the same id are serialized behind a
/// per-id lock so two delete/insert sequences never interleave on one job's rows.
pub struct JobDispatcher {
    processor: Arc<JobProcessor>,
    health: Arc<HealthState>,
    locks: Arc<DashMap<JobId, Arc<Mutex<()>>>>,
}

impl JobDispatcher {
    pub fn new(processor: Arc<JobProcessor>, health: Arc<HealthState>) -> Self {
        Self {
            processor,
            health,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub async fn run(self, mut jobs_rx: mpsc::UnboundedReceiver<Job>) {
        while let Some(job) = jobs_rx.recv().await {
            self.dispatch(job);
        }
        info!("Job channel closed, dispatcher stopping");
    }

    fn dispatch(&self, job: Job) {
        let job_id = job.id.clone();
        let lock = Arc::clone(self.locks.entry(job_id.clone()).or_default().value());
        if lock.try_lock().is_err() {
            info!(job_id = %job_id, "Job already running, queued behind the current run");
        }

        let processor = Arc::clone(&self.processor);
        let locks = Arc::clone(&self.locks);
        let health = Arc::clone(&self.health);
        health.inc_jobs_started();

        let run = tokio::spawn(async move {
            let guard = lock.lock().await;
            let report = processor.process(&job).await;
            drop(guard);
            // Map entry plus our clone: nobody else is waiting on this id.
            locks.remove_if(&job.id, |_, l| Arc::strong_count(l) <= 2);
            report
        });

        tokio::spawn(async move {
            match run.await {
                Ok(report) => info!(
                    job_id = %report.job_id,
                    rows = report.rows_inserted,
                    failed_pages = report.page_failures.len(),
                    "Job finished",
                ),
                Err(e) => error!(job_id = %job_id, "Job task aborted: {e}"),
            }
            health.inc_jobs_completed();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::tests::memory_store;
    use crate::error::FetchError;
    use crate::scrape::PageFetch;
    use crate::types::RawEntry;
    use serde_json::{json, Value};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Tracks the highest number of fetches in flight at once.
    #[derive(Default)]
    struct GaugeFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PageFetch for GaugeFetcher {
        async fn fetch(&self, _s: &str, _q: &str, page: u32) -> Result<Vec<RawEntry>, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(40)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![RawEntry {
                room_id: json!(page),
                price: Value::Null,
                position: Value::Null,
                available: Value::Null,
            }])
        }
    }

    fn job(id: i64) -> Job {
        Job {
            id: JobId::Int(id),
            url_template: "https://x/s?q=1".to_string(),
            amenities: vec![],
            adults: 1,
            min_bedrooms: 1,
            price_max: None,
            days: 2,
            nights: 1,
            scrape_url: "http://unused".to_string(),
            qtd: None,
        }
    }

    async fn run_jobs(jobs: Vec<Job>) -> (Arc<GaugeFetcher>, Arc<HealthState>) {
        let fetcher = Arc::new(GaugeFetcher::default());
        let store = Arc::new(memory_store().await);
        let processor = Arc::new(JobProcessor::new(fetcher.clone(), store, 1));
        let health = Arc::new(HealthState::new());
        let dispatcher = JobDispatcher::new(processor, Arc::clone(&health));

        let (tx, rx) = mpsc::unbounded_channel();
        let expected = jobs.len() as u64;
        for j in jobs {
            tx.send(j).unwrap();
        }
        drop(tx);
        dispatcher.run(rx).await;

        tokio::time::timeout(Duration::from_secs(5), async {
            while health.jobs_completed() < expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        (fetcher, health)
    }

    #[tokio::test]
    async fn same_job_id_runs_one_at_a_time() {
        let (fetcher, health) = run_jobs(vec![job(1), job(1)]).await;
        assert_eq!(health.jobs_started(), 2);
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_job_ids_run_concurrently() {
        let (fetcher, _) = run_jobs(vec![job(1), job(2)]).await;
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 2);
    }
}
