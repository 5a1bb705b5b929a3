use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use tracing::{error, info, warn};

use crate::db::HistoryStore;
use crate::scrape::{scrape_window, PageFetch};
use crate::sweep::mapper::map_entries;
use crate::sweep::planner::plan;
use crate::sweep::query::build_query_url;
use crate::types::{DateWindow, Job, JobId};

/// A page that produced no rows because its fetch failed.
#[derive(Debug, Clone, PartialEq)]
pub struct PageFailure {
    pub window: usize,
    pub checkin: NaiveDate,
    pub page: u32,
    pub reason: String,
}

/// Summary of one run. Informational only; failures inside a run are already logged.
#[derive(Debug)]
pub struct JobReport {
    pub job_id: JobId,
    pub windows: usize,
    pub pages_ok: usize,
    pub page_failures: Vec<PageFailure>,
    pub rows_inserted: usize,
    pub insert_failures: usize,
    pub delete_failed: bool,
    /// Row count written back to the job, if the count query succeeded.
    pub final_count: Option<i64>,
    pub duration: Duration,
}

impl JobReport {
    fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            windows: 0,
            pages_ok: 0,
            page_failures: Vec::new(),
            rows_inserted: 0,
            insert_failures: 0,
            delete_failed: false,
            final_count: None,
            duration: Duration::ZERO,
        }
    }
}

/// Runs one job end to end: clear old history, sweep every window, write the count back.
pub struct JobProcessor {
    fetcher: Arc<dyn PageFetch>,
    store: Arc<dyn HistoryStore>,
    page_count: u32,
}

impl JobProcessor {
    pub fn new(fetcher: Arc<dyn PageFetch>, store: Arc<dyn HistoryStore>, page_count: u32) -> Self {
        Self { fetcher, store, page_count }
    }

    /// Process `job` with windows starting tomorrow (local time). Never fails.
    pub async fn process(&self, job: &Job) -> JobReport {
        self.process_on(job, Local::now().date_naive()).await
    }

    pub async fn process_on(&self, job: &Job, today: NaiveDate) -> JobReport {
        let started = Instant::now();
        let mut report = JobReport::new(job.id.clone());

        info!(
            job_id = %job.id,
            days = job.days,
            nights = job.nights,
            pages = self.page_count,
            "Job started",
        );

        // Not transactional with the inserts below: a failed delete leaves old rows in place.
        if let Err(e) = self.store.delete_history(&job.id).await {
            error!(job_id = %job.id, "Failed to clear previous history: {e}");
            report.delete_failed = true;
        }

        for (idx, window) in plan(today, job.days, job.nights).iter().enumerate() {
            self.process_window(job, idx, window, &mut report).await;
            report.windows += 1;
        }

        match self.store.count_history(&job.id).await {
            Ok(count) => {
                report.final_count = Some(count);
                if let Err(e) = self.store.update_job_count(&job.id, count).await {
                    error!(job_id = %job.id, count, "Failed to write result count: {e}");
                }
            }
            Err(e) => error!(job_id = %job.id, "Failed to count history: {e}"),
        }

        report.duration = started.elapsed();
        if !report.page_failures.is_empty() {
            let missing: Vec<String> = report
                .page_failures
                .iter()
                .map(|f| format!("{}#{}", f.checkin, f.page))
                .collect();
            warn!(
                job_id = %job.id,
                "{} page(s) missing until the next run: {}",
                missing.len(),
                missing.join(", "),
            );
        }
        info!(
            job_id = %job.id,
            windows = report.windows,
            pages_ok = report.pages_ok,
            rows = report.rows_inserted,
            failed_pages = report.page_failures.len(),
            failed_inserts = report.insert_failures,
            delete_failed = report.delete_failed,
            qtd = ?report.final_count,
            "Job completed in {:.2} seconds",
            report.duration.as_secs_f64(),
        );
        report
    }

    async fn process_window(&self, job: &Job, idx: usize, window: &DateWindow, report: &mut JobReport) {
        let query_url = build_query_url(job, window);
        info!(
            job_id = %job.id,
            window = idx,
            checkin = %window.checkin,
            checkout = %window.checkout,
            "Scraping window",
        );

        let outcomes = scrape_window(self.fetcher.as_ref(), &job.scrape_url, &query_url, self.page_count).await;

        for outcome in outcomes {
            let entries = match outcome.result {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(
                        job_id = %job.id,
                        window = idx,
                        checkin = %window.checkin,
                        page = outcome.page,
                        "Page fetch failed: {e}",
                    );
                    report.page_failures.push(PageFailure {
                        window: idx,
                        checkin: window.checkin,
                        page: outcome.page,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            report.pages_ok += 1;

            let records = map_entries(entries, &job.id, window, &query_url);
            if records.is_empty() {
                continue;
            }
            match self.store.insert_history(&records).await {
                Ok(()) => report.rows_inserted += records.len(),
                Err(e) => {
                    error!(
                        job_id = %job.id,
                        window = idx,
                        checkin = %window.checkin,
                        page = outcome.page,
                        rows = records.len(),
                        "History insert failed: {e}",
                    );
                    report.insert_failures += 1;
                }
            }
        }
    }
}
