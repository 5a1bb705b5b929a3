use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::db::models::JobRow;
use crate::db::HistoryStore;
use crate::error::{Result, StoreError};
use crate::types::{HistoryRecord, Job, JobId};

/// Local store for batch runs. Same schema shape as the hosted tables.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // Every connection to `:memory:` is its own database.
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database ready at {url}");
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl HistoryStore for SqliteStore {
    async fn select_latest_job(&self) -> std::result::Result<Option<Job>, StoreError> {
        let row: Option<JobRow> = sqlx::query_as(
            r#"
            SELECT id, url, amenities, adults, min_bedrooms, price_max,
                   weekly_offset, nights, scrape_url, qtd
            FROM jobs
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::new("select_latest_job", e))?;

        row.map(Job::try_from).transpose()
    }

    async fn delete_history(&self, job: &JobId) -> std::result::Result<(), StoreError> {
        sqlx::query("DELETE FROM history WHERE job = ?")
            .bind(job.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::new("delete_history", e))?;
        Ok(())
    }

    async fn insert_history(&self, records: &[HistoryRecord]) -> std::result::Result<(), StoreError> {
        const OP: &str = "insert_history";
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::new(OP, e))?;
        for r in records {
            sqlx::query(
                r#"
                INSERT INTO history (job, room_id, price, position, available, checkin, checkout, scrap_url)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(r.job.to_string())
            .bind(column_text(&r.room))
            .bind(column_text(&r.price))
            .bind(column_text(&r.position))
            .bind(column_text(&r.available))
            .bind(r.checkin.format("%Y-%m-%d").to_string())
            .bind(r.checkout.format("%Y-%m-%d").to_string())
            .bind(&r.source_url)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::new(OP, e))?;
        }
        tx.commit().await.map_err(|e| StoreError::new(OP, e))?;
        Ok(())
    }

    async fn count_history(&self, job: &JobId) -> std::result::Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM history WHERE job = ?")
            .bind(job.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::new("count_history", e))
    }

    async fn update_job_count(&self, job: &JobId, qtd: i64) -> std::result::Result<(), StoreError> {
        sqlx::query("UPDATE jobs SET qtd = ? WHERE id = ?")
            .bind(qtd)
            .bind(job.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::new("update_job", e))?;
        Ok(())
    }
}

/// Scraped attributes are stored as reported. Column affinity turns numeric text back into
/// numbers; anything else stays text.
fn column_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(u8::from(*b).to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::Scalar;
    use chrono::NaiveDate;
    use serde_json::json;

    pub(crate) async fn memory_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    pub(crate) async fn seed_job(store: &SqliteStore, id: &str, created_at: i64) {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, url, amenities, adults, min_bedrooms, price_max,
                              weekly_offset, nights, scrape_url, created_at)
            VALUES (?, 'https://x/s?q=1', '["wifi", 4]', 2, 1, NULL, 3, 2, 'http://scraper', ?)
            "#,
        )
        .bind(id)
        .bind(created_at)
        .execute(store.pool())
        .await
        .unwrap();
    }

    fn record(job: &JobId, room: i64) -> HistoryRecord {
        HistoryRecord {
            job: job.clone(),
            room: json!(room),
            price: json!("$80"),
            position: json!(room),
            available: json!(true),
            checkin: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            checkout: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            source_url: "https://q".to_string(),
        }
    }

    #[tokio::test]
    async fn selects_most_recent_job() {
        let store = memory_store().await;
        assert!(store.select_latest_job().await.unwrap().is_none());

        seed_job(&store, "1", 100).await;
        seed_job(&store, "b7c1", 200).await;

        let job = store.select_latest_job().await.unwrap().unwrap();
        assert_eq!(job.id, JobId::Text("b7c1".to_string()));
        assert_eq!(job.amenities, vec![Scalar::from("wifi"), Scalar::Int(4)]);
        assert_eq!(job.days, 3);
        assert_eq!(job.nights, 2);
    }

    #[tokio::test]
    async fn history_operations_are_scoped_by_job() {
        let store = memory_store().await;
        let a = JobId::Int(1);
        let b = JobId::Int(2);

        store.insert_history(&[record(&a, 1), record(&a, 2)]).await.unwrap();
        store.insert_history(&[record(&b, 3)]).await.unwrap();
        assert_eq!(store.count_history(&a).await.unwrap(), 2);
        assert_eq!(store.count_history(&b).await.unwrap(), 1);

        store.delete_history(&a).await.unwrap();
        assert_eq!(store.count_history(&a).await.unwrap(), 0);
        assert_eq!(store.count_history(&b).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_job_count_writes_qtd() {
        let store = memory_store().await;
        seed_job(&store, "5", 1).await;

        store.update_job_count(&JobId::Int(5), 42).await.unwrap();
        let job = store.select_latest_job().await.unwrap().unwrap();
        assert_eq!(job.qtd, Some(42));
    }

    #[tokio::test]
    async fn stores_loosely_typed_attributes() {
        let store = memory_store().await;
        let job = JobId::Int(9);
        let mut odd = record(&job, 1);
        odd.room = Value::Null;
        odd.position = json!("7");
        odd.available = json!("yes");
        odd.price = json!(99.5);
        store.insert_history(&[odd, record(&job, 2)]).await.unwrap();

        let rows: Vec<(Option<String>, Option<String>, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT room_id, price, CAST(position AS TEXT), CAST(available AS TEXT) FROM history ORDER BY id",
        )
        .fetch_all(store.pool())
        .await
        .unwrap();
        assert_eq!(
            rows[0],
            (None, Some("99.5".into()), Some("7".into()), Some("yes".into()))
        );
        assert_eq!(
            rows[1],
            (Some("2".into()), Some("$80".into()), Some("2".into()), Some("1".into()))
        );
    }
}
