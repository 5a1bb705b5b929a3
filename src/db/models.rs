//! Row types for the local SQLite schema in `migrations/`.
//! Ids are stored as TEXT so both integer and uuid job keys fit.

use crate::error::StoreError;
use crate::types::{Job, JobId, Scalar};

#[derive(Debug, sqlx::FromRow)]
pub struct JobRow {
    pub id: String,
    pub url: String,
    pub amenities: String,
    pub adults: i64,
    pub min_bedrooms: i64,
    pub price_max: Option<i64>,
    pub weekly_offset: i64,
    pub nights: i64,
    pub scrape_url: String,
    pub qtd: Option<i64>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        const OP: &str = "select_latest_job";
        let amenities: Vec<Scalar> =
            serde_json::from_str(&row.amenities).map_err(|e| StoreError::new(OP, e))?;
        let count = |field: &str, v: i64| {
            u32::try_from(v).map_err(|_| StoreError::new(OP, format!("{field} out of range: {v}")))
        };

        Ok(Job {
            id: parse_job_id(&row.id),
            url_template: row.url,
            amenities,
            adults: count("adults", row.adults)?,
            min_bedrooms: count("min_bedrooms", row.min_bedrooms)?,
            price_max: row.price_max.map(|p| count("price_max", p)).transpose()?,
            days: count("weekly_offset", row.weekly_offset)?,
            nights: count("nights", row.nights)?,
            scrape_url: row.scrape_url,
            qtd: row.qtd,
        })
    }
}

fn parse_job_id(raw: &str) -> JobId {
    raw.parse::<i64>()
        .map(JobId::Int)
        .unwrap_or_else(|_| JobId::Text(raw.to_string()))
}
