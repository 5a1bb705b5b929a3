use chrono::NaiveDate;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::FetchError;

// ---------------------------------------------------------------------------
// Scalar values passed through from upstream JSON
// ---------------------------------------------------------------------------

/// A JSON scalar the store or scrape service may send as either a number or a string
/// (amenity codes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// Job primary key. Serial integer or uuid depending on how the table was created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobId {
    Int(i64),
    Text(String),
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobId::Int(i) => write!(f, "{i}"),
            JobId::Text(s) => write!(f, "{s}"),
        }
    }
}

/// One recurring collection task, as stored in the `jobs` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Base search URL without date parameters.
    #[serde(rename = "url")]
    pub url_template: String,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub amenities: Vec<Scalar>,
    #[serde(deserialize_with = "lenient_count")]
    pub adults: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub min_bedrooms: u32,
    #[serde(default, deserialize_with = "lenient_opt_count")]
    pub price_max: Option<u32>,
    /// Number of future days swept, one window per day.
    #[serde(rename = "weekly_offset", alias = "days", deserialize_with = "lenient_count")]
    pub days: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub nights: u32,
    pub scrape_url: String,
    #[serde(default)]
    pub qtd: Option<i64>,
}

fn empty_if_null<'de, D>(d: D) -> std::result::Result<Vec<Scalar>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Scalar>>::deserialize(d)?.unwrap_or_default())
}

/// Numeric columns may arrive as `2`, `2.0` or `"2"` depending on the column type.
fn count_from_value(v: &Value) -> Option<u32> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(|f| count_from_value(&Value::from(f))),
        _ => None,
    }
}

fn lenient_count<'de, D>(d: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    count_from_value(&v).ok_or_else(|| D::Error::custom(format!("expected a non-negative count, got {v}")))
}

fn lenient_opt_count<'de, D>(d: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        v => count_from_value(&v)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected a non-negative count, got {v}"))),
    }
}

// ---------------------------------------------------------------------------
// Per-run derived values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
}

/// One listing entry as returned by the scrape endpoint. Attributes are kept exactly as
/// reported; a missing field is `Null`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawEntry {
    #[serde(default)]
    pub room_id: Value,
    #[serde(default)]
    pub price: Value,
    #[serde(default)]
    pub position: Value,
    #[serde(default)]
    pub available: Value,
}

/// Body of a successful scrape response.
#[derive(Debug, Deserialize)]
pub struct ScrapeResponse {
    pub data: Vec<RawEntry>,
}

/// Result of fetching one page of one window.
#[derive(Debug)]
pub struct PageOutcome {
    pub page: u32,
    pub result: std::result::Result<Vec<RawEntry>, FetchError>,
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// A persisted listing observation. Serialized with the `history` table's column names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub job: JobId,
    #[serde(rename = "room_id")]
    pub room: Value,
    pub price: Value,
    pub position: Value,
    pub available: Value,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    #[serde(rename = "scrap_url")]
    pub source_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_decodes_store_row() {
        let raw = r#"{"id":7,"url":"https://www.airbnb.com/s/homes?query=x","amenities":[4,7],
            "adults":2,"min_bedrooms":1,"price_max":null,"weekly_offset":3,"nights":2,
            "scrape_url":"https://scraper.local/scrape","qtd":null,"created_at":"2024-01-01T00:00:00Z"}"#;
        let job: Job = serde_json::from_str(raw).unwrap();
        assert_eq!(job.id, JobId::Int(7));
        assert_eq!(job.amenities, vec![Scalar::Int(4), Scalar::Int(7)]);
        assert_eq!(job.days, 3);
        assert_eq!(job.price_max, None);
    }

    #[test]
    fn job_accepts_days_alias_and_null_amenities() {
        let raw = r#"{"id":"a1b2","url":"u","amenities":null,"adults":1,"min_bedrooms":0,
            "days":5,"nights":7,"scrape_url":"s","price_max":300}"#;
        let job: Job = serde_json::from_str(raw).unwrap();
        assert_eq!(job.id, JobId::Text("a1b2".to_string()));
        assert!(job.amenities.is_empty());
        assert_eq!(job.days, 5);
        assert_eq!(job.price_max, Some(300));
    }

    #[test]
    fn job_accepts_float_and_string_counts() {
        let raw = r#"{"id":3,"url":"u","amenities":[],"adults":"2","min_bedrooms":1.0,
            "weekly_offset":4,"nights":2,"scrape_url":"s","price_max":150.0}"#;
        let job: Job = serde_json::from_str(raw).unwrap();
        assert_eq!(job.adults, 2);
        assert_eq!(job.min_bedrooms, 1);
        assert_eq!(job.price_max, Some(150));

        let fractional = raw.replace("150.0", "150.5");
        assert!(serde_json::from_str::<Job>(&fractional).is_err());
        let negative = raw.replace("\"weekly_offset\":4", "\"weekly_offset\":-1");
        assert!(serde_json::from_str::<Job>(&negative).is_err());
    }

    #[test]
    fn raw_entry_keeps_whatever_the_scraper_sent() {
        let raw = r#"{"data":[
            {"room_id":1,"price":90,"position":"3","available":"true"},
            {"room_id":null,"position":3.0},
            {"room_id":"abc","available":false,"extra":[1,2]}
        ]}"#;
        let resp: ScrapeResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.data.len(), 3);
        assert_eq!(resp.data[0].position, Value::from("3"));
        assert_eq!(resp.data[0].available, Value::from("true"));
        assert_eq!(resp.data[1].room_id, Value::Null);
        assert_eq!(resp.data[1].price, Value::Null);
        assert_eq!(resp.data[2].available, Value::Bool(false));
    }

    #[test]
    fn history_record_uses_table_column_names() {
        let rec = HistoryRecord {
            job: JobId::Int(1),
            room: Value::from(42),
            price: Value::from("$120"),
            position: Value::from(3),
            available: Value::Bool(true),
            checkin: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            checkout: NaiveDate::from_ymd_opt(2024, 6, 8).unwrap(),
            source_url: "q".to_string(),
        };
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["room_id"], 42);
        assert_eq!(v["scrap_url"], "q");
        assert_eq!(v["checkin"], "2024-06-01");
        assert_eq!(v["price"], "$120");
    }
}
