use crate::types::{DateWindow, HistoryRecord, JobId, RawEntry};

/// Tag a page's raw entries with the job, window and URL that produced them.
pub fn map_entries(
    entries: Vec<RawEntry>,
    job: &JobId,
    window: &DateWindow,
    query_url: &str,
) -> Vec<HistoryRecord> {
    entries
        .into_iter()
        .map(|e| HistoryRecord {
            job: job.clone(),
            room: e.room_id,
            price: e.price,
            position: e.position,
            available: e.available,
            checkin: window.checkin,
            checkout: window.checkout,
            source_url: query_url.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    fn window() -> DateWindow {
        DateWindow {
            checkin: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            checkout: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        }
    }

    #[test]
    fn empty_page_maps_to_nothing() {
        assert!(map_entries(Vec::new(), &JobId::Int(1), &window(), "q").is_empty());
    }

    #[test]
    fn passes_fields_through() {
        let entries = vec![RawEntry {
            room_id: json!(991),
            price: json!(120.5),
            position: json!("4"),
            available: Value::Null,
        }];
        let records = map_entries(entries, &JobId::Text("j".into()), &window(), "https://q");
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.job, JobId::Text("j".into()));
        assert_eq!(r.room, json!(991));
        assert_eq!(r.price, json!(120.5));
        assert_eq!(r.position, json!("4"));
        assert_eq!(r.available, Value::Null);
        assert_eq!(r.checkin, window().checkin);
        assert_eq!(r.checkout, window().checkout);
        assert_eq!(r.source_url, "https://q");
    }
}
