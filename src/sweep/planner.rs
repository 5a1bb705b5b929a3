use chrono::{Days, NaiveDate};

use crate::types::DateWindow;

/// Expand a job's sweep parameters into its stay windows.
/// Window `i` checks in on `today + 1 + i` and checks out `nights` later.
pub fn plan(today: NaiveDate, days: u32, nights: u32) -> Vec<DateWindow> {
    (0..days)
        .filter_map(|offset| {
            let checkin = today.checked_add_days(Days::new(1 + u64::from(offset)))?;
            let checkout = checkin.checked_add_days(Days::new(u64::from(nights)))?;
            Some(DateWindow { checkin, checkout })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn produces_one_window_per_day() {
        let today = d(2024, 5, 31);
        for days in [0u32, 1, 7, 30] {
            assert_eq!(plan(today, days, 3).len(), days as usize);
        }
    }

    #[test]
    fn windows_start_tomorrow_and_span_nights() {
        let today = d(2024, 5, 31);
        let windows = plan(today, 3, 7);
        assert_eq!(windows[0], DateWindow { checkin: d(2024, 6, 1), checkout: d(2024, 6, 8) });
        for (i, w) in windows.iter().enumerate() {
            assert_eq!(w.checkin, today + Days::new(1 + i as u64));
            assert_eq!(w.checkout, w.checkin + Days::new(7));
            assert!(w.checkin > today);
        }
    }

    #[test]
    fn crosses_year_boundary() {
        let windows = plan(d(2024, 12, 30), 3, 1);
        assert_eq!(windows[2].checkin, d(2025, 1, 2));
        assert_eq!(windows[2].checkout, d(2025, 1, 3));
    }

    #[test]
    fn zero_nights_is_degenerate_but_allowed() {
        let windows = plan(d(2024, 1, 1), 2, 0);
        assert!(windows.iter().all(|w| w.checkin == w.checkout));
    }
}
