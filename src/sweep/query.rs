use std::fmt::Write;

use crate::types::{DateWindow, Job};

/// Build the search URL for one window.
///
/// The scrape endpoint replays this URL verbatim, so parameter order and the duplicated
/// `selected_filter_order[]` markers must stay exactly as below.
pub fn build_query_url(job: &Job, window: &DateWindow) -> String {
    let mut url = job.url_template.clone();

    for code in &job.amenities {
        let _ = write!(url, "&selected_filter_order%5B%5D=amenities%3A{code}");
    }
    for code in &job.amenities {
        let _ = write!(url, "&amenities%5B%5D={code}");
    }
    let _ = write!(
        url,
        "&adults={}&min_bedrooms={}&selected_filter_order%5B%5D=min_bedrooms%3A{}",
        job.adults, job.min_bedrooms, job.min_bedrooms,
    );
    let _ = write!(
        url,
        "&checkin={}&checkout={}",
        window.checkin.format("%Y-%m-%d"),
        window.checkout.format("%Y-%m-%d"),
    );
    if let Some(price_max) = job.price_max {
        let _ = write!(url, "&price_max={price_max}");
    }

    url
}
