use futures_util::future::join_all;

use crate::scrape::fetcher::PageFetch;
use crate::types::PageOutcome;

/// Fetch pages `0..page_count` of one search URL concurrently.
///
/// Resolves once every page has settled. The result holds one outcome per page, indexed by
/// page number regardless of completion order; a failed page never cancels its siblings.
pub async fn scrape_window(
    fetcher: &dyn PageFetch,
    scrape_url: &str,
    query_url: &str,
    page_count: u32,
) -> Vec<PageOutcome> {
    let requests = (0..page_count).map(|page| async move {
        PageOutcome {
            page,
            result: fetcher.fetch(scrape_url, query_url, page).await,
        }
    });
    join_all(requests).await
}
