pub mod fetcher;
pub mod window;

pub use fetcher::{HttpPageFetcher, PageFetch};
pub use window::scrape_window;
