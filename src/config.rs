use crate::error::{AppError, Result};

/// Pages fetched concurrently per date window when PAGE_FAN_OUT is unset.
pub const DEFAULT_PAGE_FAN_OUT: u32 = 4;

/// Per-request timeout for scrape calls (seconds).
pub const DEFAULT_SCRAPE_TIMEOUT_SECS: u64 = 120;

/// Timeout for store REST calls (seconds).
pub const STORE_HTTP_TIMEOUT_SECS: u64 = 30;

/// Reconnect backoff: first delay, doubled per consecutive failure, capped.
pub const BACKOFF_BASE_MS: u64 = 1_000;
pub const BACKOFF_CAP_MS: u64 = 30_000;

/// How long to wait for the join reply before treating the attempt as timed out (seconds).
pub const SUBSCRIBE_TIMEOUT_SECS: u64 = 10;

/// Phoenix heartbeat interval (seconds). The server drops sockets silent for ~60s.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 25;

/// Table the change feed listens on.
pub const JOBS_TABLE: &str = "jobs";
pub const HISTORY_TABLE: &str = "history";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Keep a realtime subscription open and process every new job.
    Live,
    /// Process the latest job once, then exit.
    Batch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// PostgREST-style collection API plus realtime websocket.
    Rest { base_url: String, key: String },
    /// Local SQLite file (batch mode only; no change feed).
    Sqlite { url: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreBackend,
    pub run_mode: RunMode,
    pub log_level: String,
    /// Pages fetched per window (PAGE_FAN_OUT)
    pub page_fan_out: u32,
    /// Scrape request timeout in seconds (SCRAPE_TIMEOUT_SECS)
    pub scrape_timeout_secs: u64,
    /// Websocket endpoint of the change feed. Derived from STORE_URL unless REALTIME_URL is set.
    pub realtime_url: Option<String>,
    pub api_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source so parsing is testable.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let store_url = get("STORE_URL")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::Config("STORE_URL must be set".to_string()))?;

        let store = if store_url.starts_with("sqlite:") {
            StoreBackend::Sqlite { url: store_url }
        } else {
            let key = get("STORE_KEY")
                .filter(|s| !s.is_empty())
                .ok_or_else(|| AppError::Config("STORE_KEY must be set for a REST store".to_string()))?;
            StoreBackend::Rest {
                base_url: store_url.trim_end_matches('/').to_string(),
                key,
            }
        };

        let run_mode = match get("RUN_MODE").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("live") => RunMode::Live,
            Some("batch") => RunMode::Batch,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "RUN_MODE must be 'live' or 'batch', got '{other}'"
                )))
            }
        };

        let page_fan_out = match get("PAGE_FAN_OUT") {
            Some(v) => v
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| AppError::Config("PAGE_FAN_OUT must be a positive integer".to_string()))?,
            None => DEFAULT_PAGE_FAN_OUT,
        };

        let scrape_timeout_secs = match get("SCRAPE_TIMEOUT_SECS") {
            Some(v) => v.parse::<u64>().ok().filter(|n| *n > 0).ok_or_else(|| {
                AppError::Config("SCRAPE_TIMEOUT_SECS must be a positive integer".to_string())
            })?,
            None => DEFAULT_SCRAPE_TIMEOUT_SECS,
        };

        let realtime_url = match (get("REALTIME_URL"), &store) {
            (Some(url), _) => Some(url),
            (None, StoreBackend::Rest { base_url, key }) => Some(derive_realtime_url(base_url, key)),
            (None, StoreBackend::Sqlite { .. }) => None,
        };

        if run_mode == RunMode::Live && realtime_url.is_none() {
            return Err(AppError::Config(
                "live mode needs a REST store with a change feed".to_string(),
            ));
        }

        Ok(Self {
            store,
            run_mode,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            page_fan_out,
            scrape_timeout_secs,
            realtime_url,
            api_port: get("API_PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
        })
    }
}

/// `https://x.example.co` → `wss://x.example.co/realtime/v1/websocket?apikey=..&vsn=1.0.0`
fn derive_realtime_url(base_url: &str, key: &str) -> String {
    let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base_url.to_string()
    };
    format!("{ws_base}/realtime/v1/websocket?apikey={key}&vsn=1.0.0")
}
