//! Configuration module for the MUA client core.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;

/// Default number of items requested per list page.
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the REST API, without trailing slash
    pub api_base_url: String,
    /// WebSocket URL of the push channel (`http(s)` is mapped to `ws(s)`)
    pub socket_url: String,
    /// File standing in for browser local storage (`currentUser`, `token`)
    pub session_path: PathBuf,
    /// Items per page for paginated lists
    pub page_size: u32,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_base_url = env::var("MUA_API_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:5000/api".to_string())
            .trim_end_matches('/')
            .to_string();

        let socket_url =
            env::var("MUA_SOCKET_URL").unwrap_or_else(|_| "ws://localhost:5000/ws".to_string());

        let session_path = env::var("MUA_SESSION_PATH")
            .unwrap_or_else(|_| "./data/session.json".to_string())
            .into();

        let page_size = env::var("MUA_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);

        let log_level = env::var("MUA_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            api_base_url,
            socket_url,
            session_path,
            page_size,
            log_level,
        }
    }
}
