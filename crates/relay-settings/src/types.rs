//! Settings types. All structs use camelCase on disk and fill missing keys
//! from their `Default`.

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    pub server: ServerSettings,
    pub external: ExternalApiSettings,
    pub polling: PollingSettings,
    pub logging: LoggingSettings,
}

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    pub port: u16,
    /// Interval between SSE keep-alive comments, in seconds.
    pub keep_alive_secs: u64,
    /// Browser origins allowed by CORS. Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            keep_alive_secs: 15,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
        }
    }
}

/// Location of the external inquiry API.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExternalApiSettings {
    pub base_url: String,
    /// Path the start request is POSTed to.
    pub start_path: String,
    /// Path polled for status. `{attempt}` and `{trackingId}` are substituted.
    pub status_path: String,
    /// Per-call timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for ExternalApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://jsonplaceholder.typicode.com".to_string(),
            start_path: "/posts".to_string(),
            status_path: "/todos/{attempt}".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

/// Poll loop settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollingSettings {
    /// Comma-separated delays in seconds, one per attempt.
    pub intervals: String,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            intervals: "5,10,20,30".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level (`trace`..`error`). `RUST_LOG` still wins.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
