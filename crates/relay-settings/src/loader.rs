//! Builds [`RelaySettings`] from defaults, an optional JSON file, and `RELAY_*`
//! environment variables.
//!
//! When the file is merged over the defaults, nested objects combine key by
//! key, any other value in the file wins outright, and `null` leaves the
//! default untouched.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::RelaySettings;

/// Resolve the default settings path (`~/.inquiry-relay/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".inquiry-relay").join("settings.json")
}

/// Settings from `~/.inquiry-relay/settings.json` plus environment overrides.
pub fn load_settings() -> Result<RelaySettings> {
    load_settings_from_path(&settings_path())
}

/// Settings from `path` plus environment overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let defaults = serde_json::to_value(RelaySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "Reading relay settings");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "No settings file, using defaults");
        defaults
    };

    let mut settings: RelaySettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Merge `source` over `target`, recursing into objects.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `RELAY_*` environment overrides.
pub fn apply_env_overrides(settings: &mut RelaySettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source. Invalid values are
/// logged and ignored.
pub fn apply_overrides_from<F>(settings: &mut RelaySettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let string = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    let number = |name: &str, min: u64, max: u64| {
        let val = string(name)?;
        let parsed = parse_u64_range(&val, min, max);
        if parsed.is_none() {
            warn!(key = name, value = %val, "invalid numeric env var, ignoring");
        }
        parsed
    };

    if let Some(v) = string("RELAY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = number("RELAY_PORT", 1, u16::MAX as u64) {
        settings.server.port = v as u16;
    }
    if let Some(v) = number("RELAY_KEEP_ALIVE_SECS", 1, 3_600) {
        settings.server.keep_alive_secs = v;
    }
    if let Some(v) = string("RELAY_CORS_ORIGINS") {
        settings.server.cors_origins = parse_list(&v);
    }
    if let Some(v) = string("RELAY_EXTERNAL_BASE_URL") {
        settings.external.base_url = v;
    }
    if let Some(v) = string("RELAY_START_PATH") {
        settings.external.start_path = v;
    }
    if let Some(v) = string("RELAY_STATUS_PATH") {
        settings.external.status_path = v;
    }
    if let Some(v) = number("RELAY_REQUEST_TIMEOUT_MS", 100, 600_000) {
        settings.external.request_timeout_ms = v;
    }
    if let Some(v) = string("RELAY_POLLING_INTERVALS") {
        settings.polling.intervals = v;
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Split a comma-separated list, dropping blanks.
pub fn parse_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8080, "host": "localhost"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1});
        let source = serde_json::json!({"a": null});
        assert_eq!(deep_merge(target, source)["a"], 1);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_settings_from_path(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.external.start_path, "/posts");
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"polling": {"intervals": "1,2,3"}, "external": {"baseUrl": "http://inquiry.local"}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.polling.intervals, "1,2,3");
        assert_eq!(settings.external.base_url, "http://inquiry.local");
        assert_eq!(settings.external.status_path, "/todos/{attempt}");
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn env_overrides_apply() {
        let env = vars(&[
            ("RELAY_PORT", "9191"),
            ("RELAY_POLLING_INTERVALS", "2,4"),
            ("RELAY_CORS_ORIGINS", "http://a.test, ,http://b.test"),
            ("RELAY_STATUS_PATH", "/status/{trackingId}"),
        ]);
        let mut settings = RelaySettings::default();
        apply_overrides_from(&mut settings, |k| env.get(k).cloned());

        assert_eq!(settings.server.port, 9191);
        assert_eq!(settings.polling.intervals, "2,4");
        assert_eq!(settings.server.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(settings.external.status_path, "/status/{trackingId}");
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let env = vars(&[
            ("RELAY_PORT", "99999"),
            ("RELAY_REQUEST_TIMEOUT_MS", "abc"),
            ("RELAY_HOST", "  "),
        ]);
        let mut settings = RelaySettings::default();
        apply_overrides_from(&mut settings, |k| env.get(k).cloned());

        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.external.request_timeout_ms, 30_000);
        assert_eq!(settings.server.host, "0.0.0.0");
    }

    #[test]
    fn parse_u64_range_bounds() {
        assert_eq!(parse_u64_range("10", 1, 10), Some(10));
        assert_eq!(parse_u64_range("0", 1, 10), None);
        assert_eq!(parse_u64_range(" 5 ", 1, 10), Some(5));
    }
}
