//! Rewrite configuration loader.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "cdn_rewrite.config.json";

/// Settings shared by the rewriter, the prober and the replacement map persistence.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
  /// CDN base URL, a full origin such as `http://static.example.com`.
  pub cdn_service_url: String,
  /// Lifetime of the persisted replacement map, in seconds.
  pub replacement_map_expiry_secs: u64,
  /// Key the replacement map is stored under in the external store.
  pub cache_key: String,
  /// Connect timeout for a single CDN probe, in seconds.
  pub connect_timeout_secs: u64,
  /// Read timeout while waiting for the probe status line, in seconds.
  pub read_timeout_secs: u64,
  /// Maximum number of response bytes inspected by a probe.
  pub probe_read_limit: usize,
}

impl Default for RewriteConfig {
  fn default() -> Self {
    Self {
      cdn_service_url: "http://static.example.com".into(),
      replacement_map_expiry_secs: 86_400,
      cache_key: "cdn_rewrite.replacement_map".into(),
      connect_timeout_secs: 30,
      read_timeout_secs: 30,
      probe_read_limit: 256,
    }
  }
}

impl RewriteConfig {
  /// Attempt to load configuration from the provided directory.
  ///
  /// A missing or unparseable file falls back to the defaults.
  pub fn discover(dir: &Path) -> Self {
    let candidate = dir.join(DEFAULT_CONFIG_FILE);
    Self::from_path(&candidate).unwrap_or_default()
  }

  /// Read configuration from a specific JSON file.
  pub fn from_path(path: &Path) -> Option<Self> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
  }

  /// Replacement map time-to-live.
  pub fn replacement_map_ttl(&self) -> Duration {
    Duration::from_secs(self.replacement_map_expiry_secs)
  }

  /// Probe connect timeout.
  pub fn connect_timeout(&self) -> Duration {
    Duration::from_secs(self.connect_timeout_secs)
  }

  /// Probe read timeout.
  pub fn read_timeout(&self) -> Duration {
    Duration::from_secs(self.read_timeout_secs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn defaults_match_one_day_ttl_and_thirty_second_connect() {
    let config = RewriteConfig::default();
    assert_eq!(config.replacement_map_ttl(), Duration::from_secs(86_400));
    assert_eq!(config.connect_timeout(), Duration::from_secs(30));
  }

  #[test]
  fn discover_falls_back_to_defaults_when_missing() {
    let dir = tempdir().unwrap();
    let config = RewriteConfig::discover(dir.path());
    assert_eq!(config.cdn_service_url, "http://static.example.com");
  }

  #[test]
  fn discover_reads_partial_configuration() {
    let dir = tempdir().unwrap();
    fs::write(
      dir.path().join(DEFAULT_CONFIG_FILE),
      r#"{"cdn_service_url": "http://cdn.example.org", "replacement_map_expiry_secs": 60}"#,
    )
    .unwrap();

    let config = RewriteConfig::discover(dir.path());
    assert_eq!(config.cdn_service_url, "http://cdn.example.org");
    assert_eq!(config.replacement_map_expiry_secs, 60);
    assert_eq!(config.cache_key, "cdn_rewrite.replacement_map");
  }

  #[test]
  fn discover_ignores_malformed_files() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "{not json").unwrap();

    let config = RewriteConfig::discover(dir.path());
    assert_eq!(config.connect_timeout_secs, 30);
  }
}
