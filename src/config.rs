use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetch::Settings;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000/api";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub server: ServerConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub fetch: FetchConfig,
  /// Custom title for header (defaults to "fabdesk" if not set)
  pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_server_url")]
  pub url: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      url: default_server_url(),
    }
  }
}

fn default_server_url() -> String {
  DEFAULT_SERVER_URL.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// How long fetched data is served from memory
  #[serde(default = "default_ttl_secs")]
  pub ttl_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_secs: default_ttl_secs(),
    }
  }
}

fn default_ttl_secs() -> u64 {
  crate::fetch::DEFAULT_TTL.as_secs()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchConfig {
  /// Timeout for every fetch, 0 disables it
  #[serde(default)]
  pub timeout_secs: u64,
  /// Per-kind overrides, e.g. `sensor-data: 120`
  #[serde(default)]
  pub timeouts: BTreeMap<String, u64>,
}

impl FetchConfig {
  pub fn default_timeout(&self) -> Option<Duration> {
    secs(self.timeout_secs)
  }

  /// The override for `kind`, if one is configured and non-zero.
  pub fn timeout_for(&self, kind: &str) -> Option<Duration> {
    self.timeouts.get(kind).copied().and_then(secs)
  }
}

fn secs(value: u64) -> Option<Duration> {
  (value > 0).then(|| Duration::from_secs(value))
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./fabdesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/fabdesk/config.yaml
  ///
  /// Without any file the defaults apply.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("fabdesk.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("fabdesk").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file deserializes to null
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Coordinator settings derived from the cache and fetch sections.
  pub fn coordinator_settings(&self) -> Settings {
    Settings::default()
      .with_ttl(Duration::from_secs(self.cache.ttl_secs))
      .with_default_timeout(self.fetch.default_timeout())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.server.url, DEFAULT_SERVER_URL);
    assert_eq!(config.cache.ttl_secs, 30);
    assert_eq!(config.fetch.default_timeout(), None);
    assert!(config.title.is_none());
  }

  #[test]
  fn test_full_config() {
    let config = Config::parse(
      r#"
title: Line 3
server:
  url: http://factory.local:8000/api
cache:
  ttl_secs: 5
fetch:
  timeout_secs: 20
  timeouts:
    sensor-data: 120
    tools: 0
"#,
    )
    .unwrap();

    assert_eq!(config.title.as_deref(), Some("Line 3"));
    assert_eq!(config.server.url, "http://factory.local:8000/api");
    let settings = config.coordinator_settings();
    assert_eq!(settings.ttl, Duration::from_secs(5));
    assert_eq!(settings.default_timeout, Some(Duration::from_secs(20)));
    assert_eq!(config.fetch.timeout_for("sensor-data"), Some(Duration::from_secs(120)));
    assert_eq!(config.fetch.timeout_for("tools"), None);
    assert_eq!(config.fetch.timeout_for("users"), None);
  }

  #[test]
  fn test_partial_sections_keep_defaults() {
    let config = Config::parse("server: {}\ncache: {}\n").unwrap();
    assert_eq!(config.server.url, DEFAULT_SERVER_URL);
    assert_eq!(config.cache.ttl_secs, 30);
  }

  #[test]
  fn test_rejects_malformed_config() {
    assert!(Config::parse("cache:\n  ttl_secs: soon\n").is_err());
  }

  #[test]
  fn test_missing_explicit_file() {
    let err = Config::load(Some(Path::new("/nonexistent/fabdesk.yaml"))).unwrap_err();
    assert!(err.to_string().contains("not found"));
  }
}
