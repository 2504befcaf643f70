//! Mapping from data kinds to the functions that fetch them.

use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// A boxed future that returns the fetched value
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// A factory function that creates futures for fetching data.
///
/// Receives the request parameters, if any.
pub type FetchFn<T> = Arc<dyn Fn(Option<Value>) -> BoxFuture<T> + Send + Sync>;

/// A registered fetch function and its per-kind settings.
pub struct Registration<T> {
  pub(crate) fetcher: FetchFn<T>,
  pub(crate) timeout: Option<Duration>,
}

impl<T> Clone for Registration<T> {
  fn clone(&self) -> Self {
    Self {
      fetcher: Arc::clone(&self.fetcher),
      timeout: self.timeout,
    }
  }
}

/// Static registry of fetchable kinds.
///
/// Built once at startup and handed to the coordinator, which stays agnostic
/// of what a kind actually fetches (REST calls, file reads, ...).
pub struct FetchRegistry<T> {
  entries: HashMap<String, Registration<T>>,
}

impl<T: Send + 'static> FetchRegistry<T> {
  pub fn new() -> Self {
    Self {
      entries: HashMap::new(),
    }
  }

  /// Register an async fetch function for `kind`.
  ///
  /// Registering the same kind twice replaces the earlier function.
  pub fn register<F, Fut>(mut self, kind: impl Into<String>, fetcher: F) -> Self
  where
    F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    self.entries.insert(
      kind.into(),
      Registration {
        fetcher: Arc::new(move |params| Box::pin(fetcher(params))),
        timeout: None,
      },
    );
    self
  }

  /// Register a blocking fetch function for `kind`.
  ///
  /// The function runs on tokio's blocking pool so it never stalls the
  /// async workers or the UI thread.
  #[allow(dead_code)]
  pub fn register_blocking<F>(self, kind: impl Into<String>, fetcher: F) -> Self
  where
    F: Fn(Option<Value>) -> Result<T> + Send + Sync + 'static,
  {
    let fetcher = Arc::new(fetcher);
    self.register(kind, move |params| {
      let fetcher = Arc::clone(&fetcher);
      async move {
        tokio::task::spawn_blocking(move || fetcher(params))
          .await
          .map_err(|e| eyre!("Blocking fetch did not complete: {}", e))?
      }
    })
  }

  /// Fail fetches for `kind` that run longer than `timeout`.
  ///
  /// Has no effect if `kind` is not registered.
  pub fn with_timeout(mut self, kind: &str, timeout: Duration) -> Self {
    if let Some(entry) = self.entries.get_mut(kind) {
      entry.timeout = Some(timeout);
    }
    self
  }

  pub(crate) fn resolve(&self, kind: &str) -> Option<&Registration<T>> {
    self.entries.get(kind)
  }

  pub fn contains(&self, kind: &str) -> bool {
    self.entries.contains_key(kind)
  }

  /// Registered kinds, sorted.
  pub fn kinds(&self) -> Vec<&str> {
    let mut kinds: Vec<&str> = self.entries.keys().map(String::as_str).collect();
    kinds.sort_unstable();
    kinds
  }
}

impl<T: Send + 'static> Default for FetchRegistry<T> {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_register_and_resolve() {
    let registry = FetchRegistry::new()
      .register("tools", |_| async { Ok::<_, color_eyre::Report>(1) })
      .register_blocking("users", |_| Ok(2));

    assert!(registry.contains("tools"));
    assert!(!registry.contains("nonexistent"));
    assert_eq!(registry.kinds(), vec!["tools", "users"]);

    let tools = registry.resolve("tools").map(|r| (r.fetcher)(None));
    assert_eq!(tools.expect("tools registered").await.ok(), Some(1));

    let users = registry.resolve("users").map(|r| (r.fetcher)(None));
    assert_eq!(users.expect("users registered").await.ok(), Some(2));
  }

  #[tokio::test]
  async fn test_blocking_fetch_receives_params() {
    let registry = FetchRegistry::new().register_blocking("sensor-data", |params| {
      Ok(params.map(|p| p["task"].clone()).unwrap_or(Value::Null))
    });

    let future = registry
      .resolve("sensor-data")
      .map(|r| (r.fetcher)(Some(serde_json::json!({"task": 7}))));
    assert_eq!(future.expect("registered").await.ok(), Some(serde_json::json!(7)));
  }

  #[test]
  fn test_with_timeout_only_applies_to_registered_kinds() {
    let registry = FetchRegistry::new()
      .register("tools", |_| async { Ok::<_, color_eyre::Report>(()) })
      .with_timeout("tools", Duration::from_secs(5))
      .with_timeout("missing", Duration::from_secs(1));

    assert_eq!(
      registry.resolve("tools").and_then(|r| r.timeout),
      Some(Duration::from_secs(5))
    );
    assert!(registry.resolve("missing").is_none());
  }
}
