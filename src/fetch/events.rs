use super::error::FetchError;
use super::key::FetchKey;

/// Broadcast to every subscriber whenever a fetch settles or the cache
/// serves a value.
#[derive(Debug, Clone)]
pub enum DataEvent<T> {
  /// New data is available for `key`
  Updated { key: FetchKey, value: T },
  /// Fetching `key` failed
  Errored { key: FetchKey, error: FetchError },
}

impl<T> DataEvent<T> {
  pub fn key(&self) -> &FetchKey {
    match self {
      DataEvent::Updated { key, .. } | DataEvent::Errored { key, .. } => key,
    }
  }

  pub fn kind(&self) -> &str {
    self.key().kind()
  }
}
