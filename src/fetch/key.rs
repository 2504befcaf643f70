//! Keys for the fetch cache and the in-flight registry.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies one cacheable result: a data kind refined by its parameters.
///
/// Two keys are equal when their kinds match and their parameters normalize
/// to the same canonical JSON. Object keys are sorted during normalization,
/// and `None` and JSON `null` are the same thing.
#[derive(Debug, Clone)]
pub struct FetchKey {
  kind: String,
  params: Option<Value>,
  normalized: Option<String>,
}

impl FetchKey {
  /// Key for a kind without parameters.
  pub fn new(kind: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      params: None,
      normalized: None,
    }
  }

  /// Key for a kind refined by query parameters.
  pub fn with_params(kind: impl Into<String>, params: Option<Value>) -> Self {
    let params = params.filter(|p| !p.is_null());
    let normalized = params.as_ref().map(canonical_json);
    Self {
      kind: kind.into(),
      params,
      normalized,
    }
  }

  pub fn kind(&self) -> &str {
    &self.kind
  }

  pub fn params(&self) -> Option<&Value> {
    self.params.as_ref()
  }

  /// SHA256 of the normalized key, for stable fixed-length identifiers.
  pub fn cache_hash(&self) -> String {
    let input = match &self.normalized {
      Some(params) => format!("{}:{}", self.kind, params),
      None => self.kind.clone(),
    };

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }
}

impl PartialEq for FetchKey {
  fn eq(&self, other: &Self) -> bool {
    self.kind == other.kind && self.normalized == other.normalized
  }
}

impl Eq for FetchKey {}

impl Hash for FetchKey {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.kind.hash(state);
    self.normalized.hash(state);
  }
}

impl fmt::Display for FetchKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.normalized {
      Some(_) => write!(f, "{}[{}]", self.kind, &self.cache_hash()[..8]),
      None => f.write_str(&self.kind),
    }
  }
}

impl From<&str> for FetchKey {
  fn from(kind: &str) -> Self {
    Self::new(kind)
  }
}

impl From<String> for FetchKey {
  fn from(kind: String) -> Self {
    Self::new(kind)
  }
}

/// Serialize a JSON value with object keys in sorted order.
///
/// `serde_json::Map` is a `BTreeMap` unless the `preserve_order` feature is on;
/// `test_nested_objects_are_normalized` fails if a dependency turns it on.
fn canonical_json(value: &Value) -> String {
  value.to_string()
}
