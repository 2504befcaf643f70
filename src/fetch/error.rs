use std::time::Duration;
use thiserror::Error;

/// Why a fetch did not produce a value.
///
/// Cloneable because one failure is delivered to every waiter of a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  /// No fetch function is registered for the requested kind
  #[error("unknown kind: {0}")]
  UnknownKind(String),
  /// The fetch function returned an error or panicked
  #[error("{0}")]
  Failed(String),
  /// The fetch function did not finish within its deadline
  #[error("{kind} did not respond within {}s", .after.as_secs_f32())]
  Timeout { kind: String, after: Duration },
  /// The request was cancelled before it produced an outcome
  #[error("request was cancelled")]
  Cancelled,
}
