//! Single-use background execution of one fetch attempt.

use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

use super::error::FetchError;
use super::key::FetchKey;
use super::registry::{FetchFn, Registration};

/// Lifecycle of a worker. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  Created,
  Running,
  Succeeded,
  Failed,
  Cancelled,
}

impl WorkerState {
  fn from_u8(raw: u8) -> Self {
    match raw {
      0 => Self::Created,
      1 => Self::Running,
      2 => Self::Succeeded,
      3 => Self::Failed,
      _ => Self::Cancelled,
    }
  }

  fn as_u8(self) -> u8 {
    match self {
      Self::Created => 0,
      Self::Running => 1,
      Self::Succeeded => 2,
      Self::Failed => 3,
      Self::Cancelled => 4,
    }
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
  }
}

/// Terminal outcome of a worker, reported to its owner exactly once.
#[derive(Debug)]
pub enum Outcome<T> {
  Succeeded(T),
  Failed(FetchError),
  /// Cancelled before emission. Consumers hear nothing.
  Cancelled,
}

struct Shared {
  id: u64,
  key: FetchKey,
  cancelled: AtomicBool,
  state: AtomicU8,
}

/// Cheap, cloneable handle to a running worker.
#[derive(Clone)]
pub struct WorkerHandle {
  shared: Arc<Shared>,
}

impl WorkerHandle {
  pub fn id(&self) -> u64 {
    self.shared.id
  }

  pub fn key(&self) -> &FetchKey {
    &self.shared.key
  }

  /// Ask the worker not to emit. Checked before and after the fetch call
  /// and once more right before emission.
  pub fn cancel(&self) {
    if !self.shared.cancelled.swap(true, Ordering::SeqCst) {
      debug!(key = %self.shared.key, worker = self.shared.id, "worker cancelled");
    }
  }

  pub fn is_cancelled(&self) -> bool {
    self.shared.cancelled.load(Ordering::SeqCst)
  }

  pub fn state(&self) -> WorkerState {
    WorkerState::from_u8(self.shared.state.load(Ordering::SeqCst))
  }

  pub fn is_finished(&self) -> bool {
    self.state().is_terminal()
  }
}

impl std::fmt::Debug for WorkerHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WorkerHandle")
      .field("id", &self.shared.id)
      .field("key", &self.shared.key)
      .field("state", &self.state())
      .field("cancelled", &self.is_cancelled())
      .finish()
  }
}

/// One fetch attempt: the bound fetch function, its arguments and a
/// cancellation flag.
pub struct Worker<T> {
  shared: Arc<Shared>,
  fetcher: FetchFn<T>,
  params: Option<Value>,
  timeout: Option<Duration>,
}

impl<T: Send + 'static> Worker<T> {
  pub fn new(
    id: u64,
    key: FetchKey,
    registration: &Registration<T>,
    default_timeout: Option<Duration>,
  ) -> Self {
    let params = key.params().cloned();
    Self {
      shared: Arc::new(Shared {
        id,
        key,
        cancelled: AtomicBool::new(false),
        state: AtomicU8::new(WorkerState::Created.as_u8()),
      }),
      fetcher: Arc::clone(&registration.fetcher),
      params,
      timeout: registration.timeout.or(default_timeout),
    }
  }

  pub fn handle(&self) -> WorkerHandle {
    WorkerHandle {
      shared: Arc::clone(&self.shared),
    }
  }

  /// Spawn the fetch on `runtime`. `on_done` is called exactly once with the
  /// terminal outcome, from the runtime's thread.
  pub fn start<F>(self, runtime: &Handle, on_done: F) -> WorkerHandle
  where
    F: FnOnce(Outcome<T>) + Send + 'static,
  {
    let handle = self.handle();
    runtime.spawn(async move {
      let shared = Arc::clone(&self.shared);
      let outcome = self.run().await;
      let outcome = if shared.cancelled.load(Ordering::SeqCst) {
        Outcome::Cancelled
      } else {
        outcome
      };

      let state = match &outcome {
        Outcome::Succeeded(_) => WorkerState::Succeeded,
        Outcome::Failed(_) => WorkerState::Failed,
        Outcome::Cancelled => WorkerState::Cancelled,
      };
      shared.state.store(state.as_u8(), Ordering::SeqCst);
      debug!(key = %shared.key, worker = shared.id, ?state, "worker finished");

      on_done(outcome);
    });
    handle
  }

  async fn run(self) -> Outcome<T> {
    let shared = self.shared;
    if shared.cancelled.load(Ordering::SeqCst) {
      return Outcome::Cancelled;
    }
    shared
      .state
      .store(WorkerState::Running.as_u8(), Ordering::SeqCst);
    debug!(key = %shared.key, worker = shared.id, "worker started");

    let fetcher = self.fetcher;
    let params = self.params;
    // Building the future inside the block lets catch_unwind see panics
    // raised by the fetch function before its first await.
    let call = AssertUnwindSafe(async move { fetcher(params).await }).catch_unwind();

    let result = match self.timeout {
      Some(limit) => match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
          return Outcome::Failed(FetchError::Timeout {
            kind: shared.key.kind().to_string(),
            after: limit,
          })
        }
      },
      None => call.await,
    };

    if shared.cancelled.load(Ordering::SeqCst) {
      return Outcome::Cancelled;
    }

    match result {
      Ok(Ok(value)) => Outcome::Succeeded(value),
      Ok(Err(e)) => Outcome::Failed(FetchError::Failed(e.to_string())),
      Err(panic) => Outcome::Failed(FetchError::Failed(format!(
        "fetch for {} panicked: {}",
        shared.key,
        panic_message(panic.as_ref())
      ))),
    }
  }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fetch::registry::FetchRegistry;
  use color_eyre::{eyre::eyre, Report};
  use tokio::sync::oneshot;

  fn registration<T: Send + 'static>(registry: &FetchRegistry<T>, kind: &str) -> Registration<T> {
    registry.resolve(kind).cloned().expect("kind registered")
  }

  async fn run_to_end<T: Send + std::fmt::Debug + 'static>(worker: Worker<T>) -> Outcome<T> {
    let (tx, rx) = oneshot::channel();
    worker.start(&Handle::current(), move |outcome| {
      let _ = tx.send(outcome);
    });
    rx.await.expect("worker reports an outcome")
  }

  #[tokio::test]
  async fn test_success() {
    let registry = FetchRegistry::new().register("tools", |_| async { Ok::<_, Report>(vec![1, 2, 3]) });
    let worker = Worker::new(1, FetchKey::new("tools"), &registration(&registry, "tools"), None);
    let handle = worker.handle();
    assert_eq!(handle.state(), WorkerState::Created);

    match run_to_end(worker).await {
      Outcome::Succeeded(v) => assert_eq!(v, vec![1, 2, 3]),
      other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(handle.state(), WorkerState::Succeeded);
  }

  #[tokio::test]
  async fn test_error_becomes_failure() {
    let registry: FetchRegistry<i32> =
      FetchRegistry::new().register("tools", |_| async { Err(eyre!("connection refused")) });
    let worker = Worker::new(1, FetchKey::new("tools"), &registration(&registry, "tools"), None);
    let handle = worker.handle();

    match run_to_end(worker).await {
      Outcome::Failed(FetchError::Failed(msg)) => assert_eq!(msg, "connection refused"),
      other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(handle.state(), WorkerState::Failed);
  }

  #[tokio::test]
  async fn test_panic_becomes_failure() {
    let registry: FetchRegistry<i32> =
      FetchRegistry::new().register_blocking("tools", |_| panic!("driver crashed"));
    let worker = Worker::new(1, FetchKey::new("tools"), &registration(&registry, "tools"), None);

    assert!(matches!(
      run_to_end(worker).await,
      Outcome::Failed(FetchError::Failed(_))
    ));
  }

  #[tokio::test]
  async fn test_async_panic_becomes_failure() {
    let registry = FetchRegistry::new().register("tools", |_| async {
      let payload: Option<i32> = None;
      Ok::<_, Report>(payload.expect("bad payload"))
    });
    let worker = Worker::new(1, FetchKey::new("tools"), &registration(&registry, "tools"), None);

    match run_to_end(worker).await {
      Outcome::Failed(FetchError::Failed(msg)) => assert!(msg.contains("bad payload")),
      other => panic!("unexpected outcome: {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_cancel_before_start_skips_fetch() {
    let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let registry = FetchRegistry::new().register("tools", move |_| {
      counter.fetch_add(1, Ordering::SeqCst);
      async { Ok::<_, Report>(1) }
    });
    let worker = Worker::new(1, FetchKey::new("tools"), &registration(&registry, "tools"), None);
    worker.handle().cancel();

    assert!(matches!(run_to_end(worker).await, Outcome::Cancelled));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_cancel_while_running_suppresses_result() {
    let registry = FetchRegistry::new().register("tools", |_| async {
      tokio::time::sleep(Duration::from_millis(50)).await;
      Ok::<_, Report>(1)
    });
    let worker = Worker::new(1, FetchKey::new("tools"), &registration(&registry, "tools"), None);
    let handle = worker.handle();

    let (tx, rx) = oneshot::channel();
    worker.start(&Handle::current(), move |outcome| {
      let _ = tx.send(outcome);
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(handle.state(), WorkerState::Running);
    handle.cancel();

    assert!(matches!(rx.await, Ok(Outcome::Cancelled)));
    assert_eq!(handle.state(), WorkerState::Cancelled);
  }

  #[tokio::test]
  async fn test_timeout_fails_worker() {
    let registry = FetchRegistry::new()
      .register("tools", |_| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, Report>(1)
      })
      .with_timeout("tools", Duration::from_millis(20));
    let worker = Worker::new(1, FetchKey::new("tools"), &registration(&registry, "tools"), None);

    match run_to_end(worker).await {
      Outcome::Failed(FetchError::Timeout { kind, after }) => {
        assert_eq!(kind, "tools");
        assert_eq!(after, Duration::from_millis(20));
      }
      other => panic!("unexpected outcome: {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_default_timeout_applies_when_kind_has_none() {
    let registry = FetchRegistry::new().register("tools", |_| async {
      tokio::time::sleep(Duration::from_secs(5)).await;
      Ok::<_, Report>(1)
    });
    let worker = Worker::new(
      1,
      FetchKey::new("tools"),
      &registration(&registry, "tools"),
      Some(Duration::from_millis(20)),
    );

    assert!(matches!(
      run_to_end(worker).await,
      Outcome::Failed(FetchError::Timeout { .. })
    ));
  }
}
