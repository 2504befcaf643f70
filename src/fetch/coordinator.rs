//! The coordinator: short-lived cache, request coalescing and fan-out.

use std::collections::HashMap;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, warn};

use super::error::FetchError;
use super::events::DataEvent;
use super::key::FetchKey;
use super::registry::FetchRegistry;
use super::worker::{panic_message, Outcome, Worker, WorkerHandle};

/// How long a cached value is served without refetching.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

const EVENT_CAPACITY: usize = 64;

pub type SuccessFn<T> = Box<dyn FnOnce(T) + Send>;
pub type ErrorFn = Box<dyn FnOnce(FetchError) + Send>;

/// Process-wide coordinator settings.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
  /// Lifetime of a cache entry
  pub ttl: Duration,
  /// Deadline for kinds that did not register their own
  pub default_timeout: Option<Duration>,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      ttl: DEFAULT_TTL,
      default_timeout: None,
    }
  }
}

impl Settings {
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.default_timeout = timeout;
    self
  }
}

/// Someone waiting on the outcome of a fetch.
///
/// Consumed by value on delivery, so a waiter can be invoked at most once.
enum Waiter<T> {
  Callbacks {
    on_success: SuccessFn<T>,
    on_error: ErrorFn,
  },
  Ticket(oneshot::Sender<Result<T, FetchError>>),
}

impl<T> Waiter<T> {
  fn deliver(self, key: &FetchKey, result: Result<T, FetchError>) {
    match self {
      Waiter::Callbacks {
        on_success,
        on_error,
      } => {
        let delivered = panic::catch_unwind(AssertUnwindSafe(move || match result {
          Ok(value) => on_success(value),
          Err(e) => on_error(e),
        }));
        if let Err(payload) = delivered {
          error!(%key, "fetch callback panicked: {}", panic_message(payload.as_ref()));
        }
      }
      Waiter::Ticket(tx) => {
        // The receiver may have been dropped; nobody is listening then.
        let _ = tx.send(result);
      }
    }
  }
}

struct CacheEntry<T> {
  value: T,
  stored_at: Instant,
}

impl<T> CacheEntry<T> {
  fn is_fresh(&self, ttl: Duration) -> bool {
    self.stored_at.elapsed() < ttl
  }
}

struct InFlight<T> {
  worker: WorkerHandle,
  waiters: Vec<Waiter<T>>,
}

struct State<T> {
  cache: HashMap<FetchKey, CacheEntry<T>>,
  in_flight: HashMap<FetchKey, InFlight<T>>,
  next_worker_id: u64,
}

impl<T> State<T> {
  /// Remove the in-flight entry for `key` if it still belongs to `worker_id`.
  fn retire(&mut self, key: &FetchKey, worker_id: u64) -> Option<InFlight<T>> {
    match self.in_flight.get(key) {
      Some(request) if request.worker.id() == worker_id => self.in_flight.remove(key),
      _ => None,
    }
  }
}

struct Inner<T> {
  state: Mutex<State<T>>,
  registry: FetchRegistry<T>,
  settings: Settings,
  events: broadcast::Sender<DataEvent<T>>,
  runtime: Handle,
}

impl<T: Clone + Send + Sync + 'static> Inner<T> {
  fn lock(&self) -> MutexGuard<'_, State<T>> {
    // Callbacks never run under the lock, so a poisoned state is still consistent.
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn broadcast(&self, event: DataEvent<T>) {
    // No subscribers is fine.
    let _ = self.events.send(event);
  }

  /// Handle a worker's terminal outcome.
  fn complete(&self, key: FetchKey, worker_id: u64, outcome: Outcome<T>) {
    match outcome {
      Outcome::Succeeded(value) => {
        let request = {
          let mut state = self.lock();
          let request = state.retire(&key, worker_id);
          if request.is_some() {
            state.cache.insert(
              key.clone(),
              CacheEntry {
                value: value.clone(),
                stored_at: Instant::now(),
              },
            );
          }
          request
        };
        let Some(request) = request else {
          debug!(%key, worker = worker_id, "discarding result of a cancelled request");
          return;
        };

        debug!(%key, waiters = request.waiters.len(), "fetch succeeded");
        for waiter in request.waiters {
          waiter.deliver(&key, Ok(value.clone()));
        }
        self.broadcast(DataEvent::Updated { key, value });
      }
      Outcome::Failed(error) => {
        let request = self.lock().retire(&key, worker_id);
        let Some(request) = request else {
          debug!(%key, worker = worker_id, "discarding error of a cancelled request");
          return;
        };

        warn!(%key, waiters = request.waiters.len(), "fetch failed: {}", error);
        for waiter in request.waiters {
          waiter.deliver(&key, Err(error.clone()));
        }
        self.broadcast(DataEvent::Errored { key, error });
      }
      Outcome::Cancelled => {
        let request = self.lock().retire(&key, worker_id);
        if let Some(request) = request {
          debug!(%key, waiters = request.waiters.len(), "retired cancelled request");
        }
      }
    }
  }
}

/// Single entry point for "give me data of kind K".
///
/// Serves fresh cached values inline, merges concurrent callers for the same
/// key onto one in-flight worker, and fans the outcome out to every waiter
/// exactly once. Cheap to clone; all clones share one cache.
///
/// Callbacks run on a runtime thread once a worker settles, or inline on the
/// caller's thread for cache hits and unknown kinds. Consumers with thread
/// affinity must re-dispatch.
pub struct Coordinator<T> {
  inner: Arc<Inner<T>>,
}

impl<T> Clone for Coordinator<T> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<T: Clone + Send + Sync + 'static> Coordinator<T> {
  /// Create a coordinator that spawns its workers on `runtime`.
  pub fn new(registry: FetchRegistry<T>, settings: Settings, runtime: Handle) -> Self {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    Self {
      inner: Arc::new(Inner {
        state: Mutex::new(State {
          cache: HashMap::new(),
          in_flight: HashMap::new(),
          next_worker_id: 0,
        }),
        registry,
        settings,
        events,
        runtime,
      }),
    }
  }

  /// Request data for `key`, getting called back when it is ready.
  ///
  /// 1. Fresh cache entry and no `force_refresh`: `on_success` runs inline,
  ///    no worker is created and `None` is returned.
  /// 2. A request for `key` is already in flight: the callbacks join it and
  ///    its worker handle is returned. No second fetch is made.
  /// 3. Otherwise a worker is started. Unknown kinds fail inline instead.
  pub fn fetch<S, E>(
    &self,
    key: impl Into<FetchKey>,
    force_refresh: bool,
    on_success: S,
    on_error: E,
  ) -> Option<WorkerHandle>
  where
    S: FnOnce(T) + Send + 'static,
    E: FnOnce(FetchError) + Send + 'static,
  {
    self.submit(
      key.into(),
      force_refresh,
      Waiter::Callbacks {
        on_success: Box::new(on_success),
        on_error: Box::new(on_error),
      },
    )
  }

  /// Future-based form of [`Coordinator::fetch`].
  ///
  /// The returned ticket resolves exactly once. If the request is cancelled
  /// it resolves to [`FetchError::Cancelled`].
  pub fn request(&self, key: impl Into<FetchKey>, force_refresh: bool) -> FetchTicket<T> {
    let (tx, rx) = oneshot::channel();
    self.submit(key.into(), force_refresh, Waiter::Ticket(tx));
    FetchTicket { rx }
  }

  fn submit(&self, key: FetchKey, force_refresh: bool, waiter: Waiter<T>) -> Option<WorkerHandle> {
    let inner = &self.inner;
    let mut state = inner.lock();

    if !force_refresh {
      let cached = state
        .cache
        .get(&key)
        .filter(|entry| entry.is_fresh(inner.settings.ttl))
        .map(|entry| entry.value.clone());
      if let Some(value) = cached {
        drop(state);
        debug!(%key, "serving from cache");
        waiter.deliver(&key, Ok(value.clone()));
        inner.broadcast(DataEvent::Updated { key, value });
        return None;
      }
    }

    if let Some(request) = state.in_flight.get_mut(&key) {
      request.waiters.push(waiter);
      debug!(%key, waiters = request.waiters.len(), "joined in-flight request");
      return Some(request.worker.clone());
    }

    let Some(registration) = inner.registry.resolve(key.kind()) else {
      drop(state);
      let error = FetchError::UnknownKind(key.kind().to_string());
      error!(%key, "no fetch function registered");
      waiter.deliver(&key, Err(error.clone()));
      inner.broadcast(DataEvent::Errored { key, error });
      return None;
    };

    state.next_worker_id += 1;
    let worker_id = state.next_worker_id;
    let worker = Worker::new(
      worker_id,
      key.clone(),
      registration,
      inner.settings.default_timeout,
    );
    state.in_flight.insert(
      key.clone(),
      InFlight {
        worker: worker.handle(),
        waiters: vec![waiter],
      },
    );
    drop(state);

    debug!(%key, worker = worker_id, force_refresh, "starting fetch");
    let weak: Weak<Inner<T>> = Arc::downgrade(inner);
    Some(worker.start(&inner.runtime, move |outcome| {
      if let Some(inner) = weak.upgrade() {
        inner.complete(key, worker_id, outcome);
      }
    }))
  }

  /// Cancel the in-flight request for `key`, if any.
  ///
  /// Its waiters are dropped without being called. Returns whether a request
  /// was cancelled.
  pub fn cancel_request(&self, key: &FetchKey) -> bool {
    let request = self.inner.lock().in_flight.remove(key);
    match request {
      Some(request) => {
        request.worker.cancel();
        debug!(%key, waiters = request.waiters.len(), "request cancelled");
        true
      }
      None => false,
    }
  }

  /// Cancel every in-flight request.
  pub fn cancel_all(&self) {
    let requests: Vec<_> = self.inner.lock().in_flight.drain().collect();
    for (key, request) in &requests {
      request.worker.cancel();
      debug!(%key, waiters = request.waiters.len(), "request cancelled");
    }
    debug!(count = requests.len(), "cancelled all requests");
  }

  /// Cancel one particular worker.
  ///
  /// Its registry entry is dropped only while it still belongs to that
  /// worker, so a newer request for the same key is left alone.
  pub fn cancel_worker(&self, worker: &WorkerHandle) {
    worker.cancel();
    let request = self.inner.lock().retire(worker.key(), worker.id());
    if let Some(request) = request {
      debug!(key = %worker.key(), waiters = request.waiters.len(), "worker request cancelled");
    }
  }

  /// Drop cached entries for `kind`, or everything when `kind` is `None`.
  ///
  /// In-flight requests are unaffected.
  pub fn clear_cache(&self, kind: Option<&str>) {
    let mut state = self.inner.lock();
    match kind {
      Some(kind) => {
        state.cache.retain(|key, _| key.kind() != kind);
        debug!(kind, "cache cleared");
      }
      None => {
        state.cache.clear();
        debug!("cache cleared");
      }
    }
  }

  /// The fresh cached value for `key`, without fetching.
  #[allow(dead_code)]
  pub fn get_cached(&self, key: &FetchKey) -> Option<T> {
    let ttl = self.inner.settings.ttl;
    self
      .inner
      .lock()
      .cache
      .get(key)
      .filter(|entry| entry.is_fresh(ttl))
      .map(|entry| entry.value.clone())
  }

  /// Subscribe to "data updated" / "data errored" notifications.
  pub fn subscribe(&self) -> broadcast::Receiver<DataEvent<T>> {
    self.inner.events.subscribe()
  }

  #[allow(dead_code)]
  pub fn is_in_flight(&self, key: &FetchKey) -> bool {
    self.inner.lock().in_flight.contains_key(key)
  }

  pub fn in_flight_count(&self) -> usize {
    self.inner.lock().in_flight.len()
  }

  /// Every kind the registry can fetch.
  pub fn kinds(&self) -> Vec<&str> {
    self.inner.registry.kinds()
  }
}

/// Pending result of [`Coordinator::request`].
pub struct FetchTicket<T> {
  rx: oneshot::Receiver<Result<T, FetchError>>,
}

impl<T> Future for FetchTicket<T> {
  type Output = Result<T, FetchError>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    Pin::new(&mut self.rx)
      .poll(cx)
      .map(|received| received.unwrap_or(Err(FetchError::Cancelled)))
  }
}
