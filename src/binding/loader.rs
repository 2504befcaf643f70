//! Binds coordinator results to display targets.

use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use super::columns::ColumnSpec;
use super::table::{DisplayTarget, Notice, Row, TableModel};
use crate::fetch::{Coordinator, FetchError, FetchKey, WorkerHandle};

/// How a load treats the cache and the rows already on screen.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
  /// Skip the cache and always fetch
  pub force_refresh: bool,
  /// Keep current rows visible until the new rows are ready
  pub preserve_old_rows: bool,
  /// Query parameters, refining the cache key
  pub params: Option<Value>,
}

impl LoadOptions {
  pub fn refresh(mut self) -> Self {
    self.force_refresh = true;
    self
  }

  pub fn preserving(mut self) -> Self {
    self.preserve_old_rows = true;
    self
  }
}

/// A display target plus the bookkeeping that ties it to its latest load.
///
/// Every load bumps the generation; callbacks carrying an older generation
/// are ignored, so a late response never overwrites a newer one.
pub struct Bound<D = TableModel> {
  target: Arc<Mutex<D>>,
  generation: Arc<AtomicU64>,
  pending: Mutex<Option<WorkerHandle>>,
}

impl<D: DisplayTarget> Bound<D> {
  pub fn new(target: D) -> Self {
    Self {
      target: Arc::new(Mutex::new(target)),
      generation: Arc::new(AtomicU64::new(0)),
      pending: Mutex::new(None),
    }
  }

  /// Lock the target for reading or writing.
  pub fn lock(&self) -> MutexGuard<'_, D> {
    lock_target(&self.target)
  }

  /// The worker serving the most recent load, if it went to the network.
  pub fn pending(&self) -> Option<WorkerHandle> {
    self
      .pending
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  fn replace_pending(&self, worker: Option<WorkerHandle>) -> Option<WorkerHandle> {
    let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *pending, worker)
  }
}

fn lock_target<D>(target: &Mutex<D>) -> MutexGuard<'_, D> {
  target.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Extract the records of a result set.
///
/// Accepts a plain array, a paginated `{"count": n, "results": [...]}`
/// object, or a single object.
pub fn records(value: &Value) -> &[Value] {
  match value {
    Value::Array(items) => items,
    Value::Object(map) => match map.get("results") {
      Some(Value::Array(items)) => items,
      _ => std::slice::from_ref(value),
    },
    _ => &[],
  }
}

/// Populates display targets with coordinator results.
#[derive(Clone)]
pub struct TableLoader {
  coordinator: Coordinator<Value>,
}

impl TableLoader {
  pub fn new(coordinator: Coordinator<Value>) -> Self {
    Self { coordinator }
  }

  pub fn coordinator(&self) -> &Coordinator<Value> {
    &self.coordinator
  }

  /// Load `kind` into `bound`, one row per record.
  ///
  /// Without `preserve_old_rows` the target is cleared right away; with it,
  /// the old rows stay until the success callback swaps in the new ones.
  /// Errors raise a notice and leave the rows alone. An earlier load for
  /// the same target that is still fetching a different key is cancelled.
  pub fn load<D: DisplayTarget>(
    &self,
    bound: &Bound<D>,
    kind: &str,
    columns: &ColumnSpec,
    options: LoadOptions,
  ) -> Option<WorkerHandle> {
    let generation = bound.generation.fetch_add(1, Ordering::SeqCst) + 1;
    let key = FetchKey::with_params(kind, options.params);

    // Same key would just coalesce onto the pending worker.
    if let Some(previous) = bound.replace_pending(None) {
      if !previous.is_finished() && previous.key() != &key {
        debug!(key = %previous.key(), "cancelling superseded load");
        self.coordinator.cancel_worker(&previous);
      }
    }

    {
      let mut target = bound.lock();
      if !options.preserve_old_rows {
        target.clear_rows();
      }
      target.set_headers(columns.headers());
      target.set_loading(true);
    }

    let on_success = {
      let target = Arc::clone(&bound.target);
      let current = Arc::clone(&bound.generation);
      let columns = columns.clone();
      let key = key.clone();
      move |value: Value| {
        let mut target = lock_target(&target);
        if current.load(Ordering::SeqCst) != generation {
          debug!(%key, "dropping result of a superseded load");
          return;
        }
        let records = records(&value);
        target.clear_rows();
        for record in records {
          let cells = columns.render_row(&Arc::new(record.clone()));
          target.push_row(Row { cells });
        }
        target.set_loading(false);
        debug!(%key, rows = records.len(), "table populated");
      }
    };

    let on_error = {
      let target = Arc::clone(&bound.target);
      let current = Arc::clone(&bound.generation);
      let key = key.clone();
      move |error: FetchError| {
        let mut target = lock_target(&target);
        if current.load(Ordering::SeqCst) != generation {
          return;
        }
        warn!(%key, "load failed: {}", error);
        target.set_loading(false);
        target.show_notice(Notice::error(format!("Failed to load {}: {}", key.kind(), error)));
      }
    };

    let worker = self
      .coordinator
      .fetch(key, options.force_refresh, on_success, on_error);
    bound.replace_pending(worker.clone());
    worker
  }
}
