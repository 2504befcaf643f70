//! Display targets: what the loader writes fetched rows into.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::columns::{ButtonStyle, ClickFn};

/// How long a notice stays visible unless dismissed.
pub const NOTICE_LIFETIME: Duration = Duration::from_secs(5);

/// A tabular display component the loader can populate.
///
/// Implementations live behind a mutex shared between the UI thread, which
/// renders them, and fetch callbacks, which write to them.
pub trait DisplayTarget: Send + 'static {
  fn set_headers(&mut self, headers: Vec<String>);
  fn clear_rows(&mut self);
  fn push_row(&mut self, row: Row);
  fn row_count(&self) -> usize;
  fn set_loading(&mut self, loading: bool);
  /// Show a transient, dismissible message near the table.
  fn show_notice(&mut self, notice: Notice);
}

/// An interactive control bound to one row's record.
#[derive(Clone)]
pub struct ActionButton {
  label: String,
  style: ButtonStyle,
  record: Arc<Value>,
  on_click: ClickFn,
}

impl ActionButton {
  pub(crate) fn new(label: String, style: ButtonStyle, record: Arc<Value>, on_click: ClickFn) -> Self {
    Self {
      label,
      style,
      record,
      on_click,
    }
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn style(&self) -> ButtonStyle {
    self.style
  }

  /// Invoke the button's action with its row's record.
  pub fn press(&self) {
    (self.on_click)(&self.record)
  }
}

impl fmt::Debug for ActionButton {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ActionButton")
      .field("label", &self.label)
      .field("style", &self.style)
      .finish_non_exhaustive()
  }
}

#[derive(Debug, Clone)]
pub enum Cell {
  Text(String),
  Actions(Vec<ActionButton>),
}

/// One rendered record: a cell per column.
#[derive(Debug, Clone)]
pub struct Row {
  pub cells: Vec<Cell>,
}

impl Row {
  /// Buttons of the first action column, if the row has one.
  pub fn actions(&self) -> &[ActionButton] {
    self
      .cells
      .iter()
      .find_map(|c| match c {
        Cell::Actions(buttons) => Some(buttons.as_slice()),
        Cell::Text(_) => None,
      })
      .unwrap_or(&[])
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
  Info,
  Error,
}

#[derive(Debug, Clone)]
pub struct Notice {
  pub level: NoticeLevel,
  pub message: String,
  raised_at: Instant,
}

impl Notice {
  pub fn info(message: impl Into<String>) -> Self {
    Self {
      level: NoticeLevel::Info,
      message: message.into(),
      raised_at: Instant::now(),
    }
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self {
      level: NoticeLevel::Error,
      message: message.into(),
      raised_at: Instant::now(),
    }
  }

  pub fn is_expired(&self, lifetime: Duration) -> bool {
    self.raised_at.elapsed() >= lifetime
  }
}

/// In-memory table rendered by the terminal UI.
#[derive(Debug, Default)]
pub struct TableModel {
  headers: Vec<String>,
  rows: Vec<Row>,
  notice: Option<Notice>,
  loading: bool,
}

impl TableModel {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn headers(&self) -> &[String] {
    &self.headers
  }

  pub fn rows(&self) -> &[Row] {
    &self.rows
  }

  pub fn is_loading(&self) -> bool {
    self.loading
  }

  pub fn notice(&self) -> Option<&Notice> {
    self.notice.as_ref()
  }

  pub fn dismiss_notice(&mut self) -> bool {
    self.notice.take().is_some()
  }

  /// Drop the notice once it outlived `lifetime`. Returns whether it did.
  pub fn expire_notice(&mut self, lifetime: Duration) -> bool {
    if self.notice.as_ref().is_some_and(|n| n.is_expired(lifetime)) {
      self.notice = None;
      return true;
    }
    false
  }
}

impl DisplayTarget for TableModel {
  fn set_headers(&mut self, headers: Vec<String>) {
    self.headers = headers;
  }

  fn clear_rows(&mut self) {
    self.rows.clear();
  }

  fn push_row(&mut self, row: Row) {
    self.rows.push(row);
  }

  fn row_count(&self) -> usize {
    self.rows.len()
  }

  fn set_loading(&mut self, loading: bool) {
    self.loading = loading;
  }

  fn show_notice(&mut self, notice: Notice) {
    self.notice = Some(notice);
  }
}
