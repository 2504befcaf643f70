//! Declarative column specifications for record tables.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::table::{ActionButton, Cell};

/// Turns a field value (JSON `null` when missing) into display text
pub type Formatter = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Invoked with the row's record when a button is pressed
pub type ClickFn = Arc<dyn Fn(&Value) + Send + Sync>;

/// Placeholder for missing values
pub const MISSING: &str = "N/A";

/// Visual emphasis of a row button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonStyle {
  #[default]
  Default,
  Primary,
  Danger,
}

/// One row-scoped action
#[derive(Clone)]
pub struct ButtonSpec {
  pub label: String,
  pub style: ButtonStyle,
  on_click: ClickFn,
}

impl ButtonSpec {
  pub fn new<F>(label: impl Into<String>, on_click: F) -> Self
  where
    F: Fn(&Value) + Send + Sync + 'static,
  {
    Self {
      label: label.into(),
      style: ButtonStyle::Default,
      on_click: Arc::new(on_click),
    }
  }

  pub fn with_style(mut self, style: ButtonStyle) -> Self {
    self.style = style;
    self
  }

  fn bind(&self, record: &Arc<Value>) -> ActionButton {
    ActionButton::new(
      self.label.clone(),
      self.style,
      Arc::clone(record),
      Arc::clone(&self.on_click),
    )
  }
}

impl fmt::Debug for ButtonSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ButtonSpec")
      .field("label", &self.label)
      .field("style", &self.style)
      .finish_non_exhaustive()
  }
}

/// A single column: either a (possibly formatted) field or a set of buttons.
#[derive(Clone)]
pub enum Column {
  Field {
    /// Field name, or a dotted path into nested objects (`task_info.task_code`)
    key: String,
    header: String,
    formatter: Option<Formatter>,
  },
  Buttons {
    header: String,
    buttons: Vec<ButtonSpec>,
  },
}

impl Column {
  pub fn field(key: impl Into<String>, header: impl Into<String>) -> Self {
    Column::Field {
      key: key.into(),
      header: header.into(),
      formatter: None,
    }
  }

  pub fn formatted<F>(key: impl Into<String>, header: impl Into<String>, formatter: F) -> Self
  where
    F: Fn(&Value) -> String + Send + Sync + 'static,
  {
    Column::Field {
      key: key.into(),
      header: header.into(),
      formatter: Some(Arc::new(formatter)),
    }
  }

  pub fn buttons(header: impl Into<String>, buttons: Vec<ButtonSpec>) -> Self {
    Column::Buttons {
      header: header.into(),
      buttons,
    }
  }

  pub fn header(&self) -> &str {
    match self {
      Column::Field { header, .. } | Column::Buttons { header, .. } => header,
    }
  }

  fn render(&self, record: &Arc<Value>) -> Cell {
    match self {
      Column::Field { key, formatter, .. } => {
        let value = lookup(record, key).unwrap_or(&Value::Null);
        let text = match formatter {
          Some(format) => format(value),
          None => display_value(value),
        };
        Cell::Text(text)
      }
      Column::Buttons { buttons, .. } => {
        Cell::Actions(buttons.iter().map(|b| b.bind(record)).collect())
      }
    }
  }
}

impl fmt::Debug for Column {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Column::Field {
        key,
        header,
        formatter,
      } => f
        .debug_struct("Field")
        .field("key", key)
        .field("header", header)
        .field("formatted", &formatter.is_some())
        .finish(),
      Column::Buttons { header, buttons } => f
        .debug_struct("Buttons")
        .field("header", header)
        .field("buttons", buttons)
        .finish(),
    }
  }
}

/// Ordered, immutable set of columns for one table.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
  columns: Arc<[Column]>,
}

impl ColumnSpec {
  pub fn new(columns: Vec<Column>) -> Self {
    Self {
      columns: columns.into(),
    }
  }

  pub fn columns(&self) -> &[Column] {
    &self.columns
  }

  pub fn headers(&self) -> Vec<String> {
    self.columns.iter().map(|c| c.header().to_string()).collect()
  }

  /// Render one cell per column for `record`.
  pub fn render_row(&self, record: &Arc<Value>) -> Vec<Cell> {
    self.columns.iter().map(|c| c.render(record)).collect()
  }
}

/// Resolve a dotted path (`a.b.0.c`) inside a record.
///
/// Numeric segments index into arrays.
pub fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
  path.split('.').try_fold(record, |current, segment| match current {
    Value::Object(map) => map.get(segment),
    Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
    _ => None,
  })
}

/// Default text for a field value.
pub fn display_value(value: &Value) -> String {
  match value {
    Value::Null => MISSING.to_string(),
    Value::String(s) => s.clone(),
    Value::Bool(true) => "yes".to_string(),
    Value::Bool(false) => "no".to_string(),
    other => other.to_string(),
  }
}

/// Formatters shared by the screens.
pub mod formatters {
  use super::{display_value, MISSING};
  use chrono::{DateTime, Local, NaiveDate};
  use serde_json::Value;

  /// `2024-03-01T08:15:00Z` -> `2024-03-01`
  pub fn date(value: &Value) -> String {
    match value.as_str() {
      Some(s) => s.split('T').next().unwrap_or(s).to_string(),
      None => MISSING.to_string(),
    }
  }

  /// RFC 3339 timestamp -> local `YYYY-MM-DD HH:MM`
  pub fn timestamp(value: &Value) -> String {
    let Some(s) = value.as_str() else {
      return MISSING.to_string();
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
      return parsed.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string();
    }
    // Naive timestamps like "2024-03-01T08:15:30.123"
    let trimmed = s.split('.').next().unwrap_or(s).replace('T', " ");
    let day = trimmed.get(..10).unwrap_or(&trimmed);
    if NaiveDate::parse_from_str(day, "%Y-%m-%d").is_ok() {
      trimmed.chars().take(16).collect()
    } else {
      s.to_string()
    }
  }

  /// Byte count -> `12.3 KB` / `4.5 MB`
  pub fn file_size(value: &Value) -> String {
    match value.as_f64() {
      Some(bytes) if bytes > 0.0 => {
        if bytes < 1024.0 * 1024.0 {
          format!("{:.1} KB", bytes / 1024.0)
        } else {
          format!("{:.1} MB", bytes / (1024.0 * 1024.0))
        }
      }
      _ => "unknown".to_string(),
    }
  }

  /// Last path segment of a URL or path
  pub fn basename(value: &Value) -> String {
    match value.as_str() {
      Some(s) if !s.is_empty() => s
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(s)
        .to_string(),
      _ => MISSING.to_string(),
    }
  }

  /// Map stored choice values to labels, falling back to the raw value.
  pub fn choice(choices: &'static [(&'static str, &'static str)]) -> impl Fn(&Value) -> String {
    move |value| {
      let raw = display_value(value);
      choices
        .iter()
        .find(|(stored, _)| *stored == raw)
        .map(|(_, label)| label.to_string())
        .unwrap_or(raw)
    }
  }

  /// Read a field of a nested object, e.g. the code of a linked task.
  pub fn nested(field: &'static str) -> impl Fn(&Value) -> String {
    move |value| match value.get(field) {
      Some(inner) => display_value(inner),
      None => MISSING.to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::sync::Mutex;

  fn texts(cells: &[Cell]) -> Vec<String> {
    cells
      .iter()
      .map(|c| match c {
        Cell::Text(t) => t.clone(),
        Cell::Actions(buttons) => buttons
          .iter()
          .map(|b| b.label().to_string())
          .collect::<Vec<_>>()
          .join("|"),
      })
      .collect()
  }

  #[test]
  fn test_lookup_dotted_paths() {
    let record = json!({"id": 4, "task_info": {"task_code": "T-9"}, "tags": ["a", "b"]});
    assert_eq!(lookup(&record, "id"), Some(&json!(4)));
    assert_eq!(lookup(&record, "task_info.task_code"), Some(&json!("T-9")));
    assert_eq!(lookup(&record, "tags.1"), Some(&json!("b")));
    assert_eq!(lookup(&record, "task_info.missing"), None);
    assert_eq!(lookup(&record, "id.deeper"), None);
  }

  #[test]
  fn test_render_row_with_formatters_and_buttons() {
    let clicked = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&clicked);
    let spec = ColumnSpec::new(vec![
      Column::field("code", "Code"),
      Column::formatted("status", "Status", formatters::choice(&[("worn", "Worn")])),
      Column::field("operator.name", "Operator"),
      Column::buttons(
        "Actions",
        vec![
          ButtonSpec::new("Edit", |_| {}).with_style(ButtonStyle::Primary),
          ButtonSpec::new("Delete", move |record| {
            sink.lock().unwrap().push(record["id"].clone());
          })
          .with_style(ButtonStyle::Danger),
        ],
      ),
    ]);

    let record = Arc::new(json!({"id": 12, "code": "DR-01", "status": "worn"}));
    let row = spec.render_row(&record);
    assert_eq!(texts(&row), vec!["DR-01", "Worn", "N/A", "Edit|Delete"]);
    assert_eq!(spec.headers(), vec!["Code", "Status", "Operator", "Actions"]);

    if let Cell::Actions(buttons) = &row[3] {
      assert_eq!(buttons[1].style(), ButtonStyle::Danger);
      buttons[1].press();
    }
    assert_eq!(*clicked.lock().unwrap(), vec![json!(12)]);
  }

  #[test]
  fn test_display_value() {
    assert_eq!(display_value(&Value::Null), "N/A");
    assert_eq!(display_value(&json!("drill")), "drill");
    assert_eq!(display_value(&json!(0.25)), "0.25");
    assert_eq!(display_value(&json!(true)), "yes");
  }

  #[test]
  fn test_formatters() {
    assert_eq!(formatters::date(&json!("2024-03-01T08:15:00Z")), "2024-03-01");
    assert_eq!(formatters::date(&Value::Null), "N/A");
    assert_eq!(
      formatters::timestamp(&json!("2024-03-01T08:15:30.123456")),
      "2024-03-01 08:15"
    );
    assert_eq!(formatters::file_size(&json!(2048)), "2.0 KB");
    assert_eq!(formatters::file_size(&json!(3 * 1024 * 1024)), "3.0 MB");
    assert_eq!(formatters::file_size(&Value::Null), "unknown");
    assert_eq!(
      formatters::basename(&json!("http://host/media/sensor/run-7.csv")),
      "run-7.csv"
    );
    assert_eq!(formatters::nested("task_code")(&json!({"task_code": "T-1"})), "T-1");
    assert_eq!(formatters::nested("task_code")(&Value::Null), "N/A");
    assert_eq!(formatters::choice(&[("a", "Alpha")])(&json!("b")), "b");
  }
}
