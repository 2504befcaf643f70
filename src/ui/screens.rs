//! Table layouts of the data screens.

use serde_json::Value;
use std::sync::Arc;

use crate::api::kinds::{self, Resource};
use crate::binding::{formatters, lookup, ButtonSpec, ButtonStyle, Column, ColumnSpec};
use crate::event::{Action, Event, EventSender};

const TOOL_STATUS: &[(&str, &str)] = &[
  ("normal", "Normal"),
  ("warning", "Warning"),
  ("worn", "Worn"),
  ("broken", "Broken"),
  ("maintenance", "Maintenance"),
];

const MATERIAL_TYPES: &[(&str, &str)] = &[
  ("carbon_fiber", "Carbon fiber"),
  ("glass_fiber", "Glass fiber"),
  ("aramid", "Aramid"),
  ("hybrid", "Hybrid"),
  ("other", "Other"),
];

const TASK_TYPES: &[(&str, &str)] = &[
  ("drilling", "Drilling"),
  ("milling", "Milling"),
  ("cutting", "Cutting"),
  ("trimming", "Trimming"),
  ("other", "Other"),
];

const TASK_STATUS: &[(&str, &str)] = &[
  ("planned", "Planned"),
  ("in_progress", "In progress"),
  ("completed", "Completed"),
  ("paused", "Paused"),
  ("aborted", "Aborted"),
];

const SENSOR_TYPES: &[(&str, &str)] = &[
  ("temperature", "Temperature"),
  ("vibration", "Vibration"),
  ("force", "Force"),
  ("acoustic", "Acoustic"),
  ("current", "Current"),
  ("other", "Other"),
];

/// A data screen: which resource it lists and how rows look.
#[derive(Debug, Clone)]
pub struct Screen {
  pub resource: &'static Resource,
  pub columns: ColumnSpec,
}

impl Screen {
  pub fn kind(&self) -> &'static str {
    self.resource.kind
  }

  pub fn title(&self) -> &'static str {
    self.resource.title
  }
}

/// Build the screen for `kind`. Row buttons report through `events`.
pub fn screen(kind: &str, events: &EventSender) -> Option<Screen> {
  let resource = kinds::resource(kind)?;
  let (label_field, mut columns) = match resource.kind {
    kinds::TOOLS => (
      "code",
      vec![
        Column::field("id", "ID"),
        Column::field("tool_type", "Type"),
        Column::field("tool_spec", "Spec"),
        Column::field("code", "Code"),
        Column::formatted("current_status", "Status", formatters::choice(TOOL_STATUS)),
        Column::formatted("created_at", "Created", formatters::date),
        Column::formatted("updated_at", "Updated", formatters::date),
      ],
    ),
    kinds::USERS => (
      "username",
      vec![
        Column::field("id", "ID"),
        Column::field("username", "Username"),
        Column::field("full_name", "Name"),
        Column::field("email", "Email"),
        Column::field("is_staff", "Staff"),
        Column::field("is_active", "Active"),
      ],
    ),
    kinds::COMPOSITE_MATERIALS => (
      "part_number",
      vec![
        Column::field("id", "ID"),
        Column::field("part_number", "Part Number"),
        Column::formatted("material_type", "Type", formatters::choice(MATERIAL_TYPES)),
        Column::field("thickness", "Thickness (mm)"),
        Column::formatted("created_at", "Created", formatters::date),
        Column::formatted("updated_at", "Updated", formatters::date),
      ],
    ),
    kinds::PROCESSING_TASKS => (
      "task_code",
      vec![
        Column::field("id", "ID"),
        Column::field("task_code", "Task Code"),
        Column::formatted("processing_type", "Type", formatters::choice(TASK_TYPES)),
        Column::formatted("status", "Status", formatters::choice(TASK_STATUS)),
        Column::field("tool_code", "Tool"),
        Column::field("material_part_number", "Part"),
        Column::field("operator_name", "Operator"),
        Column::formatted("processing_time", "Processed", formatters::timestamp),
      ],
    ),
    kinds::SENSOR_DATA => (
      "sensor_id",
      vec![
        Column::formatted("sensor_type", "Sensor Type", formatters::choice(SENSOR_TYPES)),
        Column::formatted("file_url", "File", formatters::basename),
        Column::formatted("file_size", "Size", formatters::file_size),
        Column::formatted("task_info", "Task", formatters::nested("task_code")),
        Column::formatted("upload_time", "Uploaded", formatters::timestamp),
        Column::field("sensor_id", "Sensor ID"),
      ],
    ),
    kinds::TASK_GROUPS => (
      "name",
      vec![
        Column::field("id", "ID"),
        Column::field("name", "Name"),
        Column::field("is_default", "Default"),
        Column::formatted("tasks", "Tasks", task_count),
        Column::field("description", "Description"),
      ],
    ),
    _ => return None,
  };

  columns.push(row_actions(resource, label_field, events));

  Some(Screen {
    resource,
    columns: ColumnSpec::new(columns),
  })
}

fn task_count(value: &Value) -> String {
  value
    .as_array()
    .map(|tasks| tasks.len().to_string())
    .unwrap_or_else(|| "0".to_string())
}

/// Title of a record in a detail view, e.g. `Tools / T-12`
pub fn record_title(resource: &Resource, label_field: &str, record: &Value) -> String {
  let label = lookup(record, label_field)
    .filter(|v| !v.is_null())
    .or_else(|| record.get("id"))
    .map(|v| match v {
      Value::String(s) => s.clone(),
      other => format!("#{}", other),
    })
    .unwrap_or_else(|| "record".to_string());
  format!("{} / {}", resource.title, label)
}

fn row_actions(
  resource: &'static Resource,
  label_field: &'static str,
  events: &EventSender,
) -> Column {
  let view = {
    let events = events.clone();
    ButtonSpec::new("View", move |record| {
      let _ = events.send(Event::Action(Action::ShowRecord {
        title: record_title(resource, label_field, record),
        record: Arc::new(record.clone()),
      }));
    })
    .with_style(ButtonStyle::Primary)
  };

  let delete = {
    let events = events.clone();
    ButtonSpec::new("Delete", move |record| {
      let action = match record.get("id") {
        Some(id) if !id.is_null() => Action::Delete {
          kind: resource.kind,
          id: id.clone(),
        },
        _ => Action::Failed(format!("Cannot delete from {}: record has no id", resource.title)),
      };
      let _ = events.send(Event::Action(action));
    })
    .with_style(ButtonStyle::Danger)
  };

  Column::buttons("Actions", vec![view, delete])
}
