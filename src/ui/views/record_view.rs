use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use serde_json::Value;
use std::sync::Arc;

use crate::binding::formatters;
use crate::ui::view::{Shortcut, View, ViewAction};

/// Read-only view of every field of one record
pub struct RecordView {
  title: String,
  record: Arc<Value>,
  scroll: u16,
}

impl RecordView {
  pub fn new(title: String, record: Arc<Value>) -> Self {
    Self {
      title,
      record,
      scroll: 0,
    }
  }

  fn lines(&self) -> Vec<Line<'static>> {
    let Value::Object(fields) = self.record.as_ref() else {
      return vec![Line::raw(self.record.to_string())];
    };

    let width = fields.keys().map(|k| k.chars().count()).max().unwrap_or(0);
    fields
      .iter()
      .map(|(name, value)| {
        Line::from(vec![
          Span::styled(format!("{:<width$}  ", name, width = width), Style::default().fg(Color::DarkGray)),
          Span::raw(field_text(name, value)),
        ])
      })
      .collect()
  }
}

fn field_text(name: &str, value: &Value) -> String {
  match value {
    Value::Null => "-".to_string(),
    Value::String(_) if name.ends_with("_at") || name.ends_with("_time") => {
      formatters::timestamp(value)
    }
    Value::String(s) => s.clone(),
    Value::Bool(true) => "yes".to_string(),
    Value::Bool(false) => "no".to_string(),
    Value::Object(_) | Value::Array(_) => value.to_string(),
    Value::Number(n) => n.to_string(),
  }
}

impl View for RecordView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
      KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
      KeyCode::Char('g') | KeyCode::Home => self.scroll = 0,
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(format!(" {} ", self.title))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let paragraph = Paragraph::new(self.lines())
      .block(block)
      .wrap(Wrap { trim: false })
      .scroll((self.scroll, 0));
    frame.render_widget(paragraph, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.title.clone()
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("j/k", "scroll").with_priority(20),
      Shortcut::new("q", "back").with_priority(30),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;
  use serde_json::json;

  #[test]
  fn test_field_text() {
    assert_eq!(field_text("notes", &Value::Null), "-");
    assert_eq!(field_text("is_staff", &json!(true)), "yes");
    assert_eq!(field_text("task_info", &json!({"task_code": "TK-1"})), r#"{"task_code":"TK-1"}"#);
    assert_eq!(field_text("created_at", &json!("2024-03-01T08:15:30.5")), "2024-03-01 08:15");
  }

  #[test]
  fn test_lines_one_per_field() {
    let view = RecordView::new("Tools / T-1".into(), Arc::new(json!({"id": 1, "code": "T-1"})));
    assert_eq!(view.lines().len(), 2);
  }

  #[test]
  fn test_scroll_and_back() {
    let mut view = RecordView::new("x".into(), Arc::new(json!({})));
    view.handle_key(KeyEvent::new(KeyCode::Char('k'), KeyModifiers::NONE));
    assert_eq!(view.scroll, 0);
    view.handle_key(KeyEvent::new(KeyCode::Char('j'), KeyModifiers::NONE));
    assert_eq!(view.scroll, 1);
    assert!(matches!(
      view.handle_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)),
      ViewAction::Pop
    ));
  }
}
