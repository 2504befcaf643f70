use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};

use crate::binding::{
  self, ActionButton, Bound, Column, DisplayTarget, LoadOptions, Notice, TableLoader, TableModel,
  NOTICE_LIFETIME,
};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{button_color, notice_color, status_color, truncate};
use crate::ui::screens::Screen;
use crate::ui::view::{Shortcut, View, ViewAction};

const MAX_CELL_WIDTH: usize = 40;

/// Lists the records of one kind, with row buttons
pub struct TableView {
  screen: Screen,
  loader: TableLoader,
  table: Bound<TableModel>,
  state: TableState,
  /// Focused button within the selected row
  button: usize,
}

impl TableView {
  /// Create the view and start loading, serving cached data if fresh
  pub fn new(screen: Screen, loader: TableLoader) -> Self {
    let mut view = Self {
      screen,
      loader,
      table: Bound::new(TableModel::new()),
      state: TableState::default(),
      button: 0,
    };
    view.load(LoadOptions::default().preserving());
    view
  }

  fn load(&mut self, options: LoadOptions) {
    self
      .loader
      .load(&self.table, self.screen.kind(), &self.screen.columns, options);
  }

  /// Buttons of the selected row, cloned so no lock is held while pressing
  fn selected_actions(&self) -> Vec<ActionButton> {
    let table = self.table.lock();
    self
      .state
      .selected()
      .and_then(|i| table.rows().get(i))
      .map(|row| row.actions().to_vec())
      .unwrap_or_default()
  }

  fn move_button(&mut self, forward: bool) {
    let count = self.selected_actions().len();
    if count == 0 {
      return;
    }
    self.button = if forward {
      (self.button + 1) % count
    } else {
      (self.button + count - 1) % count
    };
  }

  fn press_button(&self) {
    if let Some(button) = self.selected_actions().get(self.button) {
      button.press();
    }
  }

  fn column_widths(&self) -> Vec<Constraint> {
    self
      .screen
      .columns
      .columns()
      .iter()
      .map(|column| match column {
        Column::Buttons { buttons, .. } => {
          Constraint::Length(buttons.iter().map(|b| b.label.chars().count() as u16 + 3).sum())
        }
        Column::Field { .. } => Constraint::Fill(1),
      })
      .collect()
  }

  fn render_table(&mut self, frame: &mut Frame, area: Rect) {
    let widths = self.column_widths();
    let table = self.table.lock();
    ensure_valid_selection(&mut self.state, table.row_count());

    let title = if table.is_loading() {
      format!(" {} (loading...) ", self.screen.title())
    } else {
      format!(" {} ({}) ", self.screen.title(), table.row_count())
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Min(1),
        Constraint::Length(u16::from(table.notice().is_some())),
      ])
      .split(inner);

    if let Some(notice) = table.notice() {
      let line = Line::from(vec![
        Span::styled(format!(" {} ", notice.message), Style::default().fg(notice_color(notice.level))),
        Span::styled(" <esc> dismiss", Style::default().fg(Color::DarkGray)),
      ]);
      frame.render_widget(Paragraph::new(line), chunks[1]);
    }

    if table.rows().is_empty() {
      let content = if table.is_loading() {
        "Loading..."
      } else if table.notice().is_some() {
        "Nothing to show. Press 'r' to retry."
      } else {
        "No records found."
      };
      let paragraph = Paragraph::new(content).style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, chunks[0]);
      return;
    }

    let status_column = table.headers().iter().position(|h| h == "Status");
    let selected = self.state.selected();

    let header = Row::new(
      table
        .headers()
        .iter()
        .map(|h| Cell::from(h.clone()).style(Style::default().fg(Color::Yellow).bold())),
    );

    let rows: Vec<Row> = table
      .rows()
      .iter()
      .enumerate()
      .map(|(row_index, row)| {
        let cells = row.cells.iter().enumerate().map(|(col, cell)| match cell {
          binding::Cell::Text(text) => {
            let style = if Some(col) == status_column {
              Style::default().fg(status_color(text))
            } else {
              Style::default()
            };
            Cell::from(truncate(text, MAX_CELL_WIDTH)).style(style)
          }
          binding::Cell::Actions(buttons) => {
            let spans: Vec<Span> = buttons
              .iter()
              .enumerate()
              .map(|(i, button)| {
                let mut style = Style::default().fg(button_color(button.style()));
                if selected == Some(row_index) && i == self.button {
                  style = style.add_modifier(Modifier::REVERSED);
                }
                Span::styled(format!("[{}]", button.label()), style)
              })
              .flat_map(|span| [span, Span::raw(" ")])
              .collect();
            Cell::from(Line::from(spans))
          }
        });
        Row::new(cells)
      })
      .collect();

    let widget = Table::new(rows, widths)
      .header(header)
      .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");

    frame.render_stateful_widget(widget, chunks[0], &mut self.state);
  }
}

impl View for TableView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.state.select_next();
        self.button = 0;
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.state.select_previous();
        self.button = 0;
      }
      KeyCode::Char('g') | KeyCode::Home => self.state.select_first(),
      KeyCode::Char('G') | KeyCode::End => self.state.select_last(),
      KeyCode::Char('l') | KeyCode::Right | KeyCode::Tab => self.move_button(true),
      KeyCode::Char('h') | KeyCode::Left | KeyCode::BackTab => self.move_button(false),
      KeyCode::Enter => self.press_button(),
      // Refresh keeps the current rows on screen until the new ones arrive
      KeyCode::Char('r') => self.load(LoadOptions::default().refresh().preserving()),
      KeyCode::Char('R') => self.load(LoadOptions::default().refresh()),
      KeyCode::Esc => {
        if !self.table.lock().dismiss_notice() {
          return ViewAction::Pop;
        }
      }
      KeyCode::Char('q') => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_table(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.screen.title().to_string()
  }

  fn kind(&self) -> Option<&str> {
    Some(self.screen.kind())
  }

  fn tick(&mut self) {
    self.table.lock().expire_notice(NOTICE_LIFETIME);
  }

  fn on_data_changed(&mut self, kind: &str) {
    if kind == self.screen.kind() {
      self.load(LoadOptions::default().refresh());
    }
  }

  fn notify(&mut self, notice: Notice) {
    self.table.lock().show_notice(notice);
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("h/l", "button").with_priority(20),
      Shortcut::new("enter", "press").with_priority(21),
      Shortcut::new("r", "refresh").with_priority(30),
      Shortcut::new("R", "reload").with_priority(31),
      Shortcut::new("q", "back").with_priority(40),
    ]
  }
}

impl Drop for TableView {
  fn drop(&mut self) {
    // Nobody will look at the result any more
    if let Some(worker) = self.table.pending() {
      if !worker.is_finished() {
        self.loader.coordinator().cancel_worker(&worker);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::kinds;
  use crate::event::{Action, Event};
  use crate::fetch::{Coordinator, FetchRegistry, Settings};
  use crate::ui::screens::screen;
  use color_eyre::{eyre::eyre, Report};
  use crossterm::event::KeyModifiers;
  use ratatui::backend::TestBackend;
  use serde_json::{json, Value};
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;
  use tokio::runtime::Handle;
  use tokio::sync::mpsc;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn tools_loader(calls: Arc<AtomicU32>) -> TableLoader {
    let registry = FetchRegistry::new()
      .register(kinds::TOOLS, move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        async {
          Ok::<_, Report>(json!({
            "count": 2,
            "results": [
              {"id": 1, "code": "T-1", "current_status": "normal"},
              {"id": 2, "code": "T-2", "current_status": "worn"}
            ]
          }))
        }
      })
      .register(kinds::USERS, |_| async { Err::<Value, _>(eyre!("connection refused")) });
    TableLoader::new(Coordinator::new(registry, Settings::default(), Handle::current()))
  }

  async fn settle(view: &TableView) {
    for _ in 0..200 {
      if !view.table.lock().is_loading() {
        return;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("load never settled");
  }

  #[tokio::test]
  async fn test_enter_presses_focused_button() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut view = TableView::new(screen(kinds::TOOLS, &tx).unwrap(), tools_loader(Arc::default()));
    settle(&view).await;

    view.handle_key(key(KeyCode::Down));
    view.handle_key(key(KeyCode::Down));
    view.handle_key(key(KeyCode::Char('l')));
    view.handle_key(key(KeyCode::Enter));

    match rx.try_recv() {
      Ok(Event::Action(Action::Delete { kind, id })) => {
        assert_eq!(kind, kinds::TOOLS);
        assert_eq!(id, json!(2));
      }
      other => panic!("unexpected {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_refresh_refetches() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let calls = Arc::new(AtomicU32::new(0));
    let mut view = TableView::new(screen(kinds::TOOLS, &tx).unwrap(), tools_loader(calls.clone()));
    settle(&view).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    view.handle_key(key(KeyCode::Char('r')));
    assert_eq!(view.table.lock().row_count(), 2);
    settle(&view).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(view.table.lock().row_count(), 2);
  }

  #[tokio::test]
  async fn test_data_change_reloads_without_preserving() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let calls = Arc::new(AtomicU32::new(0));
    let mut view = TableView::new(screen(kinds::TOOLS, &tx).unwrap(), tools_loader(calls.clone()));
    settle(&view).await;

    view.on_data_changed(kinds::USERS);
    assert_eq!(view.table.lock().row_count(), 2);

    view.on_data_changed(kinds::TOOLS);
    assert_eq!(view.table.lock().row_count(), 0);
    settle(&view).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_error_notice_dismissed_by_esc() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut view = TableView::new(screen(kinds::USERS, &tx).unwrap(), tools_loader(Arc::default()));
    settle(&view).await;
    assert!(view.table.lock().notice().is_some());

    assert!(matches!(view.handle_key(key(KeyCode::Esc)), ViewAction::None));
    assert!(view.table.lock().notice().is_none());
    assert!(matches!(view.handle_key(key(KeyCode::Esc)), ViewAction::Pop));
  }

  #[tokio::test]
  async fn test_render() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut view = TableView::new(screen(kinds::TOOLS, &tx).unwrap(), tools_loader(Arc::default()));
    settle(&view).await;

    let mut terminal = Terminal::new(TestBackend::new(120, 10)).unwrap();
    terminal
      .draw(|frame| view.render(frame, frame.area()))
      .unwrap();

    let text: String = terminal
      .backend()
      .buffer()
      .content()
      .iter()
      .map(|cell| cell.symbol())
      .collect();
    assert!(text.contains("Tools (2)"));
    assert!(text.contains("T-2"));
    assert!(text.contains("[Delete]"));
  }
}
