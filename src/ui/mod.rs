pub mod components;
pub mod renderfns;
pub mod screens;
pub mod view;
pub mod views;

use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::{Paragraph, TableState};
use renderfns::{draw_footer, draw_header, HeaderContext};

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  let shortcuts = app.current_view().map(|v| v.shortcuts()).unwrap_or_default();
  let ctx = HeaderContext {
    title: app.title(),
    host: app.host(),
    in_flight: app.in_flight(),
    sync: app.sync_status(),
  };
  draw_header(frame, chunks[0], &ctx, &shortcuts);

  match app.current_view_mut() {
    Some(view) => view.render(frame, chunks[1]),
    None => {
      let hint = Paragraph::new(" Press : to open a screen").style(Style::default().fg(Color::DarkGray));
      frame.render_widget(hint, chunks[1]);
    }
  }

  let prompt = app.confirm_prompt();
  draw_footer(frame, chunks[2], &app.view_breadcrumb(), prompt.as_deref());

  app.command_input().render_overlay(frame, chunks[1]);
}

/// Keep the selection inside the table, selecting the first row when
/// rows appear
pub fn ensure_valid_selection(state: &mut TableState, len: usize) {
  match state.selected() {
    _ if len == 0 => state.select(None),
    None => state.select(Some(0)),
    Some(i) if i >= len => state.select(Some(len - 1)),
    Some(_) => {}
  }
}
