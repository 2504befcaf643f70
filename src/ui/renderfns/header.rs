use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use super::utils::truncate;
use crate::app::SyncStatus;
use crate::ui::view::Shortcut;

/// What the header shows besides the shortcuts
pub struct HeaderContext<'a> {
  pub title: &'a str,
  pub host: &'a str,
  pub in_flight: usize,
  pub sync: &'a SyncStatus,
}

/// Draw the header bar with title, server, fetch activity and shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, ctx: &HeaderContext, shortcuts: &[Shortcut]) {
  let separator = || Span::styled("│", Style::default().fg(Color::DarkGray));

  let mut spans = vec![
    Span::styled(format!(" {} ", ctx.title), Style::default().fg(Color::Cyan).bold()),
    separator(),
    Span::styled(format!(" {} ", ctx.host), Style::default().fg(Color::White)),
    separator(),
    activity_span(ctx.in_flight),
    separator(),
    sync_span(ctx.sync),
    Span::raw("  "),
  ];

  let mut shortcuts = shortcuts.to_vec();
  shortcuts.sort_by_key(|s| s.priority);
  for (i, shortcut) in shortcuts.iter().enumerate() {
    if i > 0 {
      spans.push(Span::raw("   "));
    }
    spans.push(Span::styled(format!("<{}>", shortcut.key), Style::default().fg(Color::Cyan)));
    spans.push(Span::styled(format!(" {}", shortcut.label), Style::default().fg(Color::DarkGray)));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

fn activity_span(in_flight: usize) -> Span<'static> {
  if in_flight == 0 {
    Span::styled(" idle ", Style::default().fg(Color::DarkGray))
  } else {
    Span::styled(format!(" fetching {} ", in_flight), Style::default().fg(Color::Yellow))
  }
}

fn sync_span(sync: &SyncStatus) -> Span<'static> {
  match sync {
    SyncStatus::Never => Span::styled(" not synced ", Style::default().fg(Color::DarkGray)),
    SyncStatus::Synced { kind, records, at } => Span::styled(
      format!(" {} ({}) @ {} ", kind, records, at.format("%H:%M:%S")),
      Style::default().fg(Color::Green),
    ),
    SyncStatus::Failed { kind, reason, at } => Span::styled(
      format!(
        " {} failed @ {}: {} ",
        kind,
        at.format("%H:%M:%S"),
        truncate(reason, 40)
      ),
      Style::default().fg(Color::Red),
    ),
  }
}
