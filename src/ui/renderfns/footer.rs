use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the footer bar with the view breadcrumb, or a prompt when one is open
pub fn draw_footer(frame: &mut Frame, area: Rect, breadcrumb: &[String], prompt: Option<&str>) {
  let line = match prompt {
    Some(prompt) => Line::from(vec![
      Span::raw(" "),
      Span::styled(prompt.to_string(), Style::default().fg(Color::Yellow).bold()),
      Span::styled("  (y/n)", Style::default().fg(Color::DarkGray)),
    ]),
    None => breadcrumb_line(breadcrumb),
  };

  let paragraph = Paragraph::new(line).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

fn breadcrumb_line(breadcrumb: &[String]) -> Line<'static> {
  let mut spans = vec![Span::raw(" ")];

  for (i, part) in breadcrumb.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled(" > ", Style::default().fg(Color::DarkGray)));
    }

    let style = if i == breadcrumb.len() - 1 {
      // Current view - highlighted
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::White)
    };

    spans.push(Span::styled(part.clone(), style));
  }

  Line::from(spans)
}
