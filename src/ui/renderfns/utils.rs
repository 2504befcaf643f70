use ratatui::prelude::Color;

use crate::binding::{ButtonStyle, NoticeLevel};

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Display color of a row button
pub fn button_color(style: ButtonStyle) -> Color {
  match style {
    ButtonStyle::Primary => Color::Cyan,
    ButtonStyle::Danger => Color::Red,
    ButtonStyle::Default => Color::White,
  }
}

pub fn notice_color(level: NoticeLevel) -> Color {
  match level {
    NoticeLevel::Info => Color::Green,
    NoticeLevel::Error => Color::Red,
  }
}

/// Color for status-like values shared by tools and tasks
pub fn status_color(status: &str) -> Color {
  match status {
    "Normal" | "Completed" => Color::Green,
    "Warning" | "In progress" | "Paused" | "Maintenance" => Color::Yellow,
    "Worn" | "Broken" | "Aborted" => Color::Red,
    _ => Color::White,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("碳纤维复合材料构件", 5), "碳纤...");
  }

  #[test]
  fn test_status_color() {
    assert_eq!(status_color("Completed"), Color::Green);
    assert_eq!(status_color("Worn"), Color::Red);
    assert_eq!(status_color("In progress"), Color::Yellow);
    assert_eq!(status_color("N/A"), Color::White);
  }

  #[test]
  fn test_button_color() {
    assert_eq!(button_color(ButtonStyle::Danger), Color::Red);
    assert_eq!(button_color(ButtonStyle::Default), Color::White);
  }
}
