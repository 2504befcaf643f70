/// Available commands and autocomplete logic
use crate::api::kinds;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  /// Data kind the command opens, if any
  pub kind: Option<&'static str>,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "tools",
    aliases: &["t", "tool"],
    description: "Cutting tools and their wear status",
    kind: Some(kinds::TOOLS),
  },
  Command {
    name: "tasks",
    aliases: &["p", "task", "processing"],
    description: "Processing tasks",
    kind: Some(kinds::PROCESSING_TASKS),
  },
  Command {
    name: "materials",
    aliases: &["m", "material", "parts"],
    description: "Composite material parts",
    kind: Some(kinds::COMPOSITE_MATERIALS),
  },
  Command {
    name: "sensors",
    aliases: &["s", "sensor", "uploads"],
    description: "Uploaded sensor data files",
    kind: Some(kinds::SENSOR_DATA),
  },
  Command {
    name: "groups",
    aliases: &["g", "group"],
    description: "Task groups",
    kind: Some(kinds::TASK_GROUPS),
  },
  Command {
    name: "users",
    aliases: &["u", "user"],
    description: "User accounts",
    kind: Some(kinds::USERS),
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit fabdesk",
    kind: None,
  },
];

/// Find a command by exact name or alias
pub fn find(name: &str) -> Option<&'static Command> {
  let name = name.trim().to_lowercase();
  COMMANDS
    .iter()
    .find(|cmd| cmd.name == name || cmd.aliases.contains(&name.as_str()))
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    let priority = if cmd.name == input_lower {
      0
    } else if cmd.aliases.contains(&input_lower.as_str()) {
      1
    } else if cmd.name.starts_with(&input_lower) {
      2
    } else if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      3
    } else if cmd.name.contains(&input_lower) {
      4
    } else if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      5
    } else {
      continue;
    };
    matches.push((cmd, priority));
  }

  // Stable sort keeps declaration order within a priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}
