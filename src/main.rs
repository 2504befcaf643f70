mod api;
mod app;
mod binding;
mod commands;
mod config;
mod event;
mod fetch;
mod logging;
mod ui;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

const TICK_RATE: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "fabdesk")]
#[command(about = "A terminal client for manufacturing data: tools, tasks, materials and sensor uploads")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/fabdesk/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// API root, overrides server.url from the config file
  #[arg(short, long)]
  server: Option<String>,

  /// Screen to open first
  #[arg(long, default_value = "tools")]
  screen: String,

  /// Print the records of one kind as JSON and exit
  #[arg(long, value_name = "KIND")]
  print: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let (_log_guard, log_dir) = logging::init()?;

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;
  if let Some(server) = args.server {
    config.server.url = server;
  }

  let api = api::ApiClient::new(&config.server.url)?;
  info!(server = %api.base_url(), logs = %log_dir.display(), "starting");

  let registry = api::kinds::registry(&api, &config.fetch);
  let coordinator =
    fetch::Coordinator::new(registry, config.coordinator_settings(), Handle::current());

  if let Some(kind) = args.print {
    return print_kind(&coordinator, &kind).await;
  }

  let events = event::EventHandler::new(TICK_RATE);
  events.forward(coordinator.subscribe());

  let screen = resolve_kind(&args.screen);

  // Initialize and run the app
  let mut app = app::App::new(&config, api, coordinator, events.sender());
  app.open(screen);
  app.run(events).await?;

  info!("exiting");
  Ok(())
}

/// Accept a command name (`tasks`) as well as a kind (`processing-tasks`)
fn resolve_kind(name: &str) -> &str {
  commands::find(name).and_then(|cmd| cmd.kind).unwrap_or(name)
}

async fn print_kind(coordinator: &fetch::Coordinator<Value>, name: &str) -> Result<()> {
  let kind = resolve_kind(name);
  let known = coordinator.kinds();
  if !known.contains(&kind) {
    return Err(eyre!("Unknown kind {}, expected one of: {}", kind, known.join(", ")));
  }

  let value = coordinator.request(kind, true).await?;
  println!("{}", serde_json::to_string_pretty(&value)?);
  Ok(())
}
