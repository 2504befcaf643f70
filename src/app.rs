use chrono::{DateTime, Local};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use serde_json::Value;
use std::io::stdout;
use tracing::{info, warn};

use crate::api::{kinds, ApiClient};
use crate::binding::{records, Notice, TableLoader};
use crate::config::Config;
use crate::event::{Action, Event, EventHandler, EventSender};
use crate::fetch::{Coordinator, DataEvent, FetchKey};
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::screens;
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{RecordView, TableView};

/// Outcome of the most recent fetch, for the header
#[derive(Debug, Clone)]
pub enum SyncStatus {
  Never,
  Synced {
    kind: String,
    records: usize,
    at: DateTime<Local>,
  },
  Failed {
    kind: String,
    reason: String,
    at: DateTime<Local>,
  },
}

/// A delete waiting for the user to confirm
#[derive(Debug, Clone)]
struct PendingDelete {
  kind: &'static str,
  id: Value,
}

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// `:` command prompt
  command: CommandInput,

  title: String,
  host: String,
  api: ApiClient,
  loader: TableLoader,

  /// Event sender for row buttons and async tasks
  events: EventSender,

  sync: SyncStatus,
  confirm: Option<PendingDelete>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: &Config, api: ApiClient, coordinator: Coordinator<Value>, events: EventSender) -> Self {
    let host = api.host();
    Self {
      view_stack: Vec::new(),
      command: CommandInput::new(),
      title: config.title.clone().unwrap_or_else(|| "fabdesk".to_string()),
      host,
      api,
      loader: TableLoader::new(coordinator),
      events,
      sync: SyncStatus::Never,
      confirm: None,
      should_quit: false,
    }
  }

  /// Replace the whole view stack with the screen for `kind`
  pub fn open(&mut self, kind: &str) {
    match screens::screen(kind, &self.events) {
      Some(screen) => {
        // Dropping the old views cancels their pending loads
        self.view_stack.clear();
        self
          .view_stack
          .push(Box::new(TableView::new(screen, self.loader.clone())));
      }
      None => self.notify(Notice::error(format!("Unknown screen: {}", kind))),
    }
  }

  pub async fn run(&mut self, mut events: EventHandler) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.main_loop(&mut terminal, &mut events).await;
    self.loader.coordinator().cancel_all();

    // Cleanup terminal, even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn main_loop<B: Backend>(
    &mut self,
    terminal: &mut Terminal<B>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {
        for view in &mut self.view_stack {
          view.tick();
        }
      }
      Event::Data(data) => self.handle_data(data),
      Event::Action(action) => self.handle_action(action),
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    if let Some(pending) = self.confirm.take() {
      if key.code == KeyCode::Char('y') {
        self.delete(pending.kind, pending.id);
      }
      return;
    }

    match self.command.handle_key(key) {
      KeyResult::Handled => return,
      KeyResult::Event(event) => {
        self.handle_command(event);
        return;
      }
      KeyResult::NotHandled => {}
    }

    let at_root = self.view_stack.len() <= 1;
    let Some(view) = self.view_stack.last_mut() else {
      if key.code == KeyCode::Char('q') {
        self.should_quit = true;
      }
      return;
    };

    match view.handle_key(key) {
      ViewAction::None => {}
      ViewAction::Pop if !at_root => {
        self.view_stack.pop();
      }
      // Only `q` leaves the app from the root view
      ViewAction::Pop => self.should_quit = key.code == KeyCode::Char('q'),
    }
  }

  fn handle_command(&mut self, event: CommandEvent) {
    match event {
      CommandEvent::Submitted(cmd) => match cmd.kind {
        Some(kind) => self.open(kind),
        None if cmd.name == "quit" => self.should_quit = true,
        None => {}
      },
      CommandEvent::Unknown(input) => {
        self.notify(Notice::error(format!("Unknown command: {}", input)));
      }
      CommandEvent::Cancelled => {}
    }
  }

  fn handle_data(&mut self, data: DataEvent<Value>) {
    let kind = data.kind().to_string();
    let at = Local::now();
    self.sync = match data {
      DataEvent::Updated { value, .. } => SyncStatus::Synced {
        kind,
        records: records(&value).len(),
        at,
      },
      DataEvent::Errored { error, .. } => SyncStatus::Failed {
        kind,
        reason: error.to_string(),
        at,
      },
    };
  }

  fn handle_action(&mut self, action: Action) {
    match action {
      Action::ShowRecord { title, record } => {
        self.view_stack.push(Box::new(RecordView::new(title, record)));
      }
      Action::Delete { kind, id } => {
        self.confirm = Some(PendingDelete { kind, id });
      }
      Action::Deleted { kind, id } => {
        // A fetch started before the delete committed would bring the row back
        let coordinator = self.loader.coordinator();
        coordinator.cancel_request(&FetchKey::new(kind));
        coordinator.clear_cache(Some(kind));
        for view in &mut self.view_stack {
          view.on_data_changed(kind);
        }
        let title = kinds::resource(kind).map_or(kind, |r| r.title);
        self.notify(Notice::info(format!("Deleted {} {}", title, id)));
      }
      Action::Failed(message) => self.notify(Notice::error(message)),
    }
  }

  /// Delete a record in the background; the outcome comes back as an action
  fn delete(&self, kind: &'static str, id: Value) {
    let Some(resource) = kinds::resource(kind) else {
      warn!(kind, "delete requested for unknown kind");
      return;
    };
    let api = self.api.clone();
    let tx = self.events.clone();

    tokio::spawn(async move {
      let action = match api.delete(resource.path, &id).await {
        Ok(()) => {
          info!(kind, %id, "record deleted");
          Action::Deleted { kind, id }
        }
        Err(e) => {
          warn!(kind, %id, "delete failed: {}", e);
          Action::Failed(e.to_string())
        }
      };
      let _ = tx.send(Event::Action(action));
    });
  }

  fn notify(&mut self, notice: Notice) {
    match self.view_stack.last_mut() {
      Some(view) => view.notify(notice),
      None => warn!("{}", notice.message),
    }
  }

  // Accessors for UI rendering
  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut (dyn View + 'static)> {
    self.view_stack.last_mut().map(|v| v.as_mut())
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn host(&self) -> &str {
    &self.host
  }

  pub fn in_flight(&self) -> usize {
    self.loader.coordinator().in_flight_count()
  }

  pub fn sync_status(&self) -> &SyncStatus {
    &self.sync
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command
  }

  pub fn confirm_prompt(&self) -> Option<String> {
    self.confirm.as_ref().map(|pending| {
      let title = kinds::resource(pending.kind).map_or(pending.kind, |r| r.title);
      format!("Delete {} {}?", title, pending.id)
    })
  }

  pub fn view_breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }
}
