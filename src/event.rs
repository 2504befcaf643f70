use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::fetch::DataEvent;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh and notice expiry
  Tick,
  /// The coordinator produced or failed to produce data
  Data(DataEvent<Value>),
  /// A row button or background task asked the app to do something
  Action(Action),
}

/// Requests raised outside the key handling path
#[derive(Debug, Clone)]
pub enum Action {
  /// Open a detail view for one record
  ShowRecord { title: String, record: Arc<Value> },
  /// Delete a record of `kind`
  Delete { kind: &'static str, id: Value },
  /// A record of `kind` was deleted
  Deleted { kind: &'static str, id: Value },
  /// A background operation failed
  Failed(String),
}

/// Cloneable handle for sending events into the app loop
pub type EventSender = mpsc::UnboundedSender<Event>;

/// Event handler that merges terminal input, a tick timer and coordinator
/// notifications into one stream
pub struct EventHandler {
  tx: EventSender,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // crossterm polling blocks, keep it off the async workers
    let input_tx = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      let event = match event::poll(tick_rate) {
        Ok(true) => match event::read() {
          Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Event::Key(key),
          Ok(_) => continue,
          Err(e) => {
            warn!("Failed to read terminal event: {}", e);
            continue;
          }
        },
        Ok(false) => Event::Tick,
        Err(e) => {
          warn!("Failed to poll terminal: {}", e);
          std::thread::sleep(tick_rate);
          Event::Tick
        }
      };
      if input_tx.send(event).is_err() {
        break;
      }
    });

    Self { tx, rx }
  }

  /// Sender for tasks and row buttons that report back to the app
  pub fn sender(&self) -> EventSender {
    self.tx.clone()
  }

  /// Forward coordinator notifications into the event stream
  pub fn forward(&self, mut notifications: broadcast::Receiver<DataEvent<Value>>) {
    let tx = self.tx.clone();
    tokio::spawn(async move {
      loop {
        match notifications.recv().await {
          Ok(data) => {
            if tx.send(Event::Data(data)).is_err() {
              break;
            }
          }
          Err(broadcast::error::RecvError::Lagged(skipped)) => {
            debug!(skipped, "data notifications lagged");
          }
          Err(broadcast::error::RecvError::Closed) => break,
        }
      }
    });
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
