//! Data-fetch coordination for the UI.
//!
//! Many overlapping "give me data of kind K" requests from views become a
//! bounded number of actual fetches:
//!
//! - [`FetchRegistry`] maps each kind to the function that fetches it
//! - a worker runs one fetch attempt off the UI thread
//! - [`Coordinator`] serves short-lived cached values, merges concurrent
//!   callers onto one in-flight worker and fans the outcome out to all of
//!   them exactly once
//!
//! # Example
//!
//! ```ignore
//! let registry = FetchRegistry::new()
//!     .register("tools", move |_| {
//!         let api = api.clone();
//!         async move { api.list("tools", None).await }
//!     });
//! let coordinator = Coordinator::new(registry, Settings::default(), Handle::current());
//!
//! coordinator.fetch("tools", false, |tools| render(tools), |e| show_error(e));
//! let tools = coordinator.request("tools", false).await?;
//! ```

mod coordinator;
mod error;
mod events;
mod key;
mod registry;
mod worker;

pub use coordinator::{Coordinator, Settings, DEFAULT_TTL};
pub use error::FetchError;
pub use events::DataEvent;
pub use key::FetchKey;
pub use registry::FetchRegistry;
pub use worker::WorkerHandle;
