mod client;
pub mod kinds;

pub use client::ApiClient;
