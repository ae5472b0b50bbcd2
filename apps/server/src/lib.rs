//! Patient records server
//!
//! Looks up patient documents across every collection of a document store,
//! builds manifests of the files those documents reference, and serves the
//! files individually or as a zip archive, never outside the export root.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod request_context;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;
