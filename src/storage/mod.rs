//! Storage Layer
//!
//! Settings file handling. Analysis records are persisted by the embedding
//! application, not here.

pub mod config;

pub use config::{BackendSettings, ConfigService, PanelSettings};
