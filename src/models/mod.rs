//! Data Models
//!
//! Request, result and record types exchanged with callers.

pub mod config;
pub mod pipeline;
pub mod prompt;
pub mod record;

pub use config::*;
pub use pipeline::*;
pub use prompt::*;
pub use record::*;
