//! Utility Modules
//!
//! Shared error type and path helpers.

pub mod error;
pub mod paths;
