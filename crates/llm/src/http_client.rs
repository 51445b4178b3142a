//! HTTP Client Factory
//!
//! Provides a factory function for building the reqwest client every backend
//! transport shares.

use std::time::Duration;

use panel_review_core::{CoreError, CoreResult};

/// Build a `reqwest::Client` whose whole-request timeout is `timeout`.
///
/// Proxy settings from the environment are honoured.
pub fn build_http_client(timeout: Duration) -> CoreResult<reqwest::Client> {
    if timeout.is_zero() {
        return Err(CoreError::config("request timeout must be greater than zero"));
    }
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CoreError::config(format!("failed to build HTTP client: {}", e)))
}
