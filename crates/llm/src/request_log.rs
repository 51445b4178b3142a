//! Request Logging
//!
//! Every backend exchange is handed to a [`RequestLogSink`] right after the
//! transport returns, before the response is parsed, so the raw text is
//! captured even when extraction later fails. Sinks are best effort: the
//! caller logs a sink failure and carries on.

use tracing::{info, warn};

use crate::types::LlmResult;

/// Characters of prompt/response text included in tracing fields.
pub const LOG_PREVIEW_CHARS: usize = 300;

/// One completed backend exchange.
#[derive(Debug, Clone)]
pub struct RequestLogEntry<'a> {
    pub provider_id: &'a str,
    pub model: &'a str,
    pub phase: &'a str,
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub image_count: usize,
    /// Raw response text, when the transport succeeded
    pub response_text: Option<&'a str>,
    /// Transport error text, when it failed
    pub error: Option<String>,
    pub tokens_used: u32,
    pub latency_ms: u64,
}

/// Destination for request/response records. Must not block.
pub trait RequestLogSink: Send + Sync {
    fn record(&self, entry: &RequestLogEntry<'_>) -> LlmResult<()>;
}

/// Default sink: writes each exchange through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRequestLog;

impl RequestLogSink for TracingRequestLog {
    fn record(&self, entry: &RequestLogEntry<'_>) -> LlmResult<()> {
        match (&entry.response_text, &entry.error) {
            (_, Some(error)) => warn!(
                provider = entry.provider_id,
                model = entry.model,
                phase = entry.phase,
                latency_ms = entry.latency_ms,
                error = %error,
                "backend request failed"
            ),
            (response, None) => info!(
                provider = entry.provider_id,
                model = entry.model,
                phase = entry.phase,
                latency_ms = entry.latency_ms,
                tokens = entry.tokens_used,
                images = entry.image_count,
                prompt_len = entry.user_prompt.len(),
                prompt_preview = %preview(entry.user_prompt),
                response_preview = %preview(response.unwrap_or("")),
                "backend request completed"
            ),
        }
        Ok(())
    }
}

pub(crate) fn preview(text: &str) -> String {
    text.chars().take(LOG_PREVIEW_CHARS).collect()
}
