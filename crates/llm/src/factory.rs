//! Backend Factory
//!
//! Maps a [`ProviderConfig`] onto the concrete transport for its
//! [`BackendKind`], rejecting configurations that could never succeed.

use std::sync::Arc;

use panel_review_core::{CoreError, CoreResult};

use crate::anthropic::AnthropicProvider;
use crate::gemini::GeminiProvider;
use crate::openai::OpenAIProvider;
use crate::provider::LlmProvider;
use crate::types::{BackendKind, ProviderConfig};

/// Create a backend transport from a ProviderConfig.
///
/// Fails with a configuration error when the API key is missing, the model is
/// empty or `base_url` is not an absolute http(s) URL.
pub fn create_backend(config: ProviderConfig) -> CoreResult<Arc<dyn LlmProvider>> {
    let has_key = config
        .api_key
        .as_deref()
        .map(|k| !k.trim().is_empty())
        .unwrap_or(false);
    if !has_key {
        return Err(CoreError::config(format!(
            "API key not configured for {}",
            config.backend
        )));
    }

    if config.model.trim().is_empty() {
        return Err(CoreError::config(format!(
            "model not configured for {}",
            config.backend
        )));
    }

    if let Some(base_url) = config.base_url.as_deref() {
        validate_base_url(base_url)?;
    }

    let backend: Arc<dyn LlmProvider> = match config.backend {
        BackendKind::OpenAI => Arc::new(OpenAIProvider::new(config)?),
        BackendKind::Anthropic => Arc::new(AnthropicProvider::new(config)?),
        BackendKind::Gemini => Arc::new(GeminiProvider::new(config)?),
    };
    Ok(backend)
}

fn validate_base_url(base_url: &str) -> CoreResult<()> {
    let parsed = url::Url::parse(base_url)
        .map_err(|e| CoreError::config(format!("invalid base_url '{}': {}", base_url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(CoreError::config(format!(
            "invalid base_url '{}': unsupported scheme '{}'",
            base_url, other
        ))),
    }
}
