//! Analysis Provider
//!
//! The capability every panel member exposes to the orchestration layer:
//! `analyze`, `rethink` and `synthesize`. Each call is one backend round trip
//! whose free-text answer is turned into a schema-validated [`ProviderResult`]
//! tagged with the provider's own id.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use panel_review_core::{ContentKind, Phase, ProviderResult, StructuredResult};
use tracing::{debug, info, warn};

use crate::extract::extract_json;
use crate::provider::LlmProvider;
use crate::request_log::{RequestLogEntry, RequestLogSink};
use crate::types::{ImageInput, LlmError, LlmRequestOptions, LlmResult, Message, ModelTier};

/// Everything one provider call needs. Prompts arrive already rendered.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub kind: ContentKind,
    pub system_prompt: String,
    pub user_prompt: String,
    pub images: Vec<ImageInput>,
}

impl ProviderRequest {
    pub fn new(
        kind: ContentKind,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            images: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<ImageInput>) -> Self {
        self.images = images;
        self
    }
}

/// A panel member.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Registry id. Every result this provider produces carries it.
    fn id(&self) -> &str;

    /// Concrete model id behind this provider.
    fn model(&self) -> &str;

    /// Tier the model was resolved from, when built from settings.
    fn tier(&self) -> Option<ModelTier> {
        None
    }

    /// Independent assessment of the content.
    async fn analyze(&self, request: &ProviderRequest) -> LlmResult<ProviderResult>;

    /// Revise `own_previous` after reading the other panel members' results.
    async fn rethink(
        &self,
        request: &ProviderRequest,
        own_previous: &ProviderResult,
        others: &[ProviderResult],
    ) -> LlmResult<ProviderResult>;

    /// Consolidate every panel result into one.
    async fn synthesize(
        &self,
        request: &ProviderRequest,
        all_results: &[ProviderResult],
    ) -> LlmResult<ProviderResult>;
}

/// [`AnalysisProvider`] backed by an [`LlmProvider`] transport.
pub struct LlmAnalysisProvider {
    id: String,
    backend: Arc<dyn LlmProvider>,
    tier: Option<ModelTier>,
    log_sink: Option<Arc<dyn RequestLogSink>>,
}

impl LlmAnalysisProvider {
    pub fn new(id: impl Into<String>, backend: Arc<dyn LlmProvider>) -> Self {
        Self {
            id: id.into(),
            backend,
            tier: None,
            log_sink: None,
        }
    }

    pub fn with_tier(mut self, tier: ModelTier) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn RequestLogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    async fn call(
        &self,
        phase: Phase,
        request: &ProviderRequest,
        user_prompt: String,
    ) -> LlmResult<ProviderResult> {
        let message = if request.images.is_empty() {
            Message::user(user_prompt.as_str())
        } else if self.backend.supports_multimodal() {
            Message::user_with_images(user_prompt.as_str(), &request.images)
        } else {
            return Err(LlmError::InvalidRequest {
                message: format!("{} does not accept image content", self.backend.name()),
            });
        };

        let system = if request.system_prompt.trim().is_empty() {
            None
        } else {
            Some(request.system_prompt.clone())
        };

        debug!(
            provider = %self.id,
            phase = %phase,
            prompt_len = user_prompt.len(),
            images = request.images.len(),
            "provider call dispatched"
        );

        let started = Instant::now();
        let outcome = self
            .backend
            .send_message(
                vec![message],
                system,
                LlmRequestOptions::for_phase(phase.as_str()),
            )
            .await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        self.log_exchange(phase, request, &user_prompt, &outcome, latency_ms);

        let response = outcome.map_err(|e| {
            warn!(provider = %self.id, phase = %phase, latency_ms, error = %e, "provider call failed");
            e
        })?;

        let extracted = extract_json(response.text())?;
        let result = StructuredResult::validate(request.kind, &self.id, extracted.value)
            .map_err(LlmError::from)?;
        let tokens_used = response.usage.total_tokens();

        info!(
            provider = %self.id,
            phase = %phase,
            latency_ms,
            tokens = tokens_used,
            score = result.overall_score(),
            "provider call succeeded"
        );

        Ok(ProviderResult {
            provider_id: self.id.clone(),
            result,
            tokens_used,
            latency_ms,
        })
    }

    fn log_exchange(
        &self,
        phase: Phase,
        request: &ProviderRequest,
        user_prompt: &str,
        outcome: &LlmResult<crate::types::LlmResponse>,
        latency_ms: u64,
    ) {
        let Some(sink) = self.log_sink.as_ref() else {
            return;
        };
        let entry = RequestLogEntry {
            provider_id: &self.id,
            model: self.backend.model(),
            phase: phase.as_str(),
            system_prompt: &request.system_prompt,
            user_prompt,
            image_count: request.images.len(),
            response_text: outcome.as_ref().ok().map(|r| r.text()),
            error: outcome.as_ref().err().map(|e| e.to_string()),
            tokens_used: outcome
                .as_ref()
                .map(|r| r.usage.total_tokens())
                .unwrap_or(0),
            latency_ms,
        };
        if let Err(e) = sink.record(&entry) {
            warn!(provider = %self.id, phase = %phase, error = %e, "request log sink failed");
        }
    }
}

#[async_trait]
impl AnalysisProvider for LlmAnalysisProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn model(&self) -> &str {
        self.backend.model()
    }

    fn tier(&self) -> Option<ModelTier> {
        self.tier
    }

    async fn analyze(&self, request: &ProviderRequest) -> LlmResult<ProviderResult> {
        self.call(Phase::Initial, request, request.user_prompt.clone())
            .await
    }

    async fn rethink(
        &self,
        request: &ProviderRequest,
        own_previous: &ProviderResult,
        others: &[ProviderResult],
    ) -> LlmResult<ProviderResult> {
        let prompt = format!(
            "{}\n\n## Your previous assessment\n\n{}\n\n## Other assessments\n\n{}",
            request.user_prompt,
            format_result_blocks(std::slice::from_ref(own_previous))?,
            format_result_blocks(others)?
        );
        self.call(Phase::Rethink, request, prompt).await
    }

    async fn synthesize(
        &self,
        request: &ProviderRequest,
        all_results: &[ProviderResult],
    ) -> LlmResult<ProviderResult> {
        let prompt = format!(
            "{}\n\n## Independent assessments\n\n{}",
            request.user_prompt,
            format_result_blocks(all_results)?
        );
        self.call(Phase::Synthesis, request, prompt).await
    }
}

/// Render results as labeled fenced JSON blocks, one per provider.
pub fn format_result_blocks(results: &[ProviderResult]) -> LlmResult<String> {
    let mut blocks = Vec::with_capacity(results.len());
    for r in results {
        let json = serde_json::to_string_pretty(&r.result).map_err(|e| LlmError::Other {
            message: format!("failed to serialize result from {}: {}", r.provider_id, e),
        })?;
        blocks.push(format!("### {}\n```json\n{}\n```", r.provider_id, json));
    }
    Ok(blocks.join("\n\n"))
}
