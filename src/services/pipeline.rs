//! Pipeline Controller
//!
//! Drives one analysis run across the panel:
//!
//! 1. INITIAL - every requested provider analyzes the content concurrently
//!    (via `futures_util::future::join_all`); failures are isolated per provider
//! 2. RETHINK - reserved, not invoked
//! 3. SYNTHESIS - the master provider consolidates the phase-1 successes
//!
//! The run aborts before any dispatch when a provider id is unknown or was
//! built for a different tier than requested, and after phase 1 when no
//! provider succeeded. Everything else degrades into
//! `ProviderError` entries on the result.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use panel_review_core::{ContentKind, Phase, ProviderError, ProviderResult};
use panel_review_llm::{AnalysisProvider, ImageInput, ProviderRequest};
use tracing::{debug, info, warn};

use crate::models::{AnalysisConfig, AnalysisTemplates, PipelineResult, PromptContext};
use crate::services::prompt::{self, TruncationPolicy};
use crate::services::registry::ProviderRegistry;
use crate::utils::error::{AppError, AppResult};

/// Runs analyses against a shared [`ProviderRegistry`].
#[derive(Debug, Clone)]
pub struct PipelineController<'a> {
    registry: &'a ProviderRegistry,
    truncation: TruncationPolicy,
}

impl<'a> PipelineController<'a> {
    pub fn new(registry: &'a ProviderRegistry) -> Self {
        Self {
            registry,
            truncation: TruncationPolicy::default(),
        }
    }

    pub fn with_truncation_policy(mut self, policy: TruncationPolicy) -> Self {
        self.truncation = policy;
        self
    }

    pub fn registry(&self) -> &'a ProviderRegistry {
        self.registry
    }

    /// Run phase 1 then synthesis for `config`.
    pub async fn run(
        &self,
        config: &AnalysisConfig,
        templates: &AnalysisTemplates,
        ctx: &PromptContext,
        images: &[ImageInput],
    ) -> AppResult<PipelineResult> {
        if config.providers.is_empty() {
            return Err(AppError::validation("at least one provider is required"));
        }
        if config.master_provider.trim().is_empty() {
            return Err(AppError::validation("master provider must not be empty"));
        }

        let ids = config.unique_providers();
        let resolved = self.registry.resolve_all(
            ids.iter()
                .map(String::as_str)
                .chain(std::iter::once(config.master_provider.as_str())),
        )?;
        let Some((master, panel)) = resolved.split_last() else {
            return Err(AppError::internal("provider resolution returned nothing"));
        };
        self.registry.check_tiers(
            ids.iter()
                .map(String::as_str)
                .chain(std::iter::once(config.master_provider.as_str())),
            &config.model_tiers,
        )?;

        info!(
            providers = ?ids,
            master = %config.master_provider,
            kind = %config.content_kind,
            images = images.len(),
            "pipeline: initial phase started"
        );

        let request = ProviderRequest::new(
            config.content_kind,
            prompt::system_prompt(&templates.initial, ctx),
            prompt::user_prompt(&templates.initial, &ctx.user_vars),
        )
        .with_images(images.to_vec());

        let (phase1, mut errors) = run_phase1(panel, &request).await;
        if phase1.is_empty() {
            warn!(failed = errors.len(), "pipeline: every provider failed in initial phase");
            return Err(all_providers_failed(&errors));
        }

        info!(
            succeeded = phase1.len(),
            failed = errors.len(),
            "pipeline: initial phase finished, synthesis started"
        );

        let synthesis = match self
            .run_synthesis(
                master.as_ref(),
                config.content_kind,
                templates,
                ctx,
                images,
                config.truncate_for_synthesis,
                &phase1,
            )
            .await
        {
            Ok(result) => Some(result),
            Err(e) => {
                errors.push(e);
                None
            }
        };

        let result = PipelineResult::new(phase1, synthesis, errors);
        info!(
            final_score = result.final_score,
            partial = result.has_partial_results,
            synthesized = result.synthesis_result.is_some(),
            "pipeline: completed"
        );
        Ok(result)
    }

    /// Ask `master` to consolidate `phase1`. A failure is returned as the
    /// synthesis-phase error to record, never as a fatal error.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn run_synthesis(
        &self,
        master: &dyn AnalysisProvider,
        kind: ContentKind,
        templates: &AnalysisTemplates,
        ctx: &PromptContext,
        images: &[ImageInput],
        truncate: bool,
        phase1: &BTreeMap<String, ProviderResult>,
    ) -> Result<ProviderResult, ProviderError> {
        let vars = prompt::synthesis_vars(ctx, truncate, &self.truncation);
        let request = ProviderRequest::new(
            kind,
            prompt::system_prompt(&templates.synthesis, ctx),
            prompt::user_prompt(&templates.synthesis, &vars),
        )
        .with_images(images.to_vec());

        let inputs: Vec<ProviderResult> = phase1.values().cloned().collect();
        debug!(
            master = master.id(),
            inputs = inputs.len(),
            truncate,
            "pipeline: dispatching synthesis"
        );

        master
            .synthesize(&request, &inputs)
            .await
            .map_err(|e| {
                warn!(master = master.id(), error = %e, "pipeline: synthesis failed");
                ProviderError::new(master.id(), Phase::Synthesis, e)
            })
    }
}

/// Call `analyze` on every provider concurrently. Each call settles on its own.
pub(crate) async fn run_phase1(
    providers: &[Arc<dyn AnalysisProvider>],
    request: &ProviderRequest,
) -> (BTreeMap<String, ProviderResult>, Vec<ProviderError>) {
    let calls = providers.iter().map(|provider| async move {
        let outcome = provider.analyze(request).await;
        (provider.id(), outcome)
    });

    let mut results = BTreeMap::new();
    let mut errors = Vec::new();
    for (id, outcome) in join_all(calls).await {
        match outcome {
            Ok(result) => {
                results.insert(id.to_string(), result);
            }
            Err(e) => errors.push(ProviderError::new(id, Phase::Initial, e)),
        }
    }
    (results, errors)
}

pub(crate) fn all_providers_failed(errors: &[ProviderError]) -> AppError {
    let reasons: Vec<String> = errors.iter().map(ToString::to_string).collect();
    AppError::AllProvidersFailed(reasons.join("; "))
}
