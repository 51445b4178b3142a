//! Retry Coordinator
//!
//! Re-executes the failed parts of a finished run and folds the outcome back
//! into its [`AnalysisRecord`].
//!
//! - `initial`: re-dispatch failed panel members (or their substitutes), merge
//!   the new successes over the old ones, then re-synthesize
//! - `synthesis`: re-run synthesis over the existing phase-1 successes,
//!   optionally on a different master
//!
//! Prompts are not stored on the record, so the caller passes the same
//! templates, context and images as the original run.

use std::collections::{HashMap, HashSet};

use panel_review_core::Phase;
use panel_review_llm::{ImageInput, ProviderRequest};
use tracing::{debug, info, warn};

use crate::models::{
    AnalysisRecord, AnalysisTemplates, PipelineResult, PromptContext, RetryPhase, RetryRequest,
};
use crate::services::pipeline::{all_providers_failed, run_phase1, PipelineController};
use crate::services::prompt;
use crate::utils::error::{AppError, AppResult};

/// Applies [`RetryRequest`]s using the same registry and truncation policy as
/// the controller it wraps.
#[derive(Debug, Clone)]
pub struct RetryCoordinator<'a> {
    pipeline: PipelineController<'a>,
}

impl<'a> RetryCoordinator<'a> {
    pub fn new(pipeline: PipelineController<'a>) -> Self {
        Self { pipeline }
    }

    /// Apply `request` to `record`, returning the updated record.
    ///
    /// The returned record keeps the id and creation time of the original.
    pub async fn retry(
        &self,
        record: &AnalysisRecord,
        request: &RetryRequest,
        templates: &AnalysisTemplates,
        ctx: &PromptContext,
        images: &[ImageInput],
    ) -> AppResult<AnalysisRecord> {
        if request.analysis_id != record.analysis_id {
            return Err(AppError::validation(format!(
                "retry targets analysis {} but record is {}",
                request.analysis_id, record.analysis_id
            )));
        }

        let master_id = request
            .new_master_provider
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(&record.master_provider);
        let truncate = request
            .truncate_for_synthesis
            .unwrap_or(record.truncate_for_synthesis);

        info!(
            analysis_id = %record.analysis_id,
            phase = ?request.phase,
            master = master_id,
            "retry: started"
        );

        let updated = match request.phase {
            RetryPhase::Initial => {
                self.retry_initial(record, request, master_id, truncate, templates, ctx, images)
                    .await?
            }
            RetryPhase::Synthesis => {
                self.retry_synthesis(record, request, master_id, truncate, templates, ctx, images)
                    .await?
            }
        };

        info!(
            analysis_id = %updated.analysis_id,
            final_score = updated.result.final_score,
            partial = updated.result.has_partial_results,
            "retry: completed"
        );
        Ok(updated)
    }

    #[allow(clippy::too_many_arguments)]
    async fn retry_initial(
        &self,
        record: &AnalysisRecord,
        request: &RetryRequest,
        master_id: &str,
        truncate: bool,
        templates: &AnalysisTemplates,
        ctx: &PromptContext,
        images: &[ImageInput],
    ) -> AppResult<AnalysisRecord> {
        if request.failed_providers.is_empty() {
            return Err(AppError::validation(
                "an initial retry needs at least one failed provider",
            ));
        }

        let mut seen = HashSet::new();
        let failed: Vec<&str> = request
            .failed_providers
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect();

        let mut substitutes: HashMap<&str, &str> = HashMap::new();
        for sub in &request.substitutions {
            if failed.contains(&sub.original.as_str()) {
                substitutes.insert(sub.original.as_str(), sub.substitute.as_str());
            } else {
                warn!(
                    original = %sub.original,
                    substitute = %sub.substitute,
                    "retry: substitution ignored, original was not retried"
                );
            }
        }

        // (original, provider actually dispatched in its place)
        let plan: Vec<(&str, &str)> = failed
            .iter()
            .map(|&original| (original, substitutes.get(original).copied().unwrap_or(original)))
            .collect();

        let mut dispatched = HashSet::new();
        let dispatch: Vec<&str> = plan
            .iter()
            .map(|&(_, sub)| sub)
            .filter(|sub| dispatched.insert(*sub))
            .collect();

        let resolved = self.pipeline.registry().resolve_all(
            dispatch
                .iter()
                .copied()
                .chain(std::iter::once(master_id)),
        )?;
        let Some((master, panel)) = resolved.split_last() else {
            return Err(AppError::internal("provider resolution returned nothing"));
        };

        debug!(dispatch = ?dispatch, "retry: re-running initial phase");
        let phase_request = ProviderRequest::new(
            record.content_kind,
            prompt::system_prompt(&templates.initial, ctx),
            prompt::user_prompt(&templates.initial, &ctx.user_vars),
        )
        .with_images(images.to_vec());
        let (new_results, new_errors) = run_phase1(panel, &phase_request).await;

        // Retried providers keep only their fresh outcome.
        let mut phase1 = record.result.phase1_results.clone();
        let mut providers_used = record.providers_used.clone();
        for &(original, substitute) in &plan {
            phase1.remove(original);
            phase1.remove(substitute);
            if new_results.contains_key(substitute) {
                replace_provider(&mut providers_used, original, substitute);
            }
        }
        phase1.extend(new_results);

        let mut errors: Vec<_> = record
            .result
            .errors
            .iter()
            .filter(|e| match e.phase {
                Phase::Initial => {
                    let id = e.provider_id.as_str();
                    !failed.contains(&id) && !dispatched.contains(id)
                }
                _ => false,
            })
            .cloned()
            .collect();
        errors.extend(new_errors);

        if phase1.is_empty() {
            warn!(analysis_id = %record.analysis_id, "retry: no successful providers after retry");
            return Err(all_providers_failed(&errors));
        }

        let synthesis = match self
            .pipeline
            .run_synthesis(
                master.as_ref(),
                record.content_kind,
                templates,
                ctx,
                images,
                truncate,
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

        Ok(AnalysisRecord {
            analysis_id: record.analysis_id,
            created_at: record.created_at,
            content_kind: record.content_kind,
            master_provider: master_id.to_string(),
            providers_used,
            truncate_for_synthesis: truncate,
            result: PipelineResult::new(phase1, synthesis, errors),
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn retry_synthesis(
        &self,
        record: &AnalysisRecord,
        request: &RetryRequest,
        master_id: &str,
        truncate: bool,
        templates: &AnalysisTemplates,
        ctx: &PromptContext,
        images: &[ImageInput],
    ) -> AppResult<AnalysisRecord> {
        if record.result.phase1_results.is_empty() {
            return Err(AppError::config(format!(
                "analysis {} has no initial results to synthesize",
                record.analysis_id
            )));
        }
        if !request.failed_providers.is_empty() {
            debug!(
                ignored = ?request.failed_providers,
                "retry: failed providers are ignored for a synthesis retry"
            );
        }

        let resolved = self
            .pipeline
            .registry()
            .resolve_all(std::iter::once(master_id))?;
        let Some(master) = resolved.first() else {
            return Err(AppError::internal("provider resolution returned nothing"));
        };

        let phase1 = record.result.phase1_results.clone();
        let mut errors: Vec<_> = record
            .result
            .errors
            .iter()
            .filter(|e| e.phase != Phase::Synthesis)
            .cloned()
            .collect();

        let synthesis = match self
            .pipeline
            .run_synthesis(
                master.as_ref(),
                record.content_kind,
                templates,
                ctx,
                images,
                truncate,
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

        Ok(AnalysisRecord {
            analysis_id: record.analysis_id,
            created_at: record.created_at,
            content_kind: record.content_kind,
            master_provider: master_id.to_string(),
            providers_used: record.providers_used.clone(),
            truncate_for_synthesis: truncate,
            result: PipelineResult::new(phase1, synthesis, errors),
        })
    }
}

/// Put `substitute` where `original` was, without introducing a duplicate.
fn replace_provider(providers: &mut Vec<String>, original: &str, substitute: &str) {
    let has_substitute = providers.iter().any(|p| p == substitute);
    match providers.iter().position(|p| p == original) {
        Some(idx) if has_substitute => {
            if original != substitute {
                providers.remove(idx);
            }
        }
        Some(idx) => providers[idx] = substitute.to_string(),
        None if !has_substitute => providers.push(substitute.to_string()),
        None => {}
    }
}
