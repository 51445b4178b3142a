//! Pipeline Result Model

use std::collections::BTreeMap;

use panel_review_core::{ProviderError, ProviderResult};
use serde::{Deserialize, Serialize};

/// Outcome of a full or partially retried run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    /// Successful phase-1 results keyed by provider id
    pub phase1_results: BTreeMap<String, ProviderResult>,
    /// Rethink results. Never populated by the default pipeline.
    #[serde(default)]
    pub phase2_results: BTreeMap<String, ProviderResult>,
    pub synthesis_result: Option<ProviderResult>,
    pub final_score: f64,
    pub errors: Vec<ProviderError>,
    pub has_partial_results: bool,
}

impl PipelineResult {
    /// Assemble a result, deriving the final score and partial flag.
    pub fn new(
        phase1_results: BTreeMap<String, ProviderResult>,
        synthesis_result: Option<ProviderResult>,
        errors: Vec<ProviderError>,
    ) -> Self {
        let final_score = final_score(synthesis_result.as_ref(), &phase1_results);
        Self {
            phase1_results,
            phase2_results: BTreeMap::new(),
            synthesis_result,
            final_score,
            has_partial_results: !errors.is_empty(),
            errors,
        }
    }
}

/// Synthesis score if present, else the rounded mean of phase-1 scores, else 0.
pub fn final_score(
    synthesis: Option<&ProviderResult>,
    phase1: &BTreeMap<String, ProviderResult>,
) -> f64 {
    if let Some(s) = synthesis {
        return s.score();
    }
    if phase1.is_empty() {
        return 0.0;
    }
    let sum: f64 = phase1.values().map(ProviderResult::score).sum();
    (sum / phase1.len() as f64).round()
}
