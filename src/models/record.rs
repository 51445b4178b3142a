//! Analysis Records
//!
//! The persisted form of a run, handed to an external storage collaborator and
//! fed back to the retry coordinator. Records are values: a retry produces a
//! new record and leaves its input untouched.

use chrono::{DateTime, Utc};
use panel_review_core::{ContentKind, Phase, StructuredResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::AnalysisConfig;
use super::pipeline::PipelineResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub analysis_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub content_kind: ContentKind,
    /// Master actually used for the latest synthesis
    pub master_provider: String,
    pub providers_used: Vec<String>,
    pub truncate_for_synthesis: bool,
    pub result: PipelineResult,
}

/// One row per successful provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCallRecord {
    pub analysis_id: Uuid,
    pub provider_id: String,
    pub phase: Phase,
    pub structured_result: StructuredResult,
    pub score: f64,
    pub tokens_used: u32,
    pub latency_ms: u64,
}

impl AnalysisRecord {
    /// Wrap a fresh pipeline result under a new analysis id.
    pub fn from_pipeline(config: &AnalysisConfig, result: PipelineResult) -> Self {
        Self {
            analysis_id: Uuid::new_v4(),
            created_at: Utc::now(),
            content_kind: config.content_kind,
            master_provider: config.master_provider.clone(),
            providers_used: config.unique_providers(),
            truncate_for_synthesis: config.truncate_for_synthesis,
            result,
        }
    }

    /// Outbound call rows, sorted by phase and then provider id.
    pub fn call_records(&self) -> Vec<ProviderCallRecord> {
        let phase1 = self
            .result
            .phase1_results
            .values()
            .map(|r| (Phase::Initial, r));
        let phase2 = self
            .result
            .phase2_results
            .values()
            .map(|r| (Phase::Rethink, r));
        let synthesis = self
            .result
            .synthesis_result
            .iter()
            .map(|r| (Phase::Synthesis, r));

        let mut records: Vec<ProviderCallRecord> = phase1
            .chain(phase2)
            .chain(synthesis)
            .map(|(phase, r)| ProviderCallRecord {
                analysis_id: self.analysis_id,
                provider_id: r.provider_id.clone(),
                phase,
                structured_result: r.result.clone(),
                score: r.score(),
                tokens_used: r.tokens_used,
                latency_ms: r.latency_ms,
            })
            .collect();
        records.sort_by(|a, b| {
            a.phase
                .cmp(&b.phase)
                .then_with(|| a.provider_id.cmp(&b.provider_id))
        });
        records
    }
}
