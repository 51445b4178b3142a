//! Analysis Request Models
//!
//! What a caller submits to start a run or to retry part of one.

use std::collections::HashMap;

use panel_review_core::ContentKind;
use panel_review_llm::ModelTier;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Configuration of a single analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisConfig {
    /// Registry ids of the panel members. Must be non-empty.
    pub providers: Vec<String>,
    /// Registry id of the provider that synthesizes the panel's results
    pub master_provider: String,
    #[serde(default)]
    pub content_kind: ContentKind,
    /// Per-provider tier choice. The registry must have been built with the
    /// same tier for each listed provider, otherwise the run is rejected.
    #[serde(default)]
    pub model_tiers: HashMap<String, ModelTier>,
    /// Cut the designated prompt variable before synthesis
    #[serde(default)]
    pub truncate_for_synthesis: bool,
}

impl AnalysisConfig {
    pub fn new(providers: Vec<String>, master_provider: impl Into<String>) -> Self {
        Self {
            providers,
            master_provider: master_provider.into(),
            content_kind: ContentKind::Code,
            model_tiers: HashMap::new(),
            truncate_for_synthesis: false,
        }
    }

    pub fn with_content_kind(mut self, kind: ContentKind) -> Self {
        self.content_kind = kind;
        self
    }

    pub fn with_truncation(mut self, truncate: bool) -> Self {
        self.truncate_for_synthesis = truncate;
        self
    }

    /// Providers with duplicates collapsed, first-seen order kept.
    pub fn unique_providers(&self) -> Vec<String> {
        let mut seen = Vec::with_capacity(self.providers.len());
        for id in &self.providers {
            if !seen.contains(id) {
                seen.push(id.clone());
            }
        }
        seen
    }
}

/// Which part of a run a retry re-executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryPhase {
    Initial,
    Synthesis,
}

/// Run `substitute` in place of the failed `original`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Substitution {
    pub original: String,
    pub substitute: String,
}

/// Caller-initiated retry of the failed parts of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryRequest {
    pub analysis_id: Uuid,
    #[serde(default)]
    pub failed_providers: Vec<String>,
    pub phase: RetryPhase,
    #[serde(default)]
    pub substitutions: Vec<Substitution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_master_provider: Option<String>,
    /// Overrides the record's flag when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncate_for_synthesis: Option<bool>,
}

impl RetryRequest {
    /// Retry the given phase-1 failures with no substitutions.
    pub fn initial(analysis_id: Uuid, failed_providers: Vec<String>) -> Self {
        Self {
            analysis_id,
            failed_providers,
            phase: RetryPhase::Initial,
            substitutions: Vec::new(),
            new_master_provider: None,
            truncate_for_synthesis: None,
        }
    }

    /// Re-run synthesis only.
    pub fn synthesis(analysis_id: Uuid) -> Self {
        Self {
            analysis_id,
            failed_providers: Vec::new(),
            phase: RetryPhase::Synthesis,
            substitutions: Vec::new(),
            new_master_provider: None,
            truncate_for_synthesis: None,
        }
    }

    pub fn with_substitution(
        mut self,
        original: impl Into<String>,
        substitute: impl Into<String>,
    ) -> Self {
        self.substitutions.push(Substitution {
            original: original.into(),
            substitute: substitute.into(),
        });
        self
    }

    pub fn with_master(mut self, master: impl Into<String>) -> Self {
        self.new_master_provider = Some(master.into());
        self
    }
}
