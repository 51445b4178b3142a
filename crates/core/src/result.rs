//! Provider Outcomes
//!
//! What a single provider call leaves behind: either a validated
//! [`ProviderResult`] or a [`ProviderError`] tagged with the phase it failed in.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::assessment::StructuredResult;

/// Pipeline phase a call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Initial,
    Rethink,
    Synthesis,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Initial => "initial",
            Phase::Rethink => "rethink",
            Phase::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful, schema-validated provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
    pub provider_id: String,
    pub result: StructuredResult,
    pub tokens_used: u32,
    pub latency_ms: u64,
}

impl ProviderResult {
    pub fn score(&self) -> f64 {
        self.result.overall_score()
    }
}

/// A failed provider call. Only the display text of the cause is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderError {
    pub provider_id: String,
    pub phase: Phase,
    pub error: String,
}

impl ProviderError {
    pub fn new(provider_id: impl Into<String>, phase: Phase, error: impl fmt::Display) -> Self {
        Self {
            provider_id: provider_id.into(),
            phase,
            error: error.to_string(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider_id, self.error)
    }
}
