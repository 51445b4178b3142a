//! Panel Review Core
//!
//! Foundational error types and the validated assessment schema shared by the
//! Panel Review workspace. This crate has no dependency on transports, HTTP or
//! the orchestration layer.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `assessment` - Content kinds and the schema-validated `StructuredResult`
//! - `result` - Per-provider outcomes (`ProviderResult`, `ProviderError`, `Phase`)
//!
//! ## Design Principles
//!
//! 1. **Only serde + thiserror** - keeps the trust boundary small and auditable
//! 2. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod assessment;
pub mod error;
pub mod result;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Assessment Schema ──────────────────────────────────────────────────
pub use assessment::{
    CodeAssessment, ContentKind, ImageAssessment, Issue, Severity, StructuredResult, SCORE_MAX,
    SCORE_MIN,
};

// ── Provider Outcomes ──────────────────────────────────────────────────
pub use result::{Phase, ProviderError, ProviderResult};
