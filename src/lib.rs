//! Panel Review - Multi-Backend Analysis Orchestration
//!
//! Submits content (source code or images) to several AI backends in
//! parallel, validates each structured assessment, and has one master
//! backend consolidate them. It includes:
//! - Provider registry built from the settings file
//! - Two-step pipeline (independent analysis, then synthesis)
//! - Retry and substitution of failed providers
//! - Persistence hand-off records

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use models::{
    AnalysisConfig, AnalysisRecord, AnalysisTemplates, PipelineResult, PromptContext,
    PromptTemplate, ProviderCallRecord, RetryPhase, RetryRequest, Substitution,
};
pub use services::{PipelineController, ProviderRegistry, RetryCoordinator, TruncationPolicy};
pub use storage::{BackendSettings, ConfigService, PanelSettings};
pub use utils::error::{AppError, AppResult};

pub use panel_review_core::{
    ContentKind, Phase, ProviderError, ProviderResult, StructuredResult,
};
pub use panel_review_llm::{ImageInput, ModelTier};
