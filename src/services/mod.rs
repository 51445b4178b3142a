//! Services
//!
//! Orchestration logic: provider registry, prompt rendering, the analysis
//! pipeline and the retry protocol.

pub mod pipeline;
pub mod prompt;
pub mod registry;
pub mod retry;


pub use pipeline::PipelineController;
pub use prompt::TruncationPolicy;
pub use registry::ProviderRegistry;
pub use retry::RetryCoordinator;
