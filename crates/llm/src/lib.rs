//! Panel Review LLM
//!
//! Backend transports and the analysis capability built on top of them:
//! - OpenAI Chat Completions (and OpenAI-compatible vendors via `base_url`)
//! - Anthropic Messages
//! - Google Gemini `generateContent`
//!
//! Also includes the HTTP client factory, response extraction/repair, request
//! logging and the `AnalysisProvider` capability used by the pipeline.

pub mod anthropic;
pub mod extract;
pub mod factory;
pub mod gemini;
pub mod http_client;
pub mod openai;
pub mod provider;
pub mod request_log;
pub mod review;
pub mod types;

// Re-export main types
pub use anthropic::AnthropicProvider;
pub use extract::{extract_json, repair_json, ExtractStrategy, Extracted};
pub use factory::create_backend;
pub use gemini::GeminiProvider;
pub use http_client::build_http_client;
pub use openai::OpenAIProvider;
pub use provider::{missing_api_key_error, parse_http_error, LlmProvider};
pub use request_log::{RequestLogEntry, RequestLogSink, TracingRequestLog};
pub use review::{format_result_blocks, AnalysisProvider, LlmAnalysisProvider, ProviderRequest};
pub use types::*;
