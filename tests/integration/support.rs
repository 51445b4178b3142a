//! Scripted backends shared by the integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use panel_review::{AnalysisTemplates, PromptContext, PromptTemplate, ProviderRegistry};
use panel_review_llm::{
    BackendKind, LlmAnalysisProvider, LlmError, LlmProvider, LlmRequestOptions, LlmResponse,
    LlmResult, Message, ProviderConfig, StopReason, UsageStats,
};

/// Answers each call with the reply scripted for its phase.
pub struct ScriptedBackend {
    config: ProviderConfig,
    multimodal: bool,
    replies: Mutex<HashMap<String, LlmResult<String>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            config: ProviderConfig {
                backend: BackendKind::OpenAI,
                model: "scripted-model".to_string(),
                ..Default::default()
            },
            multimodal: true,
            replies: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn text_only(mut self) -> Self {
        self.multimodal = false;
        self
    }

    pub fn reply(self, phase: &str, text: impl Into<String>) -> Self {
        self.set_reply(phase, Ok(text.into()));
        self
    }

    pub fn fail(self, phase: &str) -> Self {
        self.set_reply(
            phase,
            Err(LlmError::ServerError {
                message: "overloaded".to_string(),
                status: Some(529),
            }),
        );
        self
    }

    pub fn set_reply(&self, phase: &str, reply: LlmResult<String>) {
        self.replies
            .lock()
            .unwrap()
            .insert(phase.to_string(), reply);
    }

    /// User prompts seen for `phase`, in call order.
    pub fn prompts(&self, phase: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == phase)
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn supports_multimodal(&self) -> bool {
        self.multimodal
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        _system: Option<String>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        let phase = request_options.analysis_phase.unwrap_or_default();
        let prompt = messages
            .first()
            .map(|m| m.text_content())
            .unwrap_or_default();
        self.calls.lock().unwrap().push((phase.clone(), prompt));

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(&phase)
            .cloned()
            .unwrap_or_else(|| {
                Err(LlmError::Other {
                    message: format!("no scripted reply for phase '{}'", phase),
                })
            })?;

        Ok(LlmResponse {
            content: Some(reply),
            stop_reason: StopReason::EndTurn,
            usage: UsageStats {
                input_tokens: 120,
                output_tokens: 30,
                thinking_tokens: None,
            },
            model: self.config.model.clone(),
        })
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

/// A valid code assessment with every category at `score`.
pub fn code_json(score: u32) -> String {
    format!(
        r#"{{
  "overallScore": {score},
  "categoryScores": {{"security": {score}, "performance": {score}, "maintainability": {score}, "readability": {score}}},
  "summary": "Scored {score}.",
  "issues": [{{"severity": "medium", "description": "Magic numbers", "line": 3}}],
  "strengths": ["Small functions"]
}}"#
    )
}

/// Register each backend under its id.
pub fn panel(backends: &[(&str, &Arc<ScriptedBackend>)]) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for (id, backend) in backends {
        let transport: Arc<dyn LlmProvider> = Arc::clone(*backend) as Arc<dyn LlmProvider>;
        registry = registry
            .with_provider(Arc::new(LlmAnalysisProvider::new(*id, transport)))
            .unwrap();
    }
    registry
}

pub fn templates() -> AnalysisTemplates {
    AnalysisTemplates {
        initial: PromptTemplate::new(
            "You are a meticulous code reviewer. Answer with JSON only.",
            "Review this {{language}} code:\n\n{{code}}",
        ),
        rethink: PromptTemplate::default(),
        synthesis: PromptTemplate::new(
            "You consolidate several code reviews into one.",
            "Original {{language}} code:\n\n{{code}}",
        ),
    }
}

pub fn context(code: &str) -> PromptContext {
    PromptContext::default()
        .with_var("language", "rust")
        .with_var("code", code)
}
