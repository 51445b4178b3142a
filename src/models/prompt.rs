//! Prompt Template Models
//!
//! Templates use `{{name}}` placeholders filled from a [`PromptContext`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A system prompt plus a user prompt template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptTemplate {
    pub system_prompt: String,
    pub user_prompt_template: String,
}

impl PromptTemplate {
    pub fn new(system_prompt: impl Into<String>, user_prompt_template: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt_template: user_prompt_template.into(),
        }
    }
}

/// One template per phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisTemplates {
    pub initial: PromptTemplate,
    pub rethink: PromptTemplate,
    pub synthesis: PromptTemplate,
}

/// Per-request prompt inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptContext {
    /// Appended to every system prompt after a blank line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_suffix: Option<String>,
    /// Placeholder values. Strings are inserted raw, anything else as JSON text.
    #[serde(default)]
    pub user_vars: BTreeMap<String, serde_json::Value>,
}

impl PromptContext {
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.user_vars.insert(name.into(), value.into());
        self
    }

    pub fn with_system_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.system_suffix = Some(suffix.into());
        self
    }
}
