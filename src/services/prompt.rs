//! Prompt Rendering
//!
//! Fills `{{name}}` placeholders from a [`PromptContext`] and applies the
//! synthesis truncation policy. Unknown placeholders stay verbatim.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::models::{PromptContext, PromptTemplate};

/// Appended to a variable cut for synthesis.
pub const TRUNCATION_MARKER: &str = "\n\n[... truncated for synthesis ...]";

/// Variable cut by default.
pub const DEFAULT_TRUNCATION_VARIABLE: &str = "code";

/// Character budget for the cut variable.
pub const DEFAULT_TRUNCATION_BUDGET: usize = 12_000;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("placeholder pattern compiles"));

/// Which variable is cut before synthesis, and to how many characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncationPolicy {
    pub variable: String,
    pub max_chars: usize,
}

impl Default for TruncationPolicy {
    fn default() -> Self {
        Self {
            variable: DEFAULT_TRUNCATION_VARIABLE.to_string(),
            max_chars: DEFAULT_TRUNCATION_BUDGET,
        }
    }
}

/// Substitute `{{name}}` placeholders.
pub fn render(template: &str, vars: &BTreeMap<String, Value>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| match vars.get(&caps[1]) {
            Some(value) => value_text(value).into_owned(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Template system prompt plus the context's suffix, separated by a blank line.
pub fn system_prompt(template: &PromptTemplate, ctx: &PromptContext) -> String {
    match ctx.system_suffix.as_deref().filter(|s| !s.is_empty()) {
        Some(suffix) if template.system_prompt.is_empty() => suffix.to_string(),
        Some(suffix) => format!("{}\n\n{}", template.system_prompt, suffix),
        None => template.system_prompt.clone(),
    }
}

/// Rendered user prompt for `template`.
pub fn user_prompt(template: &PromptTemplate, vars: &BTreeMap<String, Value>) -> String {
    render(&template.user_prompt_template, vars)
}

/// Context variables for the synthesis prompt, with the policy's variable cut
/// when `truncate` is set.
pub fn synthesis_vars<'a>(
    ctx: &'a PromptContext,
    truncate: bool,
    policy: &TruncationPolicy,
) -> Cow<'a, BTreeMap<String, Value>> {
    if !truncate {
        return Cow::Borrowed(&ctx.user_vars);
    }
    let Some(value) = ctx.user_vars.get(&policy.variable) else {
        return Cow::Borrowed(&ctx.user_vars);
    };
    match truncate_chars(&value_text(value), policy.max_chars) {
        Cow::Borrowed(_) => Cow::Borrowed(&ctx.user_vars),
        Cow::Owned(cut) => {
            let mut vars = ctx.user_vars.clone();
            vars.insert(policy.variable.clone(), Value::String(cut));
            Cow::Owned(vars)
        }
    }
}

/// Cut `text` to `max_chars` characters plus [`TRUNCATION_MARKER`].
pub fn truncate_chars(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => Cow::Owned(format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER)),
        None => Cow::Borrowed(text),
    }
}

fn value_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}
