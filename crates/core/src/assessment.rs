//! Structured Assessment Schema
//!
//! The trust boundary between free-form backend text and typed results.
//! A backend's parsed JSON is only accepted as a [`StructuredResult`] after it
//! deserializes into the schema for its [`ContentKind`] and every score lies
//! within `[SCORE_MIN, SCORE_MAX]`. Nothing is coerced: a string where a
//! number is expected, a missing category or an out-of-range score is a
//! validation error.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// Lowest admissible score.
pub const SCORE_MIN: f64 = 0.0;

/// Highest admissible score.
pub const SCORE_MAX: f64 = 100.0;

/// What kind of content is being assessed. Selects the result schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Code,
    Image,
}

impl ContentKind {
    /// Category score keys every assessment of this kind must carry.
    pub fn required_categories(&self) -> &'static [&'static str] {
        match self {
            ContentKind::Code => &["security", "performance", "maintainability", "readability"],
            ContentKind::Image => &["composition", "clarity", "accessibility", "consistency"],
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Code => write!(f, "code"),
            ContentKind::Image => write!(f, "image"),
        }
    }
}

/// Severity of a single code issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// One finding in a code assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Assessment of source code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeAssessment {
    pub provider_id: String,
    pub overall_score: f64,
    pub category_scores: BTreeMap<String, f64>,
    pub summary: String,
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Assessment of one or more images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAssessment {
    pub provider_id: String,
    pub overall_score: f64,
    pub category_scores: BTreeMap<String, f64>,
    pub summary: String,
    pub observations: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// A schema-validated backend result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StructuredResult {
    Code(CodeAssessment),
    Image(ImageAssessment),
}

impl StructuredResult {
    /// Validate untrusted parsed JSON against the schema for `kind`.
    ///
    /// `providerId` is overwritten with `provider_id` before validation, so
    /// whatever identifier the backend emitted is discarded.
    pub fn validate(kind: ContentKind, provider_id: &str, value: Value) -> CoreResult<Self> {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Err(CoreError::validation(format!(
                    "{} assessment must be a JSON object, got {}",
                    kind,
                    json_type_name(&other)
                )))
            }
        };
        map.insert(
            "providerId".to_string(),
            Value::String(provider_id.to_string()),
        );
        let value = Value::Object(map);

        let result = match kind {
            ContentKind::Code => serde_json::from_value::<CodeAssessment>(value).map(Self::Code),
            ContentKind::Image => {
                serde_json::from_value::<ImageAssessment>(value).map(Self::Image)
            }
        }
        .map_err(|e| {
            CoreError::validation(format!("{} assessment does not match schema: {}", kind, e))
        })?;

        result.check_bounds()?;
        Ok(result)
    }

    fn check_bounds(&self) -> CoreResult<()> {
        check_score("overallScore", self.overall_score())?;

        let categories = self.category_scores();
        for required in self.kind().required_categories() {
            if !categories.contains_key(*required) {
                return Err(CoreError::validation(format!(
                    "categoryScores is missing required field '{}'",
                    required
                )));
            }
        }
        for (name, score) in categories {
            check_score(&format!("categoryScores.{}", name), *score)?;
        }
        Ok(())
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            StructuredResult::Code(_) => ContentKind::Code,
            StructuredResult::Image(_) => ContentKind::Image,
        }
    }

    pub fn provider_id(&self) -> &str {
        match self {
            StructuredResult::Code(a) => &a.provider_id,
            StructuredResult::Image(a) => &a.provider_id,
        }
    }

    pub fn overall_score(&self) -> f64 {
        match self {
            StructuredResult::Code(a) => a.overall_score,
            StructuredResult::Image(a) => a.overall_score,
        }
    }

    pub fn category_scores(&self) -> &BTreeMap<String, f64> {
        match self {
            StructuredResult::Code(a) => &a.category_scores,
            StructuredResult::Image(a) => &a.category_scores,
        }
    }

    pub fn summary(&self) -> &str {
        match self {
            StructuredResult::Code(a) => &a.summary,
            StructuredResult::Image(a) => &a.summary,
        }
    }
}

fn check_score(field: &str, score: f64) -> CoreResult<()> {
    if !score.is_finite() || !(SCORE_MIN..=SCORE_MAX).contains(&score) {
        return Err(CoreError::validation(format!(
            "{} = {} is outside [{}, {}]",
            field, score, SCORE_MIN, SCORE_MAX
        )));
    }
    Ok(())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
