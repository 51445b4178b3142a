//! Pipeline Integration Tests
//!
//! Runs the full initial + synthesis flow through scripted backends:
//! - partial failure aggregation and the final score law
//! - fatal all-failed and unknown-provider errors
//! - truncation of the synthesis prompt
//! - free-text responses (fences, prose, cut-off JSON, schema violations)

use std::collections::HashMap;
use std::sync::Arc;

use panel_review::services::prompt::TRUNCATION_MARKER;
use panel_review::{
    AnalysisConfig, AnalysisRecord, AppError, ImageInput, ModelTier, Phase, PipelineController,
    ProviderRegistry,
};
use panel_review_llm::{LlmAnalysisProvider, LlmProvider};

use crate::support::{code_json, context, panel, templates, ScriptedBackend};

// ============================================================================
// Aggregation
// ============================================================================

#[tokio::test]
async fn test_partial_failure_keeps_successes() {
    let p1 = Arc::new(
        ScriptedBackend::new()
            .reply("initial", code_json(70))
            .reply("synthesis", code_json(75)),
    );
    let p2 = Arc::new(ScriptedBackend::new().fail("initial"));
    let p3 = Arc::new(ScriptedBackend::new().reply("initial", code_json(90)));
    let registry = panel(&[("p1", &p1), ("p2", &p2), ("p3", &p3)]);

    let config = AnalysisConfig::new(vec!["p1".into(), "p2".into(), "p3".into()], "p1");
    let result = PipelineController::new(&registry)
        .run(&config, &templates(), &context("fn main() {}"), &[])
        .await
        .unwrap();

    assert_eq!(result.phase1_results.len(), 2);
    assert!(result.phase1_results.contains_key("p1"));
    assert!(result.phase1_results.contains_key("p3"));
    assert!(result.phase2_results.is_empty());
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].provider_id, "p2");
    assert_eq!(result.errors[0].phase, Phase::Initial);
    assert!(result.errors[0].error.contains("529"));
    assert!(result.has_partial_results);

    let synthesis = result.synthesis_result.as_ref().unwrap();
    assert_eq!(synthesis.provider_id, "p1");
    assert_eq!(result.final_score, 75.0);
    assert_eq!(synthesis.tokens_used, 150);
}

#[tokio::test]
async fn test_synthesis_failure_uses_rounded_mean() {
    let p1 = Arc::new(
        ScriptedBackend::new()
            .reply("initial", code_json(70))
            .fail("synthesis"),
    );
    let p2 = Arc::new(ScriptedBackend::new().reply("initial", code_json(90)));
    let registry = panel(&[("p1", &p1), ("p2", &p2)]);

    let config = AnalysisConfig::new(vec!["p1".into(), "p2".into()], "p1");
    let result = PipelineController::new(&registry)
        .run(&config, &templates(), &context("fn main() {}"), &[])
        .await
        .unwrap();

    assert!(result.synthesis_result.is_none());
    assert_eq!(result.final_score, 80.0);
    assert!(result.has_partial_results);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].phase, Phase::Synthesis);
}

#[tokio::test]
async fn test_clean_run_is_not_partial() {
    let p1 = Arc::new(
        ScriptedBackend::new()
            .reply("initial", code_json(64))
            .reply("synthesis", code_json(66)),
    );
    let registry = panel(&[("p1", &p1)]);

    let config = AnalysisConfig::new(vec!["p1".into()], "p1");
    let result = PipelineController::new(&registry)
        .run(&config, &templates(), &context("fn main() {}"), &[])
        .await
        .unwrap();

    assert!(result.errors.is_empty());
    assert!(!result.has_partial_results);
    assert_eq!(result.final_score, 66.0);

    let record = AnalysisRecord::from_pipeline(&config, result);
    let rows = record.call_records();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].phase, Phase::Initial);
    assert_eq!(rows[1].phase, Phase::Synthesis);
    assert!(rows.iter().all(|r| r.analysis_id == record.analysis_id));
}

#[tokio::test]
async fn test_all_failed_names_every_provider() {
    let p1 = Arc::new(ScriptedBackend::new().fail("initial"));
    let p2 = Arc::new(ScriptedBackend::new().reply("initial", "I'd rather not."));
    let registry = panel(&[("p1", &p1), ("p2", &p2)]);

    let config = AnalysisConfig::new(vec!["p1".into(), "p2".into()], "p1");
    let err = PipelineController::new(&registry)
        .run(&config, &templates(), &context("fn main() {}"), &[])
        .await
        .unwrap_err();

    match err {
        AppError::AllProvidersFailed(msg) => {
            assert!(msg.contains("p1: Server error (529)"));
            assert!(msg.contains("p2: Parse error"));
        }
        other => panic!("Expected AllProvidersFailed, got {:?}", other),
    }
    // synthesis never ran
    assert!(p1.prompts("synthesis").is_empty());
}

#[tokio::test]
async fn test_unknown_providers_reported_before_dispatch() {
    let p1 = Arc::new(ScriptedBackend::new().reply("initial", code_json(50)));
    let registry = panel(&[("p1", &p1)]);

    let config = AnalysisConfig::new(vec!["p1".into(), "ghost".into()], "phantom");
    let err = PipelineController::new(&registry)
        .run(&config, &templates(), &context("fn main() {}"), &[])
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    let msg = err.to_string();
    assert!(msg.contains("ghost"));
    assert!(msg.contains("phantom"));
    assert_eq!(p1.call_count(), 0);
}

#[tokio::test]
async fn test_requested_tier_must_match_registered_tier() {
    let claude = Arc::new(
        ScriptedBackend::new()
            .reply("initial", code_json(70))
            .reply("synthesis", code_json(70)),
    );
    let transport: Arc<dyn LlmProvider> = Arc::clone(&claude) as Arc<dyn LlmProvider>;
    let registry = ProviderRegistry::new()
        .with_provider(Arc::new(
            LlmAnalysisProvider::new("claude", transport).with_tier(ModelTier::Tier2),
        ))
        .unwrap();
    let controller = PipelineController::new(&registry);

    let mut config = AnalysisConfig::new(vec!["claude".into()], "claude");
    config.model_tiers = HashMap::from([("claude".to_string(), ModelTier::Tier1)]);
    let err = controller
        .run(&config, &templates(), &context("fn main() {}"), &[])
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    assert!(err.to_string().contains("tier1"));
    assert!(err.to_string().contains("scripted-model"));
    assert_eq!(claude.call_count(), 0);

    config.model_tiers.insert("claude".to_string(), ModelTier::Tier2);
    let result = controller
        .run(&config, &templates(), &context("fn main() {}"), &[])
        .await
        .unwrap();
    assert_eq!(result.final_score, 70.0);
}

// ============================================================================
// Prompts
// ============================================================================

#[tokio::test]
async fn test_synthesis_prompt_truncation() {
    let p1 = Arc::new(
        ScriptedBackend::new()
            .reply("initial", code_json(50))
            .reply("synthesis", code_json(50)),
    );
    let registry = panel(&[("p1", &p1)]);
    let code = "let x = 1;\n".repeat(2_000);

    let config = AnalysisConfig::new(vec!["p1".into()], "p1").with_truncation(true);
    PipelineController::new(&registry)
        .run(&config, &templates(), &context(&code), &[])
        .await
        .unwrap();

    let initial = &p1.prompts("initial")[0];
    assert!(initial.contains(&code));
    assert!(!initial.contains(TRUNCATION_MARKER));

    let synthesis = &p1.prompts("synthesis")[0];
    assert!(synthesis.contains(TRUNCATION_MARKER));
    assert!(!synthesis.contains(&code));
    assert!(synthesis.contains("## Independent assessments"));
    assert!(synthesis.contains("### p1"));
}

#[tokio::test]
async fn test_synthesis_prompt_untouched_without_flag() {
    let p1 = Arc::new(
        ScriptedBackend::new()
            .reply("initial", code_json(50))
            .reply("synthesis", code_json(50)),
    );
    let registry = panel(&[("p1", &p1)]);
    let code = "x".repeat(20_000);

    let config = AnalysisConfig::new(vec!["p1".into()], "p1");
    PipelineController::new(&registry)
        .run(&config, &templates(), &context(&code), &[])
        .await
        .unwrap();

    let synthesis = &p1.prompts("synthesis")[0];
    assert!(synthesis.contains(&code));
    assert!(!synthesis.contains(TRUNCATION_MARKER));
}

// ============================================================================
// Untrusted responses
// ============================================================================

#[tokio::test]
async fn test_free_text_responses_are_recovered() {
    let fenced = Arc::new(ScriptedBackend::new().reply(
        "initial",
        format!("Here is my review.\n```json\n{}\n```\nLet me know!", code_json(42)),
    ));
    let prose = Arc::new(ScriptedBackend::new().reply(
        "initial",
        format!("Sure thing: {} Hope that helps.", code_json(58)),
    ));
    let cut_off = Arc::new(ScriptedBackend::new().reply(
        "initial",
        r#"```json
{"overallScore": 61, "categoryScores": {"security": 60, "performance": 62, "maintainability": 61, "readability": 61}, "summary": "Reasonable", "issues": [{"severity": "low", "description": "Long lin"#,
    ));
    let master = Arc::new(ScriptedBackend::new().fail("initial").fail("synthesis"));
    let registry = panel(&[
        ("fenced", &fenced),
        ("prose", &prose),
        ("cut_off", &cut_off),
        ("master", &master),
    ]);

    let config = AnalysisConfig::new(
        vec!["fenced".into(), "prose".into(), "cut_off".into()],
        "master",
    );
    let result = PipelineController::new(&registry)
        .run(&config, &templates(), &context("fn main() {}"), &[])
        .await
        .unwrap();

    assert_eq!(result.phase1_results.len(), 3);
    assert_eq!(result.phase1_results["fenced"].score(), 42.0);
    assert_eq!(result.phase1_results["prose"].score(), 58.0);
    assert_eq!(result.phase1_results["cut_off"].score(), 61.0);
    // master was never asked for an initial review
    assert!(master.prompts("initial").is_empty());
    assert_eq!(result.final_score, 54.0);
}

#[tokio::test]
async fn test_schema_violation_becomes_provider_error() {
    let ok = Arc::new(
        ScriptedBackend::new()
            .reply("initial", code_json(80))
            .reply("synthesis", code_json(80)),
    );
    let out_of_range = Arc::new(ScriptedBackend::new().reply("initial", code_json(150)));
    let missing_category = Arc::new(ScriptedBackend::new().reply(
        "initial",
        r#"{"overallScore": 50, "categoryScores": {"security": 50}, "summary": "s", "issues": []}"#,
    ));
    let registry = panel(&[("ok", &ok), ("range", &out_of_range), ("missing", &missing_category)]);

    let config = AnalysisConfig::new(
        vec!["ok".into(), "range".into(), "missing".into()],
        "ok",
    );
    let result = PipelineController::new(&registry)
        .run(&config, &templates(), &context("fn main() {}"), &[])
        .await
        .unwrap();

    assert_eq!(result.phase1_results.len(), 1);
    assert_eq!(result.errors.len(), 2);
    for error in &result.errors {
        assert!(error.error.contains("Schema validation failed"), "{}", error);
    }
    let range = result.errors.iter().find(|e| e.provider_id == "range").unwrap();
    assert!(range.error.contains("overallScore"));
    let missing = result.errors.iter().find(|e| e.provider_id == "missing").unwrap();
    assert!(missing.error.contains("performance"));
}

#[tokio::test]
async fn test_images_rejected_by_text_only_backend() {
    let vision = Arc::new(
        ScriptedBackend::new()
            .reply("initial", code_json(70))
            .reply("synthesis", code_json(70)),
    );
    let text_only = Arc::new(
        ScriptedBackend::new()
            .text_only()
            .reply("initial", code_json(10)),
    );
    let registry = panel(&[("vision", &vision), ("text", &text_only)]);
    let images = vec![ImageInput {
        media_type: "image/png".to_string(),
        data: "iVBORw0KGgo=".to_string(),
    }];

    let config = AnalysisConfig::new(vec!["vision".into(), "text".into()], "vision");
    let result = PipelineController::new(&registry)
        .run(&config, &templates(), &context("fn main() {}"), &images)
        .await
        .unwrap();

    assert_eq!(result.phase1_results.len(), 1);
    assert_eq!(result.errors[0].provider_id, "text");
    assert!(result.errors[0].error.contains("image"));
    assert_eq!(text_only.call_count(), 0);
    assert_eq!(result.final_score, 70.0);
}
