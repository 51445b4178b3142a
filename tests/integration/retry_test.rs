//! Retry Integration Tests
//!
//! Re-runs failed parts of a stored run: substitution, repeated retries of
//! the same provider, synthesis-only retries and the stored-record hand-off.

use std::sync::Arc;

use panel_review::{
    AnalysisConfig, AnalysisRecord, AppError, Phase, PipelineController, RetryCoordinator,
    RetryRequest,
};

use crate::support::{code_json, context, panel, templates, ScriptedBackend};

async fn run(
    controller: &PipelineController<'_>,
    providers: &[&str],
    master: &str,
) -> AnalysisRecord {
    let config = AnalysisConfig::new(providers.iter().map(|p| p.to_string()).collect(), master);
    let result = controller
        .run(&config, &templates(), &context("fn main() {}"), &[])
        .await
        .unwrap();
    AnalysisRecord::from_pipeline(&config, result)
}

#[tokio::test]
async fn test_substitute_replaces_failed_provider_and_resynthesizes() {
    let p1 = Arc::new(
        ScriptedBackend::new()
            .reply("initial", code_json(60))
            .reply("synthesis", code_json(65)),
    );
    let p2 = Arc::new(ScriptedBackend::new().fail("initial"));
    let p3 = Arc::new(ScriptedBackend::new().reply("initial", code_json(90)));
    let registry = panel(&[("p1", &p1), ("p2", &p2), ("p3", &p3)]);
    let controller = PipelineController::new(&registry);

    let record = run(&controller, &["p1", "p2"], "p1").await;
    assert_eq!(record.providers_used, vec!["p1", "p2"]);
    assert!(record.result.has_partial_results);
    assert_eq!(p1.prompts("synthesis").len(), 1);

    // The master now scores differently, so a stale synthesis would show.
    p1.set_reply("synthesis", Ok(code_json(77)));
    let request = RetryRequest::initial(record.analysis_id, vec!["p2".into()])
        .with_substitution("p2", "p3");
    let updated = RetryCoordinator::new(controller.clone())
        .retry(&record, &request, &templates(), &context("fn main() {}"), &[])
        .await
        .unwrap();

    assert_eq!(updated.analysis_id, record.analysis_id);
    assert_eq!(updated.created_at, record.created_at);
    assert_eq!(updated.providers_used, vec!["p1", "p3"]);
    assert!(updated.result.phase1_results.contains_key("p3"));
    assert!(!updated.result.phase1_results.contains_key("p2"));
    assert!(updated.result.errors.is_empty());
    assert!(!updated.result.has_partial_results);
    assert_eq!(updated.result.final_score, 77.0);

    // p1 was not re-analyzed, but synthesized again over both results
    assert_eq!(p1.prompts("initial").len(), 1);
    let synthesis = p1.prompts("synthesis");
    assert_eq!(synthesis.len(), 2);
    assert!(synthesis[1].contains("### p1"));
    assert!(synthesis[1].contains("### p3"));
    assert_eq!(p2.call_count(), 1);

    // the prior record is untouched
    assert_eq!(record.providers_used, vec!["p1", "p2"]);
}

#[tokio::test]
async fn test_retrying_same_provider_twice_never_duplicates() {
    let p1 = Arc::new(
        ScriptedBackend::new()
            .reply("initial", code_json(60))
            .reply("synthesis", code_json(60)),
    );
    let p2 = Arc::new(ScriptedBackend::new().fail("initial"));
    let registry = panel(&[("p1", &p1), ("p2", &p2)]);
    let controller = PipelineController::new(&registry);
    let coordinator = RetryCoordinator::new(controller.clone());

    let record = run(&controller, &["p1", "p2"], "p1").await;
    let request = RetryRequest::initial(record.analysis_id, vec!["p2".into()]);

    let first = coordinator
        .retry(&record, &request, &templates(), &context("fn main() {}"), &[])
        .await
        .unwrap();
    let second = coordinator
        .retry(&first, &request, &templates(), &context("fn main() {}"), &[])
        .await
        .unwrap();
    assert_eq!(second.result.errors.len(), 1);
    assert_eq!(second.result.errors[0].provider_id, "p2");
    assert_eq!(second.providers_used, vec!["p1", "p2"]);

    p2.set_reply("initial", Ok(code_json(80)));
    let third = coordinator
        .retry(&second, &request, &templates(), &context("fn main() {}"), &[])
        .await
        .unwrap();
    let fourth = coordinator
        .retry(&third, &request, &templates(), &context("fn main() {}"), &[])
        .await
        .unwrap();

    assert_eq!(fourth.providers_used, vec!["p1", "p2"]);
    assert_eq!(fourth.result.phase1_results.len(), 2);
    assert!(fourth.result.errors.is_empty());
    assert_eq!(fourth.call_records().len(), 3);
}

#[tokio::test]
async fn test_retried_provider_keeps_only_fresh_outcome() {
    let p1 = Arc::new(
        ScriptedBackend::new()
            .reply("initial", code_json(60))
            .fail("synthesis"),
    );
    let p2 = Arc::new(ScriptedBackend::new().reply("initial", code_json(80)));
    let registry = panel(&[("p1", &p1), ("p2", &p2)]);
    let controller = PipelineController::new(&registry);

    let record = run(&controller, &["p1", "p2"], "p1").await;
    assert_eq!(record.result.final_score, 70.0);

    p2.set_reply(
        "initial",
        Err(panel_review_llm::LlmError::ServerError {
            message: "upstream unavailable".to_string(),
            status: Some(503),
        }),
    );
    let request = RetryRequest::initial(record.analysis_id, vec!["p2".into()]);
    let updated = RetryCoordinator::new(controller.clone())
        .retry(&record, &request, &templates(), &context("fn main() {}"), &[])
        .await
        .unwrap();

    assert_eq!(
        updated.result.phase1_results.keys().collect::<Vec<_>>(),
        vec!["p1"]
    );
    let p2_errors: Vec<_> = updated
        .result
        .errors
        .iter()
        .filter(|e| e.provider_id == "p2")
        .collect();
    assert_eq!(p2_errors.len(), 1);
    assert_eq!(p2_errors[0].phase, Phase::Initial);
    // the stale 80 no longer feeds the fallback mean or the synthesis prompt
    assert_eq!(updated.result.final_score, 60.0);
    let synthesis = p1.prompts("synthesis");
    assert!(!synthesis[1].contains("### p2"));
}

#[tokio::test]
async fn test_synthesis_retry_on_new_master() {
    let p1 = Arc::new(
        ScriptedBackend::new()
            .reply("initial", code_json(70))
            .fail("synthesis"),
    );
    let p2 = Arc::new(
        ScriptedBackend::new()
            .reply("initial", code_json(90))
            .reply("synthesis", code_json(88)),
    );
    let registry = panel(&[("p1", &p1), ("p2", &p2)]);
    let controller = PipelineController::new(&registry);

    let record = run(&controller, &["p1", "p2"], "p1").await;
    assert_eq!(record.result.final_score, 80.0);
    assert_eq!(record.result.errors[0].phase, Phase::Synthesis);

    let request = RetryRequest::synthesis(record.analysis_id).with_master("p2");
    let updated = RetryCoordinator::new(controller.clone())
        .retry(&record, &request, &templates(), &context("fn main() {}"), &[])
        .await
        .unwrap();

    assert_eq!(updated.master_provider, "p2");
    assert_eq!(updated.result.final_score, 88.0);
    assert!(updated.result.errors.is_empty());
    assert_eq!(p1.prompts("initial").len(), 1);
    assert_eq!(p2.prompts("initial").len(), 1);
    assert_eq!(p2.prompts("synthesis").len(), 1);
}

#[tokio::test]
async fn test_synthesis_retry_can_enable_truncation() {
    let p1 = Arc::new(
        ScriptedBackend::new()
            .reply("initial", code_json(50))
            .reply("synthesis", code_json(50)),
    );
    let registry = panel(&[("p1", &p1)]);
    let controller = PipelineController::new(&registry);
    let code = "y".repeat(15_000);

    let config = AnalysisConfig::new(vec!["p1".into()], "p1");
    let result = controller
        .run(&config, &templates(), &context(&code), &[])
        .await
        .unwrap();
    let record = AnalysisRecord::from_pipeline(&config, result);
    assert!(!record.truncate_for_synthesis);

    let mut request = RetryRequest::synthesis(record.analysis_id);
    request.truncate_for_synthesis = Some(true);
    let updated = RetryCoordinator::new(controller.clone())
        .retry(&record, &request, &templates(), &context(&code), &[])
        .await
        .unwrap();

    assert!(updated.truncate_for_synthesis);
    let prompts = p1.prompts("synthesis");
    assert!(prompts[0].contains(&code));
    assert!(!prompts[1].contains(&code));
}

#[tokio::test]
async fn test_retry_from_stored_record() {
    let p1 = Arc::new(
        ScriptedBackend::new()
            .reply("initial", code_json(60))
            .reply("synthesis", code_json(60)),
    );
    let p2 = Arc::new(ScriptedBackend::new().fail("initial"));
    let registry = panel(&[("p1", &p1), ("p2", &p2)]);
    let controller = PipelineController::new(&registry);

    let record = run(&controller, &["p1", "p2"], "p1").await;
    let stored = serde_json::to_string(&record).unwrap();
    assert!(stored.contains("\"analysisId\""));
    let reloaded: AnalysisRecord = serde_json::from_str(&stored).unwrap();

    p2.set_reply("initial", Ok(code_json(40)));
    let request: RetryRequest = serde_json::from_value(serde_json::json!({
        "analysisId": reloaded.analysis_id,
        "failedProviders": ["p2"],
        "phase": "initial"
    }))
    .unwrap();
    let updated = RetryCoordinator::new(controller.clone())
        .retry(&reloaded, &request, &templates(), &context("fn main() {}"), &[])
        .await
        .unwrap();

    assert_eq!(updated.result.phase1_results.len(), 2);
    assert!(!updated.result.has_partial_results);
}

#[tokio::test]
async fn test_retry_rejects_other_analysis_and_unknown_substitute() {
    let p1 = Arc::new(
        ScriptedBackend::new()
            .reply("initial", code_json(60))
            .reply("synthesis", code_json(60)),
    );
    let p2 = Arc::new(ScriptedBackend::new().fail("initial"));
    let registry = panel(&[("p1", &p1), ("p2", &p2)]);
    let controller = PipelineController::new(&registry);
    let coordinator = RetryCoordinator::new(controller.clone());
    let record = run(&controller, &["p1", "p2"], "p1").await;

    let other = RetryRequest::initial(uuid::Uuid::new_v4(), vec!["p2".into()]);
    let err = coordinator
        .retry(&record, &other, &templates(), &context("fn main() {}"), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let unknown = RetryRequest::initial(record.analysis_id, vec!["p2".into()])
        .with_substitution("p2", "ghost");
    let err = coordinator
        .retry(&record, &unknown, &templates(), &context("fn main() {}"), &[])
        .await
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("ghost"));
    assert_eq!(p2.call_count(), 1);
}
