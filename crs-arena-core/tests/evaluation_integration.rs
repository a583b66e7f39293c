//! End-to-end evaluation tests: gold document + run document -> report.

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use crs_arena_core::gold::{FileGoldSource, GoldCache};
use crs_arena_core::{
    Aspect, Dataset, EvalError, EvalOptions, EvaluationContext, evaluate, evaluate_document,
    parse_gold, parse_run,
};

/// Deterministic, non-constant score for a (conversation, slot) pair.
fn score(conv: usize, slot: usize) -> f64 {
    ((conv * 7 + slot * 3) % 5) as f64 + 1.0
}

/// Gold and run documents for the given system ids, `dialogues` each, with
/// three assistant turns per dialogue and every aspect annotated.
fn documents(systems: &[&str], dialogues: usize) -> (Value, Value) {
    let mut gold = Vec::new();
    let mut run = Vec::new();
    let mut conv = 0;

    for system in systems {
        for d in 0..dialogues {
            conv += 1;
            let conv_id = format!("{system}_{d}");

            let dial_gold: serde_json::Map<String, Value> = Aspect::DIALOGUE
                .iter()
                .enumerate()
                .map(|(slot, a)| (a.as_str().to_string(), json!(score(conv, slot))))
                .collect();
            // Predictions disagree with gold on every other dialogue.
            let dial_pred: serde_json::Map<String, Value> = Aspect::DIALOGUE
                .iter()
                .enumerate()
                .map(|(slot, a)| {
                    let v = score(conv, slot) + if conv % 2 == 0 { 0.5 } else { -1.5 };
                    (a.as_str().to_string(), json!(v))
                })
                .collect();

            let mut gold_turns = Vec::new();
            let mut pred_turns = Vec::new();
            for t in 0..3 {
                gold_turns.push(json!({"role": "USER", "turn_ind": t * 2}));
                gold_turns.push(json!({
                    "role": "ASST",
                    "turn_ind": t * 2 + 1,
                    "turn_level_aggregated": {
                        "relevance": score(conv, t),
                        "interestingness": score(conv, t + 4),
                    }
                }));
                pred_turns.push(json!({
                    "turn_ind": (t * 2 + 1).to_string(),
                    "turn_level_pred": {
                        "relevance": score(conv, t) * 0.5 + (d % 3) as f64,
                        "interestingness": score(conv, t + 1),
                    }
                }));
            }

            gold.push(json!({
                "conv_id": conv_id,
                "dial_level_aggregated": dial_gold,
                "dialogue": gold_turns,
            }));
            run.push(json!({
                "conv_id": conv_id,
                "turns": pred_turns,
                "dial_level_pred": dial_pred,
            }));
        }
    }
    (Value::Array(gold), Value::Array(run))
}

#[test]
fn two_systems_yield_two_by_seven_matrix() {
    let (gold, run) = documents(&["barcor_redial", "kbrd_redial"], 12);
    let ctx = EvaluationContext::new(parse_gold(gold).unwrap());
    let preds = parse_run(run).unwrap();

    let report = evaluate(&ctx, &preds, &EvalOptions::default());
    let matrix = &report.system_matrix;

    assert_eq!(matrix.systems, vec!["barcor_redial", "kbrd_redial"]);
    assert_eq!(matrix.aspects, Aspect::ALL.to_vec());
    assert_eq!(matrix.values.len(), 2);
    for row in &matrix.values {
        assert_eq!(row.len(), 7);
        for cell in row {
            assert!(cell.is_nan() || (-1.0 - 1e-9..=1.0 + 1e-9).contains(cell));
        }
    }
    assert_eq!(report.per_system.len(), 2);
    assert_eq!(report.per_system["kbrd_redial"].len(), 7);
}

#[test]
fn systems_on_both_datasets_fill_both_dataset_buckets() {
    let systems = [
        "barcor_redial",
        "barcor_opendialkg",
        "kbrd_redial",
        "kbrd_opendialkg",
    ];
    let (gold, run) = documents(&systems, 8);
    let ctx = EvaluationContext::new(parse_gold(gold).unwrap());
    let preds = parse_run(run).unwrap();
    let report = evaluate(&ctx, &preds, &EvalOptions::default());

    // The dataset segment is part of the system id, so each family/dataset
    // combination is its own row.
    assert_eq!(report.system_matrix.systems.len(), 4);

    for aspect in Aspect::TURN {
        for dataset in Dataset::ALL {
            // 2 families x 8 dialogues x 3 assistant turns.
            assert_eq!(report.turn_level[&aspect][&dataset].n, 48);
        }
    }
    for aspect in Aspect::DIALOGUE {
        for dataset in Dataset::ALL {
            assert_eq!(report.dialogue_level[&aspect][&dataset].n, 16);
        }
    }

    // Turn indices 1, 3, 5 each have 4 systems x 8 dialogues = 32 pairs.
    let turns: Vec<i64> = report
        .turn_trend
        .points(Aspect::Relevance)
        .iter()
        .map(|p| p.turn_index)
        .collect();
    assert_eq!(turns, vec![1, 3, 5]);
    assert_eq!(report.coverage.matched_turns, 96);
    assert_eq!(report.coverage.unmatched_predicted_turns, 0);
}

#[test]
fn unknown_dataset_only_reaches_system_and_turn_passes() {
    let (gold, run) = documents(&["chatgpt_inspired"], 6);
    let ctx = EvaluationContext::new(parse_gold(gold).unwrap());
    let preds = parse_run(run).unwrap();
    let report = evaluate(&ctx, &preds, &EvalOptions::default());

    for per_dataset in report.turn_level.values().chain(report.dialogue_level.values()) {
        assert!(per_dataset.values().all(|c| c.n == 0 && !c.is_defined()));
    }
    assert_eq!(report.system_matrix.systems, vec!["chatgpt_inspired"]);
    assert!(!report.turn_trend.points(Aspect::Relevance).is_empty());
}

#[test]
fn malformed_identifier_does_not_abort() {
    let gold = json!([
        {"conv_id": "nodelimiter", "dial_level_aggregated": {"efficiency": 1.0}},
        {"conv_id": "barcor_redial_1", "dial_level_aggregated": {"efficiency": 1.0}},
        {"conv_id": "barcor_redial_2", "dial_level_aggregated": {"efficiency": 2.0}}
    ]);
    let run = json!([
        {"conv_id": "nodelimiter", "dial_level_pred": {"efficiency": 4.0}},
        {"conv_id": "barcor_redial_1", "dial_level_pred": {"efficiency": 1.0}},
        {"conv_id": "barcor_redial_2", "dial_level_pred": {"efficiency": 3.0}}
    ]);
    let ctx = EvaluationContext::new(parse_gold(gold).unwrap());
    let report = evaluate_document(&ctx, &run.to_string(), &EvalOptions::default()).unwrap();

    assert_eq!(report.skipped_identifiers, vec!["nodelimiter"]);
    let eff = report.dialogue_level[&Aspect::Efficiency][&Dataset::Redial];
    assert_eq!(eff.n, 2);
    assert!((eff.spearman - 1.0).abs() < 1e-12);
}

#[test]
fn min_turn_pairs_option_is_respected() {
    let (gold, run) = documents(&["barcor_redial"], 3);
    let ctx = EvaluationContext::new(parse_gold(gold).unwrap());
    let preds = parse_run(run).unwrap();

    let default = evaluate(&ctx, &preds, &EvalOptions::default());
    assert_eq!(default.turn_trend.points(Aspect::Relevance).len(), 3);

    let strict = evaluate(&ctx, &preds, &EvalOptions { min_turn_pairs: 4 });
    assert!(strict.turn_trend.points(Aspect::Relevance).is_empty());
}

#[test]
fn schema_violation_in_run_names_the_turn() {
    let (gold, _) = documents(&["barcor_redial"], 2);
    let ctx = EvaluationContext::new(parse_gold(gold).unwrap());
    let run = r#"[{"conv_id": "barcor_redial_0",
                   "turns": [{"turn_ind": 3, "turn_level_pred": {"interestingness": {"score": 1}}}]}]"#;

    match evaluate_document(&ctx, run, &EvalOptions::default()).unwrap_err() {
        EvalError::SchemaViolation { context, .. } => {
            assert_eq!(context, "conv_id=barcor_redial_0 turn=3 aspect=interestingness")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn gold_cache_serves_concurrent_evaluations() {
    let (gold, run) = documents(&["barcor_redial", "kbrd_opendialkg"], 5);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crs_arena_eval.json");
    std::fs::write(&path, gold.to_string()).unwrap();

    let cache = GoldCache::new(Box::new(FileGoldSource::new(&path)));
    let ctx = cache.get_or_load().await.unwrap();
    let run_text = run.to_string();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..4 {
        let ctx = ctx.clone();
        let text = run_text.clone();
        tasks.spawn(async move { evaluate_document(&ctx, &text, &EvalOptions::default()) });
    }

    let mut matrices = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        matrices.push(joined.unwrap().unwrap().system_matrix.systems);
    }
    assert_eq!(matrices.len(), 4);
    assert!(matrices.iter().all(|m| m == &matrices[0]));
}
