//! Evaluation orchestrator.
//!
//! Runs the aggregation passes over one run's predictions and the session's
//! gold standard, producing an [`EvaluationReport`]. No I/O happens here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::aggregate::{
    self, DEFAULT_MIN_TURN_PAIRS, LevelMetrics, SkipLog, SystemBuckets, SystemMatrix,
    SystemScores, TurnTrend,
};
use crate::aspect::{Aspect, Dataset, Level};
use crate::error::Result;
use crate::gold::EvaluationContext;
use crate::parse;
use crate::records::RunPredictions;
use crate::stats::Correlation;

/// Tunables for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalOptions {
    /// Turn indices with fewer matched pairs are left out of the trend.
    pub min_turn_pairs: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            min_turn_pairs: DEFAULT_MIN_TURN_PAIRS,
        }
    }
}

/// How much of the gold standard a run covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub gold_turns: usize,
    pub matched_turns: usize,
    /// Predicted turns with no gold entry (non-assistant or unknown turns).
    pub unmatched_predicted_turns: usize,
    pub gold_dialogues: usize,
    pub matched_dialogues: usize,
    pub unmatched_predicted_dialogues: usize,
}

impl Coverage {
    fn measure(context: &EvaluationContext, preds: &RunPredictions) -> Self {
        let gold = context.gold();
        let matched_turns = gold
            .turns
            .keys()
            .filter(|k| preds.turns.contains_key(*k))
            .count();
        let matched_dialogues = gold
            .dialogues
            .keys()
            .filter(|k| preds.dialogues.contains_key(*k))
            .count();
        Self {
            gold_turns: gold.turns.len(),
            matched_turns,
            unmatched_predicted_turns: preds.turns.len() - matched_turns,
            gold_dialogues: gold.dialogues.len(),
            matched_dialogues,
            unmatched_predicted_dialogues: preds.dialogues.len() - matched_dialogues,
        }
    }
}

/// The four result structures handed to the rendering layer, plus coverage
/// and skipped identifiers.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub generated_at: DateTime<Utc>,
    /// Turn aspect -> dataset -> {pearson, spearman}.
    pub turn_level: LevelMetrics,
    /// Dialogue aspect -> dataset -> {pearson, spearman}.
    pub dialogue_level: LevelMetrics,
    /// System -> aspect -> spearman, observed aspects only.
    pub per_system: SystemScores,
    /// Sorted systems x all aspects.
    pub system_matrix: SystemMatrix,
    /// Turn aspect -> ascending (turn index, spearman).
    pub turn_trend: TurnTrend,
    pub coverage: Coverage,
    /// Conversation ids that could not be decomposed into system and dataset.
    pub skipped_identifiers: Vec<String>,
}

impl EvaluationReport {
    /// Metrics for one aspect at its own level.
    pub fn metrics(&self, aspect: Aspect) -> Option<&BTreeMap<Dataset, Correlation>> {
        match aspect.level() {
            Level::Turn => self.turn_level.get(&aspect),
            Level::Dialogue => self.dialogue_level.get(&aspect),
        }
    }

    /// Pearson and Spearman for every aspect of one dataset, in canonical
    /// aspect order.
    pub fn dataset_profile(&self, dataset: Dataset) -> Vec<(Aspect, Correlation)> {
        Aspect::ALL
            .iter()
            .map(|&aspect| {
                let corr = self
                    .metrics(aspect)
                    .and_then(|per_dataset| per_dataset.get(&dataset))
                    .copied()
                    .unwrap_or_else(Correlation::undefined);
                (aspect, corr)
            })
            .collect()
    }
}

/// Evaluate parsed predictions against the context's gold standard.
pub fn evaluate(
    context: &EvaluationContext,
    preds: &RunPredictions,
    options: &EvalOptions,
) -> EvaluationReport {
    let gold = context.gold();
    let mut skipped = SkipLog::default();

    let turn_level = aggregate::by_dataset(&gold.turns, &preds.turns, &Aspect::TURN, &mut skipped);
    let dialogue_level = aggregate::by_dataset(
        &gold.dialogues,
        &preds.dialogues,
        &Aspect::DIALOGUE,
        &mut skipped,
    );

    let mut systems = SystemBuckets::default();
    systems.collect(&gold.turns, &preds.turns, &Aspect::TURN, &mut skipped);
    systems.collect(
        &gold.dialogues,
        &preds.dialogues,
        &Aspect::DIALOGUE,
        &mut skipped,
    );

    let turn_trend = aggregate::by_turn_index(&gold.turns, &preds.turns, options.min_turn_pairs);
    let coverage = Coverage::measure(context, preds);

    info!(
        systems = systems.system_count(),
        matched_turns = coverage.matched_turns,
        matched_dialogues = coverage.matched_dialogues,
        "Evaluation complete"
    );

    EvaluationReport {
        generated_at: Utc::now(),
        turn_level,
        dialogue_level,
        per_system: systems.scores(),
        system_matrix: systems.matrix(),
        turn_trend,
        coverage,
        skipped_identifiers: skipped.into_sorted(),
    }
}

/// Parse a run document and evaluate it. A parse failure aborts only this
/// evaluation; the context is untouched.
pub fn evaluate_document(
    context: &EvaluationContext,
    run_text: &str,
    options: &EvalOptions,
) -> Result<EvaluationReport> {
    let preds = parse::parse_run_str(run_text)?;
    Ok(evaluate(context, &preds, options))
}
