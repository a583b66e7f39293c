//! Aggregation passes joining predictions to gold annotations.
//!
//! Every pass follows the same pattern: walk the gold table, skip keys with no
//! prediction, skip aspects missing on either side, and push the matched
//! `(prediction, gold)` pair into a bucket. Passes differ only in the bucket
//! key (dataset, system, turn index) and in what they report per bucket.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::aspect::{Aspect, Dataset};
use crate::identifier;
use crate::records::{AnnotationSet, ConversationKey, TurnTable};
use crate::stats::{Correlation, nan_as_null, spearman};

/// Minimum matched pairs for a turn index to be reported in the trend.
pub const DEFAULT_MIN_TURN_PAIRS: usize = 3;

/// Matched prediction and gold scores for one bucket.
#[derive(Debug, Clone, Default)]
pub struct PairBucket {
    pred: Vec<f64>,
    gold: Vec<f64>,
}

impl PairBucket {
    pub fn push(&mut self, pred: f64, gold: f64) {
        self.pred.push(pred);
        self.gold.push(gold);
    }

    pub fn len(&self) -> usize {
        self.pred.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pred.is_empty()
    }

    pub fn correlation(&self) -> Correlation {
        Correlation::from_pairs(&self.pred, &self.gold)
    }

    pub fn spearman(&self) -> f64 {
        spearman(&self.pred, &self.gold)
    }
}

/// Identifiers that could not be decomposed, collected instead of aborting.
#[derive(Debug, Clone, Default)]
pub struct SkipLog {
    ids: BTreeSet<String>,
}

impl SkipLog {
    pub fn record(&mut self, id: &str) {
        if self.ids.insert(id.to_string()) {
            warn!(conv_id = id, "Skipping record with malformed conversation id");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn into_sorted(self) -> Vec<String> {
        self.ids.into_iter().collect()
    }
}

/// Iterate the gold entries that have a prediction under the same key.
fn matched<'a, K, V>(
    gold: &'a BTreeMap<K, V>,
    preds: &'a BTreeMap<K, V>,
) -> impl Iterator<Item = (&'a K, &'a V, &'a V)> + 'a
where
    K: Ord,
{
    gold.iter()
        .filter_map(move |(key, g)| preds.get(key).map(|p| (key, g, p)))
}

/// Per-dataset correlations for one aspect.
pub type DatasetMetrics = BTreeMap<Dataset, Correlation>;

/// Aspect -> dataset -> correlation, for one level.
pub type LevelMetrics = BTreeMap<Aspect, DatasetMetrics>;

/// Pass 1: per aspect, bucket matched pairs by dataset.
///
/// Only registered datasets are reported, each with Pearson and Spearman.
/// A dataset with no pairs reports both as NaN.
pub fn by_dataset<K: ConversationKey>(
    gold: &BTreeMap<K, AnnotationSet>,
    preds: &BTreeMap<K, AnnotationSet>,
    aspects: &[Aspect],
    skipped: &mut SkipLog,
) -> LevelMetrics {
    let mut results = LevelMetrics::new();

    for &aspect in aspects {
        let mut buckets: BTreeMap<Dataset, PairBucket> = BTreeMap::new();

        for (key, g, p) in matched(gold, preds) {
            let (Some(gold_score), Some(pred_score)) = (g.get(aspect), p.get(aspect)) else {
                continue;
            };
            let dataset = match identifier::dataset_of(key.conv_id()) {
                Ok(name) => Dataset::from_name(name),
                Err(e) => {
                    skipped.record(&e.id);
                    continue;
                }
            };
            if let Some(dataset) = dataset {
                buckets.entry(dataset).or_default().push(pred_score, gold_score);
            }
        }

        let metrics = Dataset::ALL
            .into_iter()
            .map(|ds| {
                let corr = buckets
                    .get(&ds)
                    .map(PairBucket::correlation)
                    .unwrap_or_else(Correlation::undefined);
                (ds, corr)
            })
            .collect();
        debug!(%aspect, buckets = buckets.len(), "Dataset pass complete");
        results.insert(aspect, metrics);
    }

    results
}

/// Buckets of matched pairs per system and aspect, shared by the per-system
/// score map and the system matrix.
#[derive(Debug, Clone, Default)]
pub struct SystemBuckets {
    systems: BTreeMap<String, BTreeMap<Aspect, PairBucket>>,
}

impl SystemBuckets {
    /// Add every matched pair of `aspects` from one table.
    ///
    /// A system is registered as soon as one of its keys matches a
    /// prediction, even if no aspect pairs up.
    pub fn collect<K: ConversationKey>(
        &mut self,
        gold: &BTreeMap<K, AnnotationSet>,
        preds: &BTreeMap<K, AnnotationSet>,
        aspects: &[Aspect],
        skipped: &mut SkipLog,
    ) {
        for (key, g, p) in matched(gold, preds) {
            let system = match identifier::system_of(key.conv_id()) {
                Ok(system) => system,
                Err(e) => {
                    skipped.record(&e.id);
                    continue;
                }
            };
            let entry = self.systems.entry(system).or_default();
            for &aspect in aspects {
                if let (Some(gold_score), Some(pred_score)) = (g.get(aspect), p.get(aspect)) {
                    entry.entry(aspect).or_default().push(pred_score, gold_score);
                }
            }
        }
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Pass 2: Spearman per system and observed aspect. Aspects a system
    /// never paired are omitted rather than reported as NaN.
    pub fn scores(&self) -> SystemScores {
        self.systems
            .iter()
            .map(|(system, aspects)| {
                let per_aspect = aspects
                    .iter()
                    .filter(|(_, bucket)| !bucket.is_empty())
                    .map(|(aspect, bucket)| (*aspect, bucket.spearman()))
                    .collect();
                (system.clone(), per_aspect)
            })
            .collect()
    }

    /// Pass 3: sorted systems x all seven aspects, NaN where no pairs exist.
    pub fn matrix(&self) -> SystemMatrix {
        let systems: Vec<String> = self.systems.keys().cloned().collect();
        let values = self
            .systems
            .values()
            .map(|aspects| {
                Aspect::ALL
                    .iter()
                    .map(|aspect| match aspects.get(aspect) {
                        Some(bucket) if !bucket.is_empty() => bucket.spearman(),
                        _ => f64::NAN,
                    })
                    .collect()
            })
            .collect();
        SystemMatrix {
            systems,
            aspects: Aspect::ALL.to_vec(),
            values,
        }
    }
}

/// System -> aspect -> Spearman, only for aspects with at least one pair.
pub type SystemScores = BTreeMap<String, BTreeMap<Aspect, f64>>;

/// Spearman per system (rows, sorted) and aspect (columns, canonical order).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMatrix {
    pub systems: Vec<String>,
    pub aspects: Vec<Aspect>,
    #[serde(with = "matrix_cells")]
    pub values: Vec<Vec<f64>>,
}

impl SystemMatrix {
    pub fn get(&self, system: &str, aspect: Aspect) -> Option<f64> {
        let row = self.systems.iter().position(|s| s == system)?;
        let col = self.aspects.iter().position(|a| *a == aspect)?;
        self.values.get(row)?.get(col).copied()
    }

    /// Minimum and maximum of the defined cells in one aspect column.
    pub fn column_range(&self, aspect: Aspect) -> Option<(f64, f64)> {
        let col = self.aspects.iter().position(|a| *a == aspect)?;
        self.values
            .iter()
            .filter_map(|row| row.get(col).copied())
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

mod matrix_cells {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[Vec<f64>], serializer: S) -> Result<S::Ok, S::Error> {
        let cells: Vec<Vec<Option<f64>>> = values
            .iter()
            .map(|row| row.iter().map(|v| (!v.is_nan()).then_some(*v)).collect())
            .collect();
        cells.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<f64>>, D::Error> {
        let cells = Vec::<Vec<Option<f64>>>::deserialize(deserializer)?;
        Ok(cells
            .into_iter()
            .map(|row| row.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            .collect())
    }
}

/// Spearman for one turn position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub turn_index: i64,
    #[serde(with = "nan_as_null")]
    pub spearman: f64,
    pub n: usize,
}

/// Turn aspect -> ascending trend points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnTrend {
    pub series: BTreeMap<Aspect, Vec<TrendPoint>>,
}

impl TurnTrend {
    pub fn points(&self, aspect: Aspect) -> &[TrendPoint] {
        self.series.get(&aspect).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Copy of the trend keeping only turn indices up to `max_turn`.
    pub fn up_to(&self, max_turn: i64) -> TurnTrend {
        let series = self
            .series
            .iter()
            .map(|(aspect, points)| {
                let kept = points
                    .iter()
                    .filter(|p| p.turn_index <= max_turn)
                    .copied()
                    .collect();
                (*aspect, kept)
            })
            .collect();
        TurnTrend { series }
    }
}

/// Pass 4: Spearman per turn index for the turn aspects.
///
/// Turn indices with fewer than `min_pairs` matched pairs are omitted.
pub fn by_turn_index(gold: &TurnTable, preds: &TurnTable, min_pairs: usize) -> TurnTrend {
    let mut buckets: BTreeMap<i64, BTreeMap<Aspect, PairBucket>> = BTreeMap::new();

    for (key, g, p) in matched(gold, preds) {
        let per_aspect = buckets.entry(key.turn_index).or_default();
        for aspect in Aspect::TURN {
            if let (Some(gold_score), Some(pred_score)) = (g.get(aspect), p.get(aspect)) {
                per_aspect.entry(aspect).or_default().push(pred_score, gold_score);
            }
        }
    }

    let series = Aspect::TURN
        .into_iter()
        .map(|aspect| {
            let points = buckets
                .iter()
                .filter_map(|(&turn_index, per_aspect)| {
                    let bucket = per_aspect.get(&aspect)?;
                    (bucket.len() >= min_pairs).then(|| TrendPoint {
                        turn_index,
                        spearman: bucket.spearman(),
                        n: bucket.len(),
                    })
                })
                .collect();
            (aspect, points)
        })
        .collect();

    debug!(turn_indices = buckets.len(), min_pairs, "Turn trend pass complete");
    TurnTrend { series }
}
