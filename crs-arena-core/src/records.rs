//! In-memory record model for gold annotations and run predictions.
//!
//! Gold and predictions share one shape: per-turn annotation sets keyed by
//! [`TurnKey`] and per-dialogue annotation sets keyed by conversation id.
//! Nothing here is mutated once a parser has built it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::aspect::{Aspect, Dataset};
use crate::identifier;

/// Identifies one assistant turn.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TurnKey {
    pub conv_id: String,
    pub turn_index: i64,
}

impl TurnKey {
    pub fn new(conv_id: impl Into<String>, turn_index: i64) -> Self {
        Self {
            conv_id: conv_id.into(),
            turn_index,
        }
    }
}

impl fmt::Display for TurnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.conv_id, self.turn_index)
    }
}

/// Keys that belong to a conversation. Lets the aggregator treat turn-level
/// and dialogue-level tables alike.
pub trait ConversationKey: Ord {
    fn conv_id(&self) -> &str;
}

impl ConversationKey for TurnKey {
    fn conv_id(&self) -> &str {
        &self.conv_id
    }
}

impl ConversationKey for String {
    fn conv_id(&self) -> &str {
        self
    }
}

/// Scores per aspect. An aspect that was not annotated is absent, never NaN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationSet {
    scores: BTreeMap<Aspect, f64>,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score for `aspect`, or `None` when the aspect was not annotated.
    pub fn get(&self, aspect: Aspect) -> Option<f64> {
        self.scores.get(&aspect).copied()
    }

    pub fn contains(&self, aspect: Aspect) -> bool {
        self.scores.contains_key(&aspect)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn aspects(&self) -> impl Iterator<Item = Aspect> + '_ {
        self.scores.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Aspect, f64)> + '_ {
        self.scores.iter().map(|(a, s)| (*a, *s))
    }

    /// Builder-style insert, used while a parser assembles the set.
    pub fn with(mut self, aspect: Aspect, score: f64) -> Self {
        self.scores.insert(aspect, score);
        self
    }
}

impl FromIterator<(Aspect, f64)> for AnnotationSet {
    fn from_iter<I: IntoIterator<Item = (Aspect, f64)>>(iter: I) -> Self {
        Self {
            scores: iter.into_iter().collect(),
        }
    }
}

pub type TurnTable = BTreeMap<TurnKey, AnnotationSet>;
pub type DialogueTable = BTreeMap<String, AnnotationSet>;

/// Human gold annotations, loaded once per session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoldStandard {
    /// Assistant turns only.
    pub turns: TurnTable,
    pub dialogues: DialogueTable,
}

/// Machine predictions parsed from one run document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunPredictions {
    pub turns: TurnTable,
    pub dialogues: DialogueTable,
}

/// Coverage overview of a gold standard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldSummary {
    pub dialogues: usize,
    pub assistant_turns: usize,
    /// Annotated count per aspect (turn aspects over turns, dialogue aspects over dialogues).
    pub aspect_counts: BTreeMap<Aspect, usize>,
    /// Dialogue count per registered dataset.
    pub dataset_counts: BTreeMap<Dataset, usize>,
    /// Dialogues whose dataset segment is outside the registry.
    pub unregistered_dialogues: usize,
    /// Distinct system identifiers.
    pub systems: Vec<String>,
    pub malformed_identifiers: Vec<String>,
}

impl GoldStandard {
    pub fn summary(&self) -> GoldSummary {
        let mut summary = GoldSummary {
            dialogues: self.dialogues.len(),
            assistant_turns: self.turns.len(),
            ..Default::default()
        };

        for set in self.turns.values().chain(self.dialogues.values()) {
            for aspect in set.aspects() {
                *summary.aspect_counts.entry(aspect).or_default() += 1;
            }
        }

        let mut systems = std::collections::BTreeSet::new();
        for conv_id in self.dialogues.keys() {
            match identifier::decompose(conv_id) {
                Ok(parts) => {
                    match Dataset::from_name(parts.dataset) {
                        Some(ds) => *summary.dataset_counts.entry(ds).or_default() += 1,
                        None => summary.unregistered_dialogues += 1,
                    }
                    systems.insert(parts.system);
                }
                Err(e) => summary.malformed_identifiers.push(e.id),
            }
        }
        summary.systems = systems.into_iter().collect();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_set_presence() {
        let set = AnnotationSet::new().with(Aspect::Relevance, 0.8);
        assert_eq!(set.get(Aspect::Relevance), Some(0.8));
        assert_eq!(set.get(Aspect::Interestingness), None);
        assert!(set.contains(Aspect::Relevance));
        assert_eq!(set.len(), 1);
        assert!(AnnotationSet::new().is_empty());
    }

    #[test]
    fn test_annotation_set_zero_is_present() {
        let set: AnnotationSet = [(Aspect::Efficiency, 0.0)].into_iter().collect();
        assert_eq!(set.get(Aspect::Efficiency), Some(0.0));
    }

    #[test]
    fn test_turn_key_ordering_and_display() {
        let a = TurnKey::new("barcor_redial_1", 2);
        let b = TurnKey::new("barcor_redial_1", 10);
        assert!(a < b);
        assert_eq!(a.to_string(), "barcor_redial_1:2");
        assert_eq!(a.conv_id(), "barcor_redial_1");
    }

    #[test]
    fn test_gold_summary() {
        let mut gold = GoldStandard::default();
        gold.dialogues.insert(
            "barcor_redial_1".into(),
            AnnotationSet::new().with(Aspect::Efficiency, 3.0),
        );
        gold.dialogues
            .insert("kbrd_opendialkg_7".into(), AnnotationSet::new());
        gold.dialogues
            .insert("chatgpt_inspired_2".into(), AnnotationSet::new());
        gold.dialogues.insert("broken".into(), AnnotationSet::new());
        gold.turns.insert(
            TurnKey::new("barcor_redial_1", 1),
            AnnotationSet::new().with(Aspect::Relevance, 2.0),
        );

        let summary = gold.summary();
        assert_eq!(summary.dialogues, 4);
        assert_eq!(summary.assistant_turns, 1);
        assert_eq!(summary.aspect_counts.get(&Aspect::Relevance), Some(&1));
        assert_eq!(summary.aspect_counts.get(&Aspect::Efficiency), Some(&1));
        assert_eq!(summary.dataset_counts.get(&Dataset::Redial), Some(&1));
        assert_eq!(summary.dataset_counts.get(&Dataset::OpenDialKg), Some(&1));
        assert_eq!(summary.unregistered_dialogues, 1);
        assert_eq!(
            summary.systems,
            vec!["barcor_redial", "chatgpt_inspired", "kbrd_opendialkg"]
        );
        assert_eq!(summary.malformed_identifiers, vec!["broken"]);
    }
}
