//! Evaluation aspects and the dataset registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether an aspect is scored per assistant turn or once per dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Turn,
    Dialogue,
}

/// A named evaluation dimension.
///
/// Declaration order is the canonical reporting order: turn aspects first,
/// then dialogue aspects.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Aspect {
    Relevance,
    Interestingness,
    Understanding,
    TaskCompletion,
    InterestArousal,
    Efficiency,
    DialogueOverall,
}

impl Aspect {
    pub const TURN: [Aspect; 2] = [Aspect::Relevance, Aspect::Interestingness];

    pub const DIALOGUE: [Aspect; 5] = [
        Aspect::Understanding,
        Aspect::TaskCompletion,
        Aspect::InterestArousal,
        Aspect::Efficiency,
        Aspect::DialogueOverall,
    ];

    pub const ALL: [Aspect; 7] = [
        Aspect::Relevance,
        Aspect::Interestingness,
        Aspect::Understanding,
        Aspect::TaskCompletion,
        Aspect::InterestArousal,
        Aspect::Efficiency,
        Aspect::DialogueOverall,
    ];

    /// Key used in gold and run documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Aspect::Relevance => "relevance",
            Aspect::Interestingness => "interestingness",
            Aspect::Understanding => "understanding",
            Aspect::TaskCompletion => "task_completion",
            Aspect::InterestArousal => "interest_arousal",
            Aspect::Efficiency => "efficiency",
            Aspect::DialogueOverall => "dialogue_overall",
        }
    }

    /// Human-readable column label.
    pub fn label(&self) -> &'static str {
        match self {
            Aspect::Relevance => "Relevance",
            Aspect::Interestingness => "Interestingness",
            Aspect::Understanding => "Understanding",
            Aspect::TaskCompletion => "Task Completion",
            Aspect::InterestArousal => "Interest Arousal",
            Aspect::Efficiency => "Efficiency",
            Aspect::DialogueOverall => "Dialogue Overall",
        }
    }

    pub fn level(&self) -> Level {
        match self {
            Aspect::Relevance | Aspect::Interestingness => Level::Turn,
            _ => Level::Dialogue,
        }
    }

    /// Look up an aspect by its document key. Unknown keys yield `None`.
    pub fn from_key(key: &str) -> Option<Aspect> {
        Aspect::ALL.into_iter().find(|a| a.as_str() == key)
    }

    /// Aspects scored at the given level.
    pub fn at_level(level: Level) -> &'static [Aspect] {
        match level {
            Level::Turn => &Aspect::TURN,
            Level::Dialogue => &Aspect::DIALOGUE,
        }
    }
}

impl fmt::Display for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aspect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Aspect::from_key(s).ok_or_else(|| format!("unknown aspect: {s}"))
    }
}

/// The datasets reported at dataset level, in reporting order.
///
/// Conversations from any other dataset are excluded from the dataset pass
/// but still take part in the per-system and per-turn passes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    Redial,
    OpenDialKg,
}

impl Dataset {
    pub const ALL: [Dataset; 2] = [Dataset::Redial, Dataset::OpenDialKg];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::Redial => "redial",
            Dataset::OpenDialKg => "opendialkg",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dataset::Redial => "ReDial",
            Dataset::OpenDialKg => "OpenDialKG",
        }
    }

    /// Registry lookup by the dataset segment of a conversation id.
    pub fn from_name(name: &str) -> Option<Dataset> {
        Dataset::ALL.into_iter().find(|d| d.as_str() == name)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
