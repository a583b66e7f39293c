//! Parsers turning raw gold and run documents into the record model.
//!
//! Both documents are JSON arrays with one record per conversation. Scores
//! may be JSON numbers or numeric strings; anything else is reported as a
//! [`EvalError::SchemaViolation`] naming the conversation, turn and aspect.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::aspect::{Aspect, Level};
use crate::error::{EvalError, Result};
use crate::records::{AnnotationSet, GoldStandard, RunPredictions, TurnKey};

// Nested sections stay untyped so shape errors can be reported with the
// conversation and turn they belong to.

#[derive(Debug, Deserialize)]
struct RawGoldDialogue {
    conv_id: String,
    #[serde(default)]
    dial_level_aggregated: Value,
    #[serde(default)]
    dialogue: Value,
}

#[derive(Debug, Deserialize)]
struct RawGoldTurn {
    #[serde(default)]
    role: Value,
    #[serde(default)]
    turn_ind: Value,
    #[serde(default)]
    turn_level_aggregated: Value,
}

#[derive(Debug, Deserialize)]
struct RawRunDialogue {
    conv_id: String,
    #[serde(default)]
    turns: Value,
    #[serde(default)]
    dial_level_pred: Value,
}

#[derive(Debug, Deserialize)]
struct RawRunTurn {
    #[serde(default)]
    turn_ind: Value,
    #[serde(default)]
    turn_level_pred: Value,
}

/// Location inside a document, used as error context.
struct Location<'a> {
    conv_id: &'a str,
    turn: Option<i64>,
}

impl Location<'_> {
    fn describe(&self, aspect: Option<&str>) -> String {
        let mut ctx = format!("conv_id={}", self.conv_id);
        if let Some(turn) = self.turn {
            ctx.push_str(&format!(" turn={turn}"));
        }
        if let Some(aspect) = aspect {
            ctx.push_str(&format!(" aspect={aspect}"));
        }
        ctx
    }

    /// Context for a turn whose index is not known yet.
    fn describe_position(&self, position: usize) -> String {
        format!("conv_id={} turn #{position}", self.conv_id)
    }
}

/// Whether a gold turn role marks an assistant utterance.
fn is_assistant(role: Option<&str>) -> bool {
    role.is_some_and(|r| r.eq_ignore_ascii_case("asst") || r.eq_ignore_ascii_case("assistant"))
}

/// Coerce a score to a finite float. Accepts numbers and numeric strings.
pub fn coerce_score(value: &Value) -> Option<f64> {
    let score = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    score.is_finite().then_some(score)
}

/// Coerce a turn index to an integer. Accepts integers, integral floats and
/// integer strings.
pub fn coerce_turn_index(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// An optional aspect-score mapping: absent or null means no scores.
fn score_mapping<'v>(
    value: &'v Value,
    field: &str,
    location: &Location<'_>,
) -> Result<Option<&'v Map<String, Value>>> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        other => Err(EvalError::schema(
            location.describe(None),
            format!("{field} must be an object of aspect scores, got {other}"),
        )),
    }
}

/// Copy the scores for `aspects` out of a raw mapping. Keys outside `aspects`
/// are ignored without inspecting their values.
fn collect_scores(
    raw: Option<&Map<String, Value>>,
    aspects: &[Aspect],
    location: &Location<'_>,
) -> Result<AnnotationSet> {
    let Some(raw) = raw else {
        return Ok(AnnotationSet::new());
    };
    aspects
        .iter()
        .filter_map(|aspect| raw.get(aspect.as_str()).map(|v| (*aspect, v)))
        .map(|(aspect, value)| {
            coerce_score(value).map(|s| (aspect, s)).ok_or_else(|| {
                EvalError::schema(
                    location.describe(Some(aspect.as_str())),
                    format!("score is not a finite number: {value}"),
                )
            })
        })
        .collect()
}

fn parse_turn_index(value: &Value, context: impl FnOnce() -> String) -> Result<i64> {
    coerce_turn_index(value).ok_or_else(|| {
        EvalError::schema(
            context(),
            format!("turn_ind is missing or not an integer: {value}"),
        )
    })
}

/// Split a document into its records, deserializing each with positional
/// context (plus the `conv_id` when the record carries a readable one).
fn records<T: DeserializeOwned>(document: Value, kind: &str) -> Result<Vec<T>> {
    let Value::Array(items) = document else {
        return Err(EvalError::schema(
            format!("{kind} document"),
            "top-level value must be an array of conversation records",
        ));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let mut context = format!("{kind} record #{i}");
            if let Some(conv_id) = item.get("conv_id").and_then(Value::as_str) {
                context.push_str(&format!(" conv_id={conv_id}"));
            }
            serde_json::from_value(item).map_err(|e| EvalError::schema(context, e.to_string()))
        })
        .collect()
}

/// The turn list of one conversation; absent or null means no turns.
fn turn_records<T: DeserializeOwned>(
    value: &Value,
    field: &str,
    location: &Location<'_>,
) -> Result<Vec<T>> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        other => {
            return Err(EvalError::schema(
                location.describe(None),
                format!("{field} must be an array of turns, got {other}"),
            ));
        }
    };
    items
        .iter()
        .enumerate()
        .map(|(j, item)| {
            T::deserialize(item)
                .map_err(|e| EvalError::schema(location.describe_position(j), e.to_string()))
        })
        .collect()
}

/// Parse a gold document into turn-level and dialogue-level annotations.
///
/// Every dialogue gets a dialogue key (with an empty set when it has no
/// aggregated annotation). Only assistant turns get a turn key.
pub fn parse_gold(document: Value) -> Result<GoldStandard> {
    let mut gold = GoldStandard::default();

    for dialog in records::<RawGoldDialogue>(document, "gold")? {
        let location = Location {
            conv_id: &dialog.conv_id,
            turn: None,
        };
        let dial_set = collect_scores(
            score_mapping(&dialog.dial_level_aggregated, "dial_level_aggregated", &location)?,
            Aspect::at_level(Level::Dialogue),
            &location,
        )?;

        let turns = turn_records::<RawGoldTurn>(&dialog.dialogue, "dialogue", &location)?;
        for (j, turn) in turns.iter().enumerate() {
            let role = match &turn.role {
                Value::Null => None,
                Value::String(role) => Some(role.as_str()),
                other => {
                    return Err(EvalError::schema(
                        location.describe_position(j),
                        format!("role must be a string, got {other}"),
                    ));
                }
            };
            if !is_assistant(role) {
                continue;
            }
            let turn_index = parse_turn_index(&turn.turn_ind, || location.describe_position(j))?;
            let turn_location = Location {
                conv_id: &dialog.conv_id,
                turn: Some(turn_index),
            };
            let set = collect_scores(
                score_mapping(
                    &turn.turn_level_aggregated,
                    "turn_level_aggregated",
                    &turn_location,
                )?,
                Aspect::at_level(Level::Turn),
                &turn_location,
            )?;
            let key = TurnKey::new(dialog.conv_id.clone(), turn_index);
            if gold.turns.insert(key, set).is_some() {
                warn!(conv_id = %dialog.conv_id, turn_index, "Duplicate gold turn, keeping the later one");
            }
        }

        if gold.dialogues.insert(dialog.conv_id.clone(), dial_set).is_some() {
            warn!(conv_id = %dialog.conv_id, "Duplicate gold dialogue, keeping the later one");
        }
    }

    debug!(
        dialogues = gold.dialogues.len(),
        turns = gold.turns.len(),
        "Parsed gold document"
    );
    Ok(gold)
}

/// Parse a gold document from JSON text.
pub fn parse_gold_str(text: &str) -> Result<GoldStandard> {
    parse_gold(serde_json::from_str(text)?)
}

/// Parse a run document into turn-level and dialogue-level predictions.
///
/// Every listed turn and every conversation gets a key, even when its
/// prediction mapping is empty or missing.
pub fn parse_run(document: Value) -> Result<RunPredictions> {
    let mut preds = RunPredictions::default();

    for dialog in records::<RawRunDialogue>(document, "run")? {
        let location = Location {
            conv_id: &dialog.conv_id,
            turn: None,
        };

        let turns = turn_records::<RawRunTurn>(&dialog.turns, "turns", &location)?;
        for (j, turn) in turns.iter().enumerate() {
            let turn_index = parse_turn_index(&turn.turn_ind, || location.describe_position(j))?;
            let turn_location = Location {
                conv_id: &dialog.conv_id,
                turn: Some(turn_index),
            };
            let set = collect_scores(
                score_mapping(&turn.turn_level_pred, "turn_level_pred", &turn_location)?,
                Aspect::at_level(Level::Turn),
                &turn_location,
            )?;
            let key = TurnKey::new(dialog.conv_id.clone(), turn_index);
            if preds.turns.insert(key, set).is_some() {
                warn!(conv_id = %dialog.conv_id, turn_index, "Duplicate predicted turn, keeping the later one");
            }
        }

        let dial_set = collect_scores(
            score_mapping(&dialog.dial_level_pred, "dial_level_pred", &location)?,
            Aspect::at_level(Level::Dialogue),
            &location,
        )?;
        if preds.dialogues.insert(dialog.conv_id.clone(), dial_set).is_some() {
            warn!(conv_id = %dialog.conv_id, "Duplicate predicted dialogue, keeping the later one");
        }
    }

    debug!(
        dialogues = preds.dialogues.len(),
        turns = preds.turns.len(),
        "Parsed run document"
    );
    Ok(preds)
}

/// Parse a run document from JSON text.
pub fn parse_run_str(text: &str) -> Result<RunPredictions> {
    parse_run(serde_json::from_str(text)?)
}
