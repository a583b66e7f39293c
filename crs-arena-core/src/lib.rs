//! # CRS Arena Core
//!
//! Evaluation engine for CRS Arena: scores machine judgments of
//! conversational-recommender dialogues against human gold annotations.
//! Provides the statistics primitives, the record model and document parsers,
//! identifier decomposition, the aggregation passes, the evaluation
//! orchestrator, gold loading, and configuration.

pub mod aggregate;
pub mod aspect;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod gold;
pub mod identifier;
pub mod parse;
pub mod records;
pub mod stats;

// Re-export commonly used types at the crate root.
pub use aggregate::{SystemMatrix, SystemScores, TrendPoint, TurnTrend};
pub use aspect::{Aspect, Dataset, Level};
pub use config::{ArenaConfig, OutputFormat};
pub use error::{EvalError, MalformedIdentifier, Result};
pub use evaluation::{Coverage, EvalOptions, EvaluationReport, evaluate, evaluate_document};
pub use gold::{EvaluationContext, GoldCache, GoldSource};
pub use identifier::{dataset_of, system_of};
pub use parse::{parse_gold, parse_gold_str, parse_run, parse_run_str};
pub use records::{AnnotationSet, GoldStandard, GoldSummary, RunPredictions, TurnKey};
pub use stats::Correlation;
