//! Report rendering: fixed-width text tables and pretty JSON.

use std::fmt::Write;

use crs_arena_core::config::ReportConfig;
use crs_arena_core::{Aspect, Dataset, EvaluationReport, GoldSummary, OutputFormat};

const NOT_AVAILABLE: &str = "N/A";
const LABEL_WIDTH: usize = 18;

/// Render a report in the configured format.
pub fn render_report(report: &EvaluationReport, config: &ReportConfig) -> anyhow::Result<String> {
    match config.format {
        OutputFormat::Text => Ok(render_text(report, config)),
        OutputFormat::Json => render_json(report, config),
    }
}

/// Format a metric, printing the undefined sentinel as `N/A`.
pub fn format_value(value: f64, precision: usize) -> String {
    if value.is_nan() {
        NOT_AVAILABLE.to_string()
    } else {
        format!("{value:.precision$}")
    }
}

fn render_json(report: &EvaluationReport, config: &ReportConfig) -> anyhow::Result<String> {
    let trimmed = EvaluationReport {
        turn_trend: report.turn_trend.up_to(config.max_trend_turn),
        ..report.clone()
    };
    Ok(serde_json::to_string_pretty(&trimmed)?)
}

pub fn render_text(report: &EvaluationReport, config: &ReportConfig) -> String {
    let p = config.precision;
    let col = (p + 4).max(NOT_AVAILABLE.len() + 1);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "CRS Arena evaluation ({})",
        report
            .generated_at
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    );

    for dataset in Dataset::ALL {
        let _ = writeln!(out, "\n== {} ==", dataset.label());
        let _ = writeln!(
            out,
            "{:<LABEL_WIDTH$} {:>col$} {:>col$} {:>6}",
            "Aspect", "Pearson", "Spearman", "n"
        );
        for (aspect, corr) in report.dataset_profile(dataset) {
            let _ = writeln!(
                out,
                "{:<LABEL_WIDTH$} {:>col$} {:>col$} {:>6}",
                aspect.label(),
                format_value(corr.pearson, p),
                format_value(corr.spearman, p),
                corr.n
            );
        }
    }

    let matrix = &report.system_matrix;
    let _ = writeln!(out, "\n== Spearman per system ==");
    if matrix.systems.is_empty() {
        let _ = writeln!(out, "(no systems matched)");
    } else {
        let sys_width = matrix
            .systems
            .iter()
            .map(String::len)
            .max()
            .unwrap_or(0)
            .max("System".len());
        let _ = write!(out, "{:<sys_width$}", "System");
        for aspect in &matrix.aspects {
            let _ = write!(out, " {:>w$}", short_label(*aspect), w = col.max(8));
        }
        out.push('\n');
        for (system, row) in matrix.systems.iter().zip(&matrix.values) {
            let _ = write!(out, "{system:<sys_width$}");
            for value in row {
                let _ = write!(out, " {:>w$}", format_value(*value, p), w = col.max(8));
            }
            out.push('\n');
        }
    }

    let trend = report.turn_trend.up_to(config.max_trend_turn);
    let _ = writeln!(
        out,
        "\n== Spearman by turn index (up to {}) ==",
        config.max_trend_turn
    );
    for aspect in Aspect::TURN {
        let points = trend.points(aspect);
        if points.is_empty() {
            let _ = writeln!(out, "{:<LABEL_WIDTH$} (insufficient pairs)", aspect.label());
            continue;
        }
        let cells: Vec<String> = points
            .iter()
            .map(|pt| format!("t{}={}", pt.turn_index, format_value(pt.spearman, p)))
            .collect();
        let _ = writeln!(out, "{:<LABEL_WIDTH$} {}", aspect.label(), cells.join("  "));
    }

    let c = &report.coverage;
    let _ = writeln!(out, "\n== Coverage ==");
    let _ = writeln!(
        out,
        "Turns:     {}/{} gold matched, {} predicted without gold",
        c.matched_turns, c.gold_turns, c.unmatched_predicted_turns
    );
    let _ = writeln!(
        out,
        "Dialogues: {}/{} gold matched, {} predicted without gold",
        c.matched_dialogues, c.gold_dialogues, c.unmatched_predicted_dialogues
    );
    if !report.skipped_identifiers.is_empty() {
        let _ = writeln!(
            out,
            "Skipped malformed identifiers: {}",
            report.skipped_identifiers.join(", ")
        );
    }
    out
}

/// Compact column header for the system matrix.
fn short_label(aspect: Aspect) -> &'static str {
    match aspect {
        Aspect::Relevance => "Rel",
        Aspect::Interestingness => "Int",
        Aspect::Understanding => "Und",
        Aspect::TaskCompletion => "TaskC",
        Aspect::InterestArousal => "IntAr",
        Aspect::Efficiency => "Eff",
        Aspect::DialogueOverall => "Overall",
    }
}

pub fn render_gold_summary(location: &str, summary: &GoldSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Gold data: {location}");
    let _ = writeln!(out, "  Dialogues:       {}", summary.dialogues);
    let _ = writeln!(out, "  Assistant turns: {}", summary.assistant_turns);
    for dataset in Dataset::ALL {
        let count = summary.dataset_counts.get(&dataset).copied().unwrap_or(0);
        let _ = writeln!(out, "  {:<17}{count}", format!("{}:", dataset.label()));
    }
    if summary.unregistered_dialogues > 0 {
        let _ = writeln!(
            out,
            "  Other datasets:  {}",
            summary.unregistered_dialogues
        );
    }
    let _ = writeln!(out, "  Annotations per aspect:");
    for aspect in Aspect::ALL {
        let count = summary.aspect_counts.get(&aspect).copied().unwrap_or(0);
        let _ = writeln!(out, "    {:<LABEL_WIDTH$} {count}", aspect.label());
    }
    let _ = writeln!(
        out,
        "  Systems ({}): {}",
        summary.systems.len(),
        summary.systems.join(", ")
    );
    if !summary.malformed_identifiers.is_empty() {
        let _ = writeln!(
            out,
            "  Malformed identifiers: {}",
            summary.malformed_identifiers.join(", ")
        );
    }
    out
}
