//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use crate::output;
use crs_arena_core::config::ArenaConfig;
use crs_arena_core::gold::{self, GoldCache};
use crs_arena_core::{EvalOptions, EvaluationContext, EvaluationReport, OutputFormat};
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Evaluate {
            runs,
            gold,
            format,
            output,
            min_turn_pairs,
        } => {
            let mut config = load(workspace)?;
            if let Some(location) = gold {
                config.gold.location = location;
            }
            if let Some(format) = format {
                config.report.format = format;
            }
            if let Some(min) = min_turn_pairs {
                config.evaluation.min_turn_pairs = min;
            }
            handle_evaluate(runs, output.as_deref(), &config, workspace).await
        }
        Commands::Gold { gold } => {
            let mut config = load(workspace)?;
            if let Some(location) = gold {
                config.gold.location = location;
            }
            handle_gold(&config, workspace).await
        }
        Commands::Config { action } => handle_config(action, workspace).await,
    }
}

fn load(workspace: &Path) -> anyhow::Result<ArenaConfig> {
    crs_arena_core::config::load_config(Some(workspace), None)
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

/// Relative gold paths resolve against the workspace.
fn gold_cache(config: &ArenaConfig, workspace: &Path) -> anyhow::Result<GoldCache> {
    let mut gold_config = config.gold.clone();
    let is_url = gold_config.location.starts_with("http://")
        || gold_config.location.starts_with("https://");
    if !is_url && Path::new(&gold_config.location).is_relative() {
        gold_config.location = workspace
            .join(&gold_config.location)
            .to_string_lossy()
            .into_owned();
    }
    Ok(GoldCache::new(gold::gold_source_from_config(&gold_config)?))
}

async fn handle_evaluate(
    runs: Vec<PathBuf>,
    output_path: Option<&Path>,
    config: &ArenaConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    if let Some(bad) = runs
        .iter()
        .find(|p| p.extension().and_then(|e| e.to_str()) != Some("json"))
    {
        anyhow::bail!("Run file must be a .json document: {}", bad.display());
    }
    if output_path.is_some() && runs.len() > 1 {
        anyhow::bail!("--output accepts a single run file");
    }

    let cache = gold_cache(config, workspace)?;
    let ctx = cache.get_or_load().await?;
    let options = config.evaluation.options();

    let results = evaluate_runs(&ctx, runs, options).await;

    let mut failures = 0usize;
    let multiple = results.len() > 1;
    for (path, result) in results {
        match result {
            Ok(report) => {
                let rendered = output::render_report(&report, &config.report)?;
                if let Some(out) = output_path {
                    std::fs::write(out, &rendered)?;
                    println!("Report written to {}", out.display());
                } else {
                    if multiple && config.report.format == OutputFormat::Text {
                        println!("### {}", path.display());
                    }
                    println!("{rendered}");
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("Error evaluating {}: {e:#}", path.display());
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} run file(s) failed to evaluate");
    }
    Ok(())
}

/// Evaluate every run file concurrently against one shared context.
/// Results come back in the order the files were given.
async fn evaluate_runs(
    ctx: &EvaluationContext,
    runs: Vec<PathBuf>,
    options: EvalOptions,
) -> Vec<(PathBuf, anyhow::Result<EvaluationReport>)> {
    let mut tasks = JoinSet::new();
    for (i, path) in runs.iter().cloned().enumerate() {
        let ctx = ctx.clone();
        tasks.spawn(async move {
            let result = async {
                let text = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
                let report = crs_arena_core::evaluate_document(&ctx, &text, &options)?;
                Ok::<_, anyhow::Error>(report)
            }
            .await;
            (i, result)
        });
    }

    let mut slots: Vec<Option<anyhow::Result<EvaluationReport>>> =
        runs.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((i, result)) => {
                if let Err(e) = &result {
                    warn!(run = %runs[i].display(), error = %e, "Evaluation failed");
                } else {
                    info!(run = %runs[i].display(), "Evaluation finished");
                }
                slots[i] = Some(result);
            }
            Err(e) => warn!(error = %e, "Evaluation task panicked"),
        }
    }

    runs.into_iter()
        .zip(slots)
        .map(|(path, slot)| {
            let result =
                slot.unwrap_or_else(|| Err(anyhow::anyhow!("evaluation task did not complete")));
            (path, result)
        })
        .collect()
}

async fn handle_gold(config: &ArenaConfig, workspace: &Path) -> anyhow::Result<()> {
    let cache = gold_cache(config, workspace)?;
    let ctx = cache.get_or_load().await?;
    let summary = ctx.gold().summary();
    print!("{}", output::render_gold_summary(&cache.location(), &summary));
    Ok(())
}

async fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace.join(".crs-arena").join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let path = crs_arena_core::config::save_workspace_config(
                workspace,
                &ArenaConfig::default(),
            )?;
            println!("Created default configuration at: {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}
