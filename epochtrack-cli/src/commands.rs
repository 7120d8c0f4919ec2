//! CLI subcommand handlers.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use epochtrack_core::sink::{list_experiments, read_points};
use epochtrack_core::{
    LearningRate, LogRecord, OptimizerState, Subset, TrackerConfig, TrackerOptions,
    TrainingCallback, tracker_callback,
};

use crate::{Commands, ConfigAction};

/// Handle a CLI subcommand.
pub fn handle_command(
    command: Commands,
    workspace: &Path,
    config: &TrackerConfig,
) -> anyhow::Result<()> {
    match command {
        Commands::Replay {
            file,
            repo,
            experiment,
            lr,
        } => {
            let repo = resolve_repo(workspace, repo.as_deref().unwrap_or(&config.repo));
            let experiment = experiment.unwrap_or_else(|| config.experiment.clone());
            let summary = replay_file(&file, &repo, &experiment, lr)?;
            println!(
                "Replayed {} epochs into '{}' (run {})",
                summary.epochs, experiment, summary.run_id
            );
            Ok(())
        }
        Commands::Show {
            repo,
            experiment,
            subset,
        } => {
            let repo = resolve_repo(workspace, repo.as_deref().unwrap_or(&config.repo));
            let experiment = experiment.unwrap_or_else(|| config.experiment.clone());
            let subset = subset.map(|s| s.parse::<Subset>()).transpose()?;
            handle_show(&repo, &experiment, subset)
        }
        Commands::Experiments { repo } => {
            let repo = resolve_repo(workspace, repo.as_deref().unwrap_or(&config.repo));
            let experiments = list_experiments(&repo)
                .with_context(|| format!("Failed to list experiments in {}", repo.display()))?;
            if experiments.is_empty() {
                println!("No experiments in {}", repo.display());
            }
            for name in experiments {
                println!("{name}");
            }
            Ok(())
        }
        Commands::Config { action } => handle_config(action, workspace, config),
    }
}

/// Relative repositories are resolved against the workspace.
fn resolve_repo(workspace: &Path, repo: &Path) -> PathBuf {
    workspace.join(repo)
}

/// One line of a replay file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplayLine {
    Indexed { epoch: usize, logs: LogRecord },
    Bare(LogRecord),
}

fn parse_replay_line(line: &str, index: usize) -> anyhow::Result<(usize, LogRecord)> {
    let parsed: ReplayLine = serde_json::from_str(line)
        .with_context(|| format!("Invalid log record on line {}", index + 1))?;
    Ok(match parsed {
        ReplayLine::Indexed { epoch, logs } => (epoch, logs),
        ReplayLine::Bare(logs) => (index, logs),
    })
}

/// Parse a replay file. Blank lines are skipped but still count towards the
/// line index, which is also the epoch of bare records.
fn parse_replay(content: &str) -> anyhow::Result<Vec<(usize, LogRecord)>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| parse_replay_line(line, index))
        .collect()
}

#[derive(Debug)]
struct ReplaySummary {
    epochs: usize,
    run_id: String,
}

fn replay_file(
    file: &Path,
    repo: &Path,
    experiment: &str,
    lr: Option<f64>,
) -> anyhow::Result<ReplaySummary> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let records = parse_replay(&content)?;

    let mut callback = tracker_callback(TrackerOptions::new(
        Some(repo.to_path_buf()),
        Some(experiment.to_string()),
    ));
    callback.set_optimizer(Arc::new(OptimizerState::new(lr.map(LearningRate::Constant))));

    callback.on_train_begin();
    for (epoch, logs) in &records {
        callback.on_epoch_begin(*epoch);
        callback.on_epoch_end(*epoch, Some(logs));
    }
    callback.on_train_end();

    tracing::info!(
        file = %file.display(),
        epochs = records.len(),
        experiment,
        "Replay finished"
    );

    Ok(ReplaySummary {
        epochs: records.len(),
        run_id: callback.session().run_id().to_string(),
    })
}

fn handle_show(repo: &Path, experiment: &str, subset: Option<Subset>) -> anyhow::Result<()> {
    let points = read_points(repo, experiment)
        .with_context(|| format!("Failed to read experiment '{experiment}'"))?;
    let points: Vec<_> = points
        .into_iter()
        .filter(|p| subset.is_none_or(|s| p.subset == s))
        .collect();

    if points.is_empty() {
        println!("No points recorded for '{experiment}'");
        return Ok(());
    }

    println!("{:>6}  {:<6}  {:<24}  {:>14}  RUN", "EPOCH", "SUBSET", "METRIC", "VALUE");
    for p in &points {
        let run_short: String = p.run_id.chars().take(8).collect();
        println!(
            "{:>6}  {:<6}  {:<24}  {:>14.6}  {}",
            p.epoch, p.subset, p.name, p.value, run_short
        );
    }
    Ok(())
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config: &TrackerConfig,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = epochtrack_core::config::workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let toml_str = toml::to_string_pretty(&TrackerConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            print!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
    }
}
