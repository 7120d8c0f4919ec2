//! Tracking sinks: where tracked points go.
//!
//! - [`TrackingSink`]: the two-operation interface every destination implements
//! - [`MemorySink`]: in-process recorder, useful for embedding and tests
//! - [`RepositorySink`]: buffered, append-only JSON-lines store on disk

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Result, TrackError};
use crate::record::{Subset, TrackedPoint, metric_value};

/// File holding the stored points of one experiment.
pub const METRICS_FILE: &str = "metrics.jsonl";

/// Destination for tracked points.
///
/// `track` may buffer; `flush` makes everything tracked so far durable or
/// visible. Sinks are shared behind `Arc`, so both take `&self`.
pub trait TrackingSink: Send + Sync {
    /// Record one metric point.
    fn track(&self, point: &TrackedPoint) -> Result<()>;

    /// Make previously tracked points durable.
    fn flush(&self) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryState {
    points: Vec<TrackedPoint>,
    flushes: usize,
}

/// Sink that keeps every point in memory and counts flushes.
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<MemoryState>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all points tracked so far.
    pub fn points(&self) -> Vec<TrackedPoint> {
        self.state
            .lock()
            .map(|s| s.points.clone())
            .unwrap_or_default()
    }

    /// Number of times `flush` has been called.
    pub fn flush_count(&self) -> usize {
        self.state.lock().map(|s| s.flushes).unwrap_or_default()
    }
}

impl TrackingSink for MemorySink {
    fn track(&self, point: &TrackedPoint) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| TrackError::poisoned(e.to_string()))?;
        state.points.push(point.clone());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| TrackError::poisoned(e.to_string()))?;
        state.flushes += 1;
        Ok(())
    }
}

/// A tracked point as persisted by [`RepositorySink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPoint {
    pub run_id: String,
    #[serde(with = "metric_value")]
    pub value: f64,
    pub name: String,
    pub epoch: usize,
    pub subset: Subset,
    pub recorded_at: DateTime<Utc>,
}

impl StoredPoint {
    fn from_point(run_id: &str, point: &TrackedPoint) -> Self {
        Self {
            run_id: run_id.to_string(),
            value: point.value,
            name: point.name.clone(),
            epoch: point.epoch,
            subset: point.subset,
            recorded_at: Utc::now(),
        }
    }
}

/// Append-only JSON-lines store, one file per experiment.
///
/// Points are buffered by `track` and written to
/// `<repo>/<experiment>/metrics.jsonl` by `flush`.
#[derive(Debug)]
pub struct RepositorySink {
    repo: PathBuf,
    experiment: String,
    run_id: String,
    pending: Mutex<Vec<StoredPoint>>,
}

impl RepositorySink {
    pub fn new(repo: impl Into<PathBuf>, experiment: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            experiment: experiment.into(),
            run_id: run_id.into(),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Path of the metrics file this sink appends to.
    pub fn metrics_path(&self) -> PathBuf {
        metrics_path(&self.repo, &self.experiment)
    }

    /// Number of tracked points not yet flushed.
    pub fn pending(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or_default()
    }
}

impl TrackingSink for RepositorySink {
    fn track(&self, point: &TrackedPoint) -> Result<()> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|e| TrackError::poisoned(e.to_string()))?;
        pending.push(StoredPoint::from_point(&self.run_id, point));
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|e| TrackError::poisoned(e.to_string()))?;
        if pending.is_empty() {
            return Ok(());
        }

        let mut buf = String::new();
        for point in pending.iter() {
            buf.push_str(&serde_json::to_string(point)?);
            buf.push('\n');
        }

        let path = self.metrics_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // On a failed write the file is cut back to its previous length and the
        // points stay buffered, so a retry never duplicates lines.
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let offset = file.metadata()?.len();
        if let Err(err) = file.write_all(buf.as_bytes()).and_then(|()| file.flush()) {
            if let Err(truncate_err) = file.set_len(offset) {
                tracing::warn!(
                    path = %path.display(),
                    error = %truncate_err,
                    "Failed to roll back partial write"
                );
            }
            return Err(err.into());
        }

        tracing::debug!(
            path = %path.display(),
            points = pending.len(),
            "Flushed tracked points"
        );
        pending.clear();
        Ok(())
    }
}

/// Metrics file of `experiment` inside `repo`.
pub fn metrics_path(repo: &Path, experiment: &str) -> PathBuf {
    repo.join(experiment).join(METRICS_FILE)
}

/// Read every stored point of an experiment, in write order.
///
/// A missing metrics file yields an empty list. Lines that do not decode
/// are skipped with a warning.
pub fn read_points(repo: &Path, experiment: &str) -> Result<Vec<StoredPoint>> {
    let path = metrics_path(repo, experiment);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&path)?;
    Ok(parse_points(&path, &content))
}

fn parse_points(path: &Path, content: &str) -> Vec<StoredPoint> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| match serde_json::from_str(line) {
            Ok(point) => Some(point),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping undecodable stored point"
                );
                None
            }
        })
        .collect()
}

/// Experiments stored in `repo`, sorted by name.
pub fn list_experiments(repo: &Path) -> Result<Vec<String>> {
    if !repo.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(repo)? {
        let entry = entry?;
        if entry.path().join(METRICS_FILE).is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
