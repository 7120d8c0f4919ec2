//! Epoch-end metric extraction strategies.
//!
//! A [`MetricExtractor`] turns one epoch's [`LogRecord`] into tracked points.
//! Its provided [`log_epoch_metrics`](MetricExtractor::log_epoch_metrics)
//! pushes those points through a [`Session`] and flushes once per epoch.

use crate::optimizer::{OptimizerHandle, resolve_learning_rate};
use crate::record::{LEARNING_RATE_METRIC, LogRecord, Subset, TrackedPoint};
use crate::session::Session;

/// A strategy for reporting epoch-end metrics.
pub trait MetricExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this strategy defines its own epoch-end routine.
    ///
    /// Strategies that only contribute other behavior return `false` and are
    /// skipped by epoch-end dispatch.
    fn handles_epoch_end(&self) -> bool {
        true
    }

    /// Points to report for `epoch`. `logs` is never empty here.
    fn extract(
        &self,
        epoch: usize,
        logs: &LogRecord,
        optimizer: Option<&dyn OptimizerHandle>,
    ) -> Vec<TrackedPoint>;

    /// Extract, push every point through `session`, then flush once.
    ///
    /// Absent or empty logs are a no-op. Sink failures are logged and
    /// skipped; this never fails. Returns the number of points pushed.
    fn log_epoch_metrics(
        &self,
        session: &Session,
        epoch: usize,
        logs: Option<&LogRecord>,
        optimizer: Option<&dyn OptimizerHandle>,
    ) -> usize {
        let Some(logs) = logs.filter(|logs| !logs.is_empty()) else {
            return 0;
        };

        let points = self.extract(epoch, logs, optimizer);
        let mut pushed = 0;
        for point in &points {
            match session.track_point(point) {
                Ok(()) => pushed += 1,
                Err(e) => tracing::warn!(
                    metric = %point.name,
                    subset = %point.subset,
                    epoch,
                    error = %e,
                    "Failed to track metric"
                ),
            }
        }

        if let Err(e) = session.flush() {
            tracing::warn!(epoch, error = %e, "Failed to flush tracked metrics");
        }

        tracing::debug!(
            extractor = self.name(),
            epoch,
            pushed,
            "Logged epoch metrics"
        );
        pushed
    }
}

/// Stock strategy: train metrics under their own name, `val_`-prefixed
/// metrics under the stripped name in the `val` subset, plus `lr` when the
/// optimizer's learning rate resolves.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochEndMetrics;

impl MetricExtractor for EpochEndMetrics {
    fn name(&self) -> &'static str {
        "EpochEndMetrics"
    }

    fn extract(
        &self,
        epoch: usize,
        logs: &LogRecord,
        optimizer: Option<&dyn OptimizerHandle>,
    ) -> Vec<TrackedPoint> {
        let (val, train): (Vec<TrackedPoint>, Vec<TrackedPoint>) = logs
            .iter()
            .map(|(key, value)| {
                let (subset, name) = Subset::classify(key);
                TrackedPoint::new(*value, name, epoch, subset)
            })
            .partition(|point| point.subset == Subset::Val);

        let mut points = train;
        points.extend(val);

        if let Some(lr) = resolve_learning_rate(optimizer) {
            points.push(TrackedPoint::new(
                lr,
                LEARNING_RATE_METRIC,
                epoch,
                Subset::Train,
            ));
        }
        points
    }
}
