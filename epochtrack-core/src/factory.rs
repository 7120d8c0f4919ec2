//! Tracker callback factory.
//!
//! [`build_tracker_callback`] layers an ordered list of [`MetricExtractor`]
//! strategies on top of a framework base callback. Callbacks created by the
//! factory own a [`Session`] and route every epoch-end event to exactly one
//! strategy.
//!
//! # Dispatch order
//!
//! Strategies are consulted in registration order and the **first** one whose
//! [`handles_epoch_end`](MetricExtractor::handles_epoch_end) is `true` wins.
//! Later strategies never run, even when they also handle epoch end. Register
//! the strategy that should report metrics first.
//!
//! # Example
//!
//! ```
//! use epochtrack_core::callback::{BaseCallback, TrainingCallback};
//! use epochtrack_core::extraction::EpochEndMetrics;
//! use epochtrack_core::factory::{TrackerOptions, build_tracker_callback};
//! use epochtrack_core::record::LogRecord;
//! use epochtrack_core::session::Session;
//! use epochtrack_core::sink::MemorySink;
//! use std::sync::Arc;
//!
//! let factory = build_tracker_callback(BaseCallback::default, vec![Box::new(EpochEndMetrics)]);
//! let sink = Arc::new(MemorySink::new());
//! let mut callback = factory.create(TrackerOptions::default().with_session(
//!     Session::with_sink(sink.clone(), "runs", "mnist"),
//! ));
//!
//! let logs = LogRecord::from([("loss".to_string(), 0.5), ("val_loss".to_string(), 0.7)]);
//! callback.on_epoch_end(0, Some(&logs));
//! assert_eq!(sink.points().len(), 2);
//! assert_eq!(sink.flush_count(), 1);
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use crate::callback::{BaseCallback, CallbackAction, TrainingCallback};
use crate::extraction::{EpochEndMetrics, MetricExtractor};
use crate::optimizer::OptimizerHandle;
use crate::record::LogRecord;
use crate::session::Session;

/// Ordered, immutable list of extraction strategies.
///
/// Only the first strategy that handles epoch end is ever dispatched to; see
/// the [module docs](self).
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn MetricExtractor>>,
}

impl ExtractorRegistry {
    pub fn new(extractors: Vec<Box<dyn MetricExtractor>>) -> Self {
        Self { extractors }
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Strategy names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    /// The strategy epoch-end events are routed to, if any.
    pub fn epoch_end_handler(&self) -> Option<&dyn MetricExtractor> {
        self.extractors
            .iter()
            .find(|e| e.handles_epoch_end())
            .map(|e| &**e)
    }

    /// Route one epoch-end event to the owning strategy.
    ///
    /// Returns the number of points pushed, or `None` when no strategy
    /// handles epoch end.
    pub fn dispatch(
        &self,
        session: &Session,
        epoch: usize,
        logs: Option<&LogRecord>,
        optimizer: Option<&dyn OptimizerHandle>,
    ) -> Option<usize> {
        let handler = self.epoch_end_handler()?;
        Some(handler.log_epoch_metrics(session, epoch, logs, optimizer))
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("extractors", &self.names())
            .finish()
    }
}

/// Construction parameters of a tracker callback. All optional.
#[derive(Debug, Clone, Default)]
pub struct TrackerOptions {
    pub repo: Option<PathBuf>,
    pub experiment: Option<String>,
    /// Explicit session. Deprecated in favor of `repo` and `experiment`.
    pub session: Option<Session>,
}

impl TrackerOptions {
    pub fn new(repo: Option<PathBuf>, experiment: Option<String>) -> Self {
        Self {
            repo,
            experiment,
            session: None,
        }
    }

    pub fn with_repo(mut self, repo: impl Into<PathBuf>) -> Self {
        self.repo = Some(repo.into());
        self
    }

    pub fn with_experiment(mut self, experiment: impl Into<String>) -> Self {
        self.experiment = Some(experiment.into());
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    fn into_session(self) -> Session {
        match self.session {
            Some(session) => {
                tracing::warn!(
                    "Passing a session to the tracker callback is deprecated, \
                     pass repo and experiment instead"
                );
                session
            }
            None if self.repo.is_none() && self.experiment.is_none() => Session::default(),
            None => Session::new(self.repo, self.experiment),
        }
    }
}

type BaseConstructor<B> = Box<dyn Fn() -> B + Send + Sync>;

/// Builds [`TrackerCallback`]s over a base callback type and a fixed registry.
pub struct TrackerCallbackFactory<B> {
    base: BaseConstructor<B>,
    registry: Arc<ExtractorRegistry>,
}

/// Compose a tracker callback type from a base callback and extraction strategies.
///
/// `extractors` is ordered: the first strategy handling epoch end wins. An
/// empty list is accepted, but callbacks built from it never report anything.
pub fn build_tracker_callback<B, F>(
    base: F,
    extractors: Vec<Box<dyn MetricExtractor>>,
) -> TrackerCallbackFactory<B>
where
    B: TrainingCallback,
    F: Fn() -> B + Send + Sync + 'static,
{
    let registry = ExtractorRegistry::new(extractors);
    if registry.epoch_end_handler().is_none() {
        tracing::warn!(
            extractors = ?registry.names(),
            "No registered extractor handles epoch end, tracker callback will not report metrics"
        );
    }
    TrackerCallbackFactory {
        base: Box::new(base),
        registry: Arc::new(registry),
    }
}

impl<B: TrainingCallback> TrackerCallbackFactory<B> {
    /// Construct a callback, resolving its session from `options`.
    ///
    /// - explicit session: used as is, with a deprecation warning
    /// - neither repo nor experiment: the process-wide default session
    /// - otherwise: a session scoped to the given repo/experiment
    pub fn create(&self, options: TrackerOptions) -> TrackerCallback<B> {
        TrackerCallback {
            base: (self.base)(),
            registry: Arc::clone(&self.registry),
            session: options.into_session(),
            optimizer: None,
        }
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

/// Tracker callback over [`BaseCallback`] with the stock [`EpochEndMetrics`] strategy.
pub fn tracker_callback(options: TrackerOptions) -> TrackerCallback<BaseCallback> {
    build_tracker_callback(BaseCallback::default, vec![Box::new(EpochEndMetrics)]).create(options)
}

/// A base callback with metric tracking layered on top.
///
/// All hooks except `on_epoch_end` are forwarded to the base; epoch end is
/// handled by the registry.
pub struct TrackerCallback<B> {
    base: B,
    registry: Arc<ExtractorRegistry>,
    session: Session,
    optimizer: Option<Arc<dyn OptimizerHandle>>,
}

impl<B> TrackerCallback<B> {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    pub fn base(&self) -> &B {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut B {
        &mut self.base
    }
}

impl<B: TrainingCallback> TrainingCallback for TrackerCallback<B> {
    fn set_optimizer(&mut self, optimizer: Arc<dyn OptimizerHandle>) {
        self.optimizer = Some(Arc::clone(&optimizer));
        self.base.set_optimizer(optimizer);
    }

    fn on_train_begin(&mut self) -> CallbackAction {
        self.base.on_train_begin()
    }

    fn on_epoch_begin(&mut self, epoch: usize) -> CallbackAction {
        self.base.on_epoch_begin(epoch)
    }

    fn on_epoch_end(&mut self, epoch: usize, logs: Option<&LogRecord>) -> CallbackAction {
        self.registry
            .dispatch(&self.session, epoch, logs, self.optimizer.as_deref());
        CallbackAction::Continue
    }

    fn on_train_end(&mut self) {
        self.base.on_train_end()
    }

    fn name(&self) -> &'static str {
        "TrackerCallback"
    }
}

impl<B: std::fmt::Debug> std::fmt::Debug for TrackerCallback<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerCallback")
            .field("base", &self.base)
            .field("registry", &self.registry)
            .field("session", &self.session)
            .field("has_optimizer", &self.optimizer.is_some())
            .finish()
    }
}
