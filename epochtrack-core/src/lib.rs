//! # epochtrack-core — per-epoch metric tracking for training loops
//!
//! Forwards the metrics a training loop reports at the end of every epoch to
//! an experiment-tracking store.
//!
//! - [`callback`]: the [`TrainingCallback`] hooks a training loop invokes
//! - [`extraction`]: strategies that turn an epoch's log record into tracked points
//! - [`factory`]: composes a base callback with an ordered strategy registry
//! - [`session`], [`sink`], [`channel`]: where tracked points go
//! - [`optimizer`]: learning-rate lookup on the model's optimizer
//! - [`config`]: layered configuration

pub mod callback;
pub mod channel;
pub mod config;
pub mod error;
pub mod extraction;
pub mod factory;
pub mod optimizer;
pub mod record;
pub mod session;
pub mod sink;

// Re-exports
pub use callback::{BaseCallback, CallbackAction, TrainingCallback};
pub use config::{TrackerConfig, load_config};
pub use error::{Result, ScheduleError, TrackError};
pub use extraction::{EpochEndMetrics, MetricExtractor};
pub use factory::{
    ExtractorRegistry, TrackerCallback, TrackerCallbackFactory, TrackerOptions,
    build_tracker_callback, tracker_callback,
};
pub use optimizer::{LearningRate, LrSchedule, OptimizerHandle, OptimizerState};
pub use record::{LogRecord, Subset, TrackedPoint, VALIDATION_PREFIX};
pub use session::Session;
pub use sink::{MemorySink, RepositorySink, TrackingSink};
