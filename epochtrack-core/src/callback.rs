//! Training callback capability — the hooks a training loop invokes.

use std::sync::Arc;

use crate::optimizer::OptimizerHandle;
use crate::record::LogRecord;

/// Action a callback can request from the training loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Continue,
    Stop,
}

/// Trait for training callbacks.
///
/// Every hook has a no-op default, so implementors only override the events
/// they care about.
pub trait TrainingCallback: Send {
    /// Called once the model is compiled, with a handle to its optimizer.
    fn set_optimizer(&mut self, _optimizer: Arc<dyn OptimizerHandle>) {}

    /// Called before training starts.
    fn on_train_begin(&mut self) -> CallbackAction {
        CallbackAction::Continue
    }

    /// Called before each epoch.
    fn on_epoch_begin(&mut self, _epoch: usize) -> CallbackAction {
        CallbackAction::Continue
    }

    /// Called at the end of each epoch with that epoch's logs, if any.
    fn on_epoch_end(&mut self, _epoch: usize, _logs: Option<&LogRecord>) -> CallbackAction {
        CallbackAction::Continue
    }

    /// Called after training ends.
    fn on_train_end(&mut self) {}

    fn name(&self) -> &'static str {
        "TrainingCallback"
    }
}

/// The plain base callback: every hook is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseCallback;

impl TrainingCallback for BaseCallback {
    fn name(&self) -> &'static str {
        "BaseCallback"
    }
}
