//! Optimizer handle and learning-rate resolution.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ScheduleError;

/// A learning-rate schedule evaluated at an optimizer step.
pub trait LrSchedule: Send + Sync {
    fn rate_at(&self, step: u64) -> Result<f64, ScheduleError>;
}

impl<F> LrSchedule for F
where
    F: Fn(u64) -> Result<f64, ScheduleError> + Send + Sync,
{
    fn rate_at(&self, step: u64) -> Result<f64, ScheduleError> {
        self(step)
    }
}

/// Learning rate as exposed by an optimizer: a fixed value or a schedule.
#[derive(Clone)]
pub enum LearningRate {
    Constant(f64),
    Schedule(Arc<dyn LrSchedule>),
}

impl LearningRate {
    pub fn schedule(schedule: impl LrSchedule + 'static) -> Self {
        Self::Schedule(Arc::new(schedule))
    }

    /// Value of the rate at `step`. Constants ignore the step.
    pub fn at(&self, step: u64) -> Result<f64, ScheduleError> {
        match self {
            LearningRate::Constant(rate) => Ok(*rate),
            LearningRate::Schedule(schedule) => schedule.rate_at(step),
        }
    }
}

impl fmt::Debug for LearningRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LearningRate::Constant(rate) => f.debug_tuple("Constant").field(rate).finish(),
            LearningRate::Schedule(_) => f.write_str("Schedule(..)"),
        }
    }
}

/// `initial_rate * decay_rate ^ (step / decay_steps)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialDecay {
    pub initial_rate: f64,
    pub decay_steps: u64,
    pub decay_rate: f64,
    /// Decay in discrete intervals instead of continuously.
    pub staircase: bool,
}

impl ExponentialDecay {
    pub fn new(initial_rate: f64, decay_steps: u64, decay_rate: f64) -> Self {
        Self {
            initial_rate,
            decay_steps,
            decay_rate,
            staircase: false,
        }
    }

    pub fn staircase(mut self) -> Self {
        self.staircase = true;
        self
    }
}

impl LrSchedule for ExponentialDecay {
    fn rate_at(&self, step: u64) -> Result<f64, ScheduleError> {
        if self.decay_steps == 0 {
            return Err(ScheduleError::InvalidParameter(
                "decay_steps must be greater than zero".into(),
            ));
        }
        let mut progress = step as f64 / self.decay_steps as f64;
        if self.staircase {
            progress = progress.floor();
        }
        Ok(self.initial_rate * self.decay_rate.powf(progress))
    }
}

/// What the tracker needs from the model's optimizer.
pub trait OptimizerHandle: Send + Sync {
    /// The learning-rate attribute, if the optimizer has one.
    fn learning_rate(&self) -> Option<LearningRate>;

    /// Number of optimization steps taken so far.
    fn iterations(&self) -> u64;
}

/// Plain optimizer state usable as an [`OptimizerHandle`].
///
/// The iteration counter is atomic so the training loop can advance it while
/// the tracker holds a shared handle.
#[derive(Debug, Default)]
pub struct OptimizerState {
    learning_rate: Option<LearningRate>,
    iterations: AtomicU64,
}

impl OptimizerState {
    pub fn new(learning_rate: Option<LearningRate>) -> Self {
        Self {
            learning_rate,
            iterations: AtomicU64::new(0),
        }
    }

    pub fn with_iterations(self, iterations: u64) -> Self {
        self.iterations.store(iterations, Ordering::Relaxed);
        self
    }

    /// Record `steps` more optimizer steps.
    pub fn advance(&self, steps: u64) {
        self.iterations.fetch_add(steps, Ordering::Relaxed);
    }
}

impl OptimizerHandle for OptimizerState {
    fn learning_rate(&self) -> Option<LearningRate> {
        self.learning_rate.clone()
    }

    fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }
}

/// Resolve the current learning rate, if any.
///
/// A missing optimizer, a missing rate, or a failing schedule all resolve to
/// `None`; callers treat that as "do not report".
pub fn resolve_learning_rate(optimizer: Option<&dyn OptimizerHandle>) -> Option<f64> {
    let optimizer = optimizer?;
    let rate = optimizer.learning_rate()?;
    let step = optimizer.iterations();
    match rate.at(step) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(step, error = %e, "Learning rate unavailable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_rate_resolves() {
        let opt = OptimizerState::new(Some(LearningRate::Constant(0.001)));
        assert_eq!(resolve_learning_rate(Some(&opt)), Some(0.001));
    }

    #[test]
    fn test_schedule_receives_iterations() {
        let opt = OptimizerState::new(Some(LearningRate::schedule(
            |step: u64| -> Result<f64, ScheduleError> { Ok(1.0 / (step as f64 + 1.0)) },
        )))
        .with_iterations(3);
        assert_eq!(resolve_learning_rate(Some(&opt)), Some(0.25));

        opt.advance(4);
        assert_eq!(resolve_learning_rate(Some(&opt)), Some(0.125));
    }

    #[test]
    fn test_failing_schedule_resolves_to_none() {
        let opt = OptimizerState::new(Some(LearningRate::schedule(
            |step: u64| -> Result<f64, ScheduleError> {
                Err(ScheduleError::evaluation(step, "not built"))
            },
        )));
        assert_eq!(resolve_learning_rate(Some(&opt)), None);
    }

    #[test]
    fn test_missing_rate_or_optimizer_resolves_to_none() {
        let opt = OptimizerState::new(None);
        assert_eq!(resolve_learning_rate(Some(&opt)), None);
        assert_eq!(resolve_learning_rate(None), None);
    }

    #[test]
    fn test_exponential_decay() {
        let schedule = ExponentialDecay::new(0.1, 10, 0.5);
        assert_eq!(schedule.rate_at(0).unwrap(), 0.1);
        assert!((schedule.rate_at(10).unwrap() - 0.05).abs() < 1e-12);
        assert!((schedule.rate_at(5).unwrap() - 0.1 * 0.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_exponential_decay_staircase() {
        let schedule = ExponentialDecay::new(0.1, 10, 0.5).staircase();
        assert_eq!(schedule.rate_at(9).unwrap(), 0.1);
        assert!((schedule.rate_at(25).unwrap() - 0.025).abs() < 1e-12);
    }

    #[test]
    fn test_exponential_decay_zero_steps_is_error() {
        let schedule = ExponentialDecay::new(0.1, 0, 0.5);
        assert!(matches!(
            schedule.rate_at(1),
            Err(ScheduleError::InvalidParameter(_))
        ));
    }
}
