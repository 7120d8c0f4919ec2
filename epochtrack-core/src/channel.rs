//! Process-wide default tracking channel.
//!
//! Created lazily on first use from the layered configuration of the current
//! directory. Sessions built without a repository or experiment bind to it.

use std::sync::{Arc, OnceLock};

use crate::config::{TrackerConfig, load_config};
use crate::error::Result;
use crate::record::{Subset, TrackedPoint};
use crate::sink::{RepositorySink, TrackingSink};

/// The default channel: a repository store for the configured defaults.
#[derive(Debug)]
pub struct DefaultChannel {
    config: TrackerConfig,
    sink: Arc<RepositorySink>,
}

impl DefaultChannel {
    fn from_config(config: TrackerConfig) -> Self {
        let run_id = uuid::Uuid::new_v4().to_string();
        let sink = Arc::new(RepositorySink::new(
            config.repo.clone(),
            config.experiment.clone(),
            run_id,
        ));
        Self { config, sink }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn run_id(&self) -> &str {
        self.sink.run_id()
    }

    pub fn sink(&self) -> Arc<RepositorySink> {
        Arc::clone(&self.sink)
    }

    /// Buffer one point on this channel's run.
    pub fn track(&self, value: f64, name: &str, epoch: usize, subset: Subset) -> Result<()> {
        self.sink
            .track(&TrackedPoint::new(value, name, epoch, subset))
    }

    pub fn flush(&self) -> Result<()> {
        self.sink.flush()
    }
}

static DEFAULT_CHANNEL: OnceLock<DefaultChannel> = OnceLock::new();

/// The process-wide default channel, created on first call.
pub fn default_channel() -> &'static DefaultChannel {
    DEFAULT_CHANNEL.get_or_init(|| {
        let config = match load_config(std::env::current_dir().ok().as_deref(), None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load tracker config, using defaults");
                TrackerConfig::default()
            }
        };
        tracing::debug!(
            repo = %config.repo.display(),
            experiment = %config.experiment,
            "Initialized default tracking channel"
        );
        DefaultChannel::from_config(config)
    })
}

/// Track one point on the default channel.
pub fn track(value: f64, name: &str, epoch: usize, subset: Subset) -> Result<()> {
    default_channel().track(value, name, epoch, subset)
}

/// Flush the default channel.
pub fn flush() -> Result<()> {
    default_channel().flush()
}
