//! Tracking sessions.
//!
//! A [`Session`] binds tracked points to a repository, an experiment and a run.
//! Clones share the same underlying sink.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::channel::default_channel;
use crate::error::Result;
use crate::record::{Subset, TrackedPoint};
use crate::sink::{RepositorySink, TrackingSink};

/// Handle to a tracking destination.
#[derive(Clone)]
pub struct Session {
    repo: PathBuf,
    experiment: String,
    run_id: String,
    created_at: DateTime<Utc>,
    sink: Arc<dyn TrackingSink>,
}

impl Session {
    /// Open a session scoped to a repository and experiment.
    ///
    /// Whichever identifier is missing falls back to the configured default.
    /// The default channel is only consulted when one is missing.
    pub fn new(repo: Option<PathBuf>, experiment: Option<String>) -> Self {
        let (repo, experiment) = match (repo, experiment) {
            (Some(repo), Some(experiment)) => (repo, experiment),
            (repo, experiment) => {
                let defaults = default_channel().config();
                (
                    repo.unwrap_or_else(|| defaults.repo.clone()),
                    experiment.unwrap_or_else(|| defaults.experiment.clone()),
                )
            }
        };
        let run_id = uuid::Uuid::new_v4().to_string();
        let sink = Arc::new(RepositorySink::new(
            repo.clone(),
            experiment.clone(),
            run_id.clone(),
        ));

        tracing::debug!(
            repo = %repo.display(),
            experiment = %experiment,
            run_id = %run_id,
            "Opened tracking session"
        );

        Self {
            repo,
            experiment,
            run_id,
            created_at: Utc::now(),
            sink,
        }
    }

    /// Bind a session to an arbitrary sink.
    pub fn with_sink(
        sink: Arc<dyn TrackingSink>,
        repo: impl Into<PathBuf>,
        experiment: impl Into<String>,
    ) -> Self {
        Self {
            repo: repo.into(),
            experiment: experiment.into(),
            run_id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            sink,
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

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether both sessions write through the same sink instance.
    pub fn shares_sink_with(&self, other: &Session) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.sink), Arc::as_ptr(&other.sink))
    }

    /// Record one metric point.
    pub fn track(&self, value: f64, name: &str, epoch: usize, subset: Subset) -> Result<()> {
        self.track_point(&TrackedPoint::new(value, name, epoch, subset))
    }

    pub fn track_point(&self, point: &TrackedPoint) -> Result<()> {
        self.sink.track(point)
    }

    /// Make tracked points durable.
    pub fn flush(&self) -> Result<()> {
        self.sink.flush()
    }
}

impl Default for Session {
    /// Session bound to the process-wide default channel.
    fn default() -> Self {
        let channel = default_channel();
        Self {
            repo: channel.config().repo.clone(),
            experiment: channel.config().experiment.clone(),
            run_id: channel.run_id().to_string(),
            created_at: Utc::now(),
            sink: channel.sink(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("repo", &self.repo)
            .field("experiment", &self.experiment)
            .field("run_id", &self.run_id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemorySink, read_points};

    #[test]
    fn test_with_sink_forwards_track_and_flush() {
        let sink = Arc::new(MemorySink::new());
        let session = Session::with_sink(sink.clone(), "repo", "exp");

        session.track(0.25, "loss", 2, Subset::Train).unwrap();
        session.flush().unwrap();

        assert_eq!(
            sink.points(),
            vec![TrackedPoint::new(0.25, "loss", 2, Subset::Train)]
        );
        assert_eq!(sink.flush_count(), 1);
        assert_eq!(session.experiment(), "exp");
    }

    #[test]
    fn test_new_session_writes_to_repository() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new(Some(dir.path().to_path_buf()), Some("mnist".into()));

        session.track(0.9, "accuracy", 0, Subset::Val).unwrap();
        session.flush().unwrap();

        let stored = read_points(dir.path(), "mnist").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].run_id, session.run_id());
        assert_eq!(stored[0].subset, Subset::Val);
    }

    #[test]
    fn test_new_session_fills_missing_experiment() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new(Some(dir.path().to_path_buf()), None);
        assert_eq!(session.repo(), dir.path());
        assert_eq!(session.experiment(), default_channel().config().experiment);
    }

    #[test]
    fn test_new_session_keeps_both_given_identifiers() {
        let session = Session::new(
            Some(PathBuf::from("/srv/tracking")),
            Some("imagenet".to_string()),
        );
        assert_eq!(session.repo(), Path::new("/srv/tracking"));
        assert_eq!(session.experiment(), "imagenet");
        assert!(!session.shares_sink_with(&Session::default()));
    }

    #[test]
    fn test_sessions_get_distinct_run_ids() {
        let a = Session::new(Some(PathBuf::from("r")), Some("e".into()));
        let b = Session::new(Some(PathBuf::from("r")), Some("e".into()));
        assert_ne!(a.run_id(), b.run_id());
        assert!(!a.shares_sink_with(&b));
    }

    #[test]
    fn test_default_sessions_share_default_channel() {
        let a = Session::default();
        let b = Session::default();
        assert!(a.shares_sink_with(&b));
        assert_eq!(a.run_id(), default_channel().run_id());
    }

    #[test]
    fn test_clone_shares_sink() {
        let session = Session::with_sink(Arc::new(MemorySink::new()), "repo", "exp");
        let cloned = session.clone();
        assert!(session.shares_sink_with(&cloned));
        assert_eq!(session.run_id(), cloned.run_id());
    }
}
