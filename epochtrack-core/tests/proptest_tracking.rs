//! Property-based tests for epoch-end extraction and dispatch using proptest.

use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use epochtrack_core::{
    BaseCallback, EpochEndMetrics, LearningRate, LogRecord, MemorySink, MetricExtractor,
    OptimizerHandle, OptimizerState, Session, Subset, TrackedPoint, TrackerOptions,
    TrainingCallback, build_tracker_callback,
};

fn metric_map() -> impl Strategy<Value = BTreeMap<String, f64>> {
    prop::collection::btree_map("[a-z]{1,8}", -1.0e6f64..1.0e6, 0..8)
}

fn memory_session() -> (Session, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    (Session::with_sink(sink.clone(), "repo", "exp"), sink)
}

// --- Extraction properties ---

proptest! {
    #[test]
    fn pushed_points_match_entries_plus_learning_rate(
        train in metric_map(),
        val in metric_map(),
        lr in prop::option::of(1.0e-6f64..1.0),
        epoch in 0usize..1000,
    ) {
        let mut record = LogRecord::new();
        record.extend(train.clone());
        record.extend(val.iter().map(|(k, v)| (format!("val_{k}"), *v)));

        let (session, sink) = memory_session();
        let optimizer = OptimizerState::new(lr.map(LearningRate::Constant));
        let pushed = EpochEndMetrics.log_epoch_metrics(&session, epoch, Some(&record), Some(&optimizer));

        let points = sink.points();
        if record.is_empty() {
            prop_assert_eq!(pushed, 0);
            prop_assert!(points.is_empty());
            prop_assert_eq!(sink.flush_count(), 0);
        } else {
            let expected = train.len() + val.len() + usize::from(lr.is_some());
            prop_assert_eq!(pushed, expected);
            prop_assert_eq!(points.len(), expected);
            prop_assert_eq!(sink.flush_count(), 1);

            let val_names: BTreeSet<&str> = points
                .iter()
                .filter(|p| p.subset == Subset::Val)
                .map(|p| p.name.as_str())
                .collect();
            let expected_val: BTreeSet<&str> = val.keys().map(String::as_str).collect();
            prop_assert_eq!(val_names, expected_val);
            prop_assert!(points.iter().all(|p| p.epoch == epoch));
            prop_assert!(points.iter().all(|p| !p.name.starts_with("val_")));
        }
    }

    #[test]
    fn identical_calls_push_identical_points(
        train in metric_map(),
        epoch in 0usize..100,
    ) {
        prop_assume!(!train.is_empty());
        let (session, sink) = memory_session();

        EpochEndMetrics.log_epoch_metrics(&session, epoch, Some(&train), None);
        EpochEndMetrics.log_epoch_metrics(&session, epoch, Some(&train), None);

        let points = sink.points();
        let half = points.len() / 2;
        prop_assert_eq!(points.len(), train.len() * 2);
        prop_assert_eq!(&points[..half], &points[half..]);
        prop_assert_eq!(sink.flush_count(), 2);
    }
}

// --- Dispatch properties ---

struct Counting {
    handles: bool,
    calls: Arc<AtomicUsize>,
}

impl MetricExtractor for Counting {
    fn name(&self) -> &'static str {
        "Counting"
    }

    fn handles_epoch_end(&self) -> bool {
        self.handles
    }

    fn extract(
        &self,
        epoch: usize,
        _logs: &LogRecord,
        _optimizer: Option<&dyn OptimizerHandle>,
    ) -> Vec<TrackedPoint> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        vec![TrackedPoint::new(0.0, "marker", epoch, Subset::Train)]
    }
}

proptest! {
    #[test]
    fn only_first_handler_ever_runs(
        handles in prop::collection::vec(any::<bool>(), 1..8),
        events in 1usize..6,
    ) {
        let counters: Vec<Arc<AtomicUsize>> =
            handles.iter().map(|_| Arc::new(AtomicUsize::new(0))).collect();
        let extractors: Vec<Box<dyn MetricExtractor>> = handles
            .iter()
            .zip(&counters)
            .map(|(handles, calls)| {
                Box::new(Counting { handles: *handles, calls: calls.clone() }) as Box<dyn MetricExtractor>
            })
            .collect();

        let factory = build_tracker_callback(BaseCallback::default, extractors);
        let (session, sink) = memory_session();
        let mut callback = factory.create(TrackerOptions::default().with_session(session));

        let record = LogRecord::from([("loss".to_string(), 1.0)]);
        for epoch in 0..events {
            callback.on_epoch_end(epoch, Some(&record));
        }

        let winner = handles.iter().position(|h| *h);
        for (index, calls) in counters.iter().enumerate() {
            let expected = if Some(index) == winner { events } else { 0 };
            prop_assert_eq!(calls.load(Ordering::SeqCst), expected);
        }
        let expected_flushes = if winner.is_some() { events } else { 0 };
        prop_assert_eq!(sink.flush_count(), expected_flushes);
    }
}
