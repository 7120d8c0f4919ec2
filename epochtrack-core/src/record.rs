//! Log records and tracked points.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::TrackError;

/// Reserved prefix marking validation-subset metrics in a log record.
pub const VALIDATION_PREFIX: &str = "val_";

/// Metric name used for the learning-rate point.
pub const LEARNING_RATE_METRIC: &str = "lr";

/// Metric name to value, produced once per epoch by the training loop.
pub type LogRecord = BTreeMap<String, f64>;

/// Data subset a metric belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subset {
    Train,
    Val,
}

impl Subset {
    /// Classify a raw log-record key, returning the subset and the reported name.
    pub fn classify(key: &str) -> (Self, &str) {
        match key.strip_prefix(VALIDATION_PREFIX) {
            Some(stripped) => (Subset::Val, stripped),
            None => (Subset::Train, key),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Subset::Train => "train",
            Subset::Val => "val",
        }
    }
}

impl fmt::Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Subset {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Subset::Train),
            "val" => Ok(Subset::Val),
            other => Err(TrackError::invalid_input(format!(
                "unknown subset '{other}', expected 'train' or 'val'"
            ))),
        }
    }
}

/// One metric value for one epoch, as pushed to a tracking sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedPoint {
    #[serde(with = "metric_value")]
    pub value: f64,
    pub name: String,
    pub epoch: usize,
    pub subset: Subset,
}

impl TrackedPoint {
    pub fn new(value: f64, name: impl Into<String>, epoch: usize, subset: Subset) -> Self {
        Self {
            value,
            name: name.into(),
            epoch,
            subset,
        }
    }
}

/// Serde adapter for metric values that keeps non-finite floats.
///
/// JSON has no NaN or infinity, so those are written as the strings `"NaN"`,
/// `"inf"` and `"-inf"`. `null` reads back as NaN.
pub mod metric_value {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { "inf" } else { "-inf" })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(MetricValueVisitor)
    }

    struct MetricValueVisitor;

    impl<'de> Visitor<'de> for MetricValueVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number, null, or one of \"NaN\", \"inf\", \"-inf\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_unit<E: de::Error>(self) -> Result<f64, E> {
            Ok(f64::NAN)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            match v {
                "NaN" | "nan" => Ok(f64::NAN),
                "inf" | "Infinity" => Ok(f64::INFINITY),
                "-inf" | "-Infinity" => Ok(f64::NEG_INFINITY),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_train_key() {
        assert_eq!(Subset::classify("loss"), (Subset::Train, "loss"));
        assert_eq!(Subset::classify("accuracy"), (Subset::Train, "accuracy"));
    }

    #[test]
    fn test_classify_val_key_strips_prefix() {
        assert_eq!(Subset::classify("val_loss"), (Subset::Val, "loss"));
        assert_eq!(Subset::classify("val_"), (Subset::Val, ""));
    }

    #[test]
    fn test_classify_prefix_must_be_leading() {
        assert_eq!(Subset::classify("top_val_acc"), (Subset::Train, "top_val_acc"));
        assert_eq!(Subset::classify("val"), (Subset::Train, "val"));
    }

    #[test]
    fn test_subset_parse_and_display() {
        assert_eq!("train".parse::<Subset>().unwrap(), Subset::Train);
        assert_eq!("val".parse::<Subset>().unwrap(), Subset::Val);
        assert!("test".parse::<Subset>().is_err());
        assert_eq!(Subset::Val.to_string(), "val");
    }

    #[test]
    fn test_point_serializes_subset_lowercase() {
        let point = TrackedPoint::new(0.5, "loss", 3, Subset::Train);
        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["subset"], "train");
        assert_eq!(json["epoch"], 3);
    }

    #[test]
    fn test_non_finite_values_survive_json() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let point = TrackedPoint::new(value, "loss", 1, Subset::Train);
            let json = serde_json::to_string(&point).unwrap();
            assert!(!json.contains("null"));
            let back: TrackedPoint = serde_json::from_str(&json).unwrap();
            if value.is_nan() {
                assert!(back.value.is_nan());
            } else {
                assert_eq!(back.value, value);
            }
        }
    }

    #[test]
    fn test_null_value_reads_as_nan() {
        let json = r#"{"value":null,"name":"loss","epoch":0,"subset":"train"}"#;
        let point: TrackedPoint = serde_json::from_str(json).unwrap();
        assert!(point.value.is_nan());
    }

    #[test]
    fn test_unknown_value_string_is_rejected() {
        let json = r#"{"value":"high","name":"loss","epoch":0,"subset":"train"}"#;
        assert!(serde_json::from_str::<TrackedPoint>(json).is_err());
    }
}
