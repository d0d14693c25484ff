//! Metric Record - one point of a run's metric time series

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metric Record represents a single metric data point.
///
/// A run's summary view exposes only the latest point per key; tracking
/// stores keep the full series ordered by step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metric {
    key: String,
    #[serde(with = "non_finite")]
    value: f64,
    timestamp: DateTime<Utc>,
    step: i64,
}

impl Metric {
    /// Create a metric point at step 0 with the current timestamp.
    #[must_use]
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value,
            timestamp: Utc::now(),
            step: 0,
        }
    }

    /// Create a builder for a metric point with explicit timestamp or step.
    #[must_use]
    pub fn builder(key: impl Into<String>, value: f64) -> MetricBuilder {
        MetricBuilder::new(key, value)
    }

    /// Get the metric key/name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the metric value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Get the timestamp when the metric was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Get the step number.
    #[must_use]
    pub const fn step(&self) -> i64 {
        self.step
    }

    /// Whether `self` supersedes `other` as the latest point of a series.
    ///
    /// Ordering is by step, then timestamp; ties go to the later write.
    #[must_use]
    pub fn is_newer_than(&self, other: &Self) -> bool {
        (self.step, self.timestamp) >= (other.step, other.timestamp)
    }
}

/// Builder for `Metric`.
#[derive(Debug)]
pub struct MetricBuilder {
    key: String,
    value: f64,
    timestamp: DateTime<Utc>,
    step: i64,
}

impl MetricBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value,
            timestamp: Utc::now(),
            step: 0,
        }
    }

    /// Set a custom timestamp.
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the step.
    #[must_use]
    pub const fn step(mut self, step: i64) -> Self {
        self.step = step;
        self
    }

    /// Build the `Metric`.
    #[must_use]
    pub fn build(self) -> Metric {
        Metric {
            key: self.key,
            value: self.value,
            timestamp: self.timestamp,
            step: self.step,
        }
    }
}

/// JSON has no literal for NaN or the infinities, so those values travel as
/// the strings `"NaN"`, `"Infinity"` and `"-Infinity"`.
mod non_finite {
    use std::fmt;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    const NAN: &str = "NaN";
    const INFINITY: &str = "Infinity";
    const NEG_INFINITY: &str = "-Infinity";

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str(NAN)
        } else if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { INFINITY } else { NEG_INFINITY })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(MetricValueVisitor)
    }

    struct MetricValueVisitor;

    impl Visitor<'_> for MetricValueVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a number or one of \"NaN\", \"Infinity\", \"-Infinity\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        #[allow(clippy::cast_precision_loss)]
        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        #[allow(clippy::cast_precision_loss)]
        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            match v {
                NAN => Ok(f64::NAN),
                INFINITY => Ok(f64::INFINITY),
                NEG_INFINITY => Ok(f64::NEG_INFINITY),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }
}
