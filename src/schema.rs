use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Point-in-time status document returned by the source.
///
/// One snapshot is produced per tick and never mutated afterwards.
///
/// `local_time` is the source's own wall clock (`localTime` in
/// `serverStatus`), which is what every point of the tick is stamped with.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Wall clock of the source at the time of the query
    pub local_time: DateTime<Utc>,

    /// Nested status document (relaxed extended JSON)
    pub document: Value,
}

impl Snapshot {
    pub fn new(local_time: DateTime<Utc>, document: Value) -> Self {
        Self { local_time, document }
    }

    /// Timestamp used for every point of this snapshot, in whole seconds.
    pub fn timestamp(&self) -> i64 {
        self.local_time.timestamp()
    }
}

// ------------------------------------------------------------
// Metric value
// ------------------------------------------------------------
//
// Carbon accepts ints and floats. Integers are kept as integers
// so large counters do not lose precision on the way out.
//
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
}

impl MetricValue {
    /// Converts a JSON leaf into a metric value.
    ///
    /// Booleans map to 0/1. Strings, nulls, arrays and objects
    /// are not metrics and return `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Int(i64::from(*b))),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Int(i)),
                None => n.as_f64().map(Self::Float),
            },
            _ => None,
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

// ------------------------------------------------------------
// Metric point
// ------------------------------------------------------------
//
// A single named sample. The name already carries the run prefix.
//
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    /// Full dotted metric name, e.g. "db1.example.com.mongo.opcounters.insert"
    pub name: String,

    /// Seconds since Unix epoch (UTC)
    pub timestamp: i64,

    pub value: MetricValue,
}

impl MetricPoint {
    pub fn new(name: impl Into<String>, timestamp: i64, value: impl Into<MetricValue>) -> Self {
        Self {
            name: name.into(),
            timestamp,
            value: value.into(),
        }
    }
}

/// Ordered points of one tick, all sharing the tick timestamp.
///
/// Order follows the declaration order of the path patterns; wildcard
/// expansions are ordered by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointBatch {
    pub timestamp: i64,
    pub points: Vec<MetricPoint>,
}

impl PointBatch {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            points: Vec::new(),
        }
    }

    pub fn push(&mut self, name: String, value: MetricValue) {
        self.points.push(MetricPoint {
            name,
            timestamp: self.timestamp,
            value,
        });
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.points.iter().map(|p| p.name.as_str())
    }
}
