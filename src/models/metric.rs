use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const GAUGE: &str = "gauge";
pub const COUNTER: &str = "counter";

/// Validation failures for incoming metrics
#[derive(Debug, Error, PartialEq)]
pub enum MetricError {
    #[error("unknown metric type: {0}")]
    UnknownKind(String),
    #[error("metric '{id}' of type {kind} is missing its {field} field")]
    PayloadMismatch {
        id: String,
        kind: MetricKind,
        field: &'static str,
    },
    #[error("metric '{id}' of type {kind} sets both delta and value")]
    ConflictingPayload { id: String, kind: MetricKind },
    #[error("invalid {kind} literal '{literal}'")]
    ParseError { kind: MetricKind, literal: String },
    #[error("metric id must not be empty")]
    EmptyId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => GAUGE,
            Self::Counter => COUNTER,
        }
    }

    pub fn parse(kind: &str) -> Result<Self, MetricError> {
        match kind {
            GAUGE => Ok(Self::Gauge),
            COUNTER => Ok(Self::Counter),
            other => Err(MetricError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a metric. The kind is carried by the variant, so a gauge can
/// never hold a delta and a counter can never hold a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    Gauge(f64),
    Counter(i64),
}

/// A validated metric as held by the store and the collector
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub id: String,
    pub payload: Payload,
}

impl Metric {
    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            payload: Payload::Gauge(value),
        }
    }

    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            payload: Payload::Counter(delta),
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self.payload {
            Payload::Gauge(_) => MetricKind::Gauge,
            Payload::Counter(_) => MetricKind::Counter,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self.payload {
            Payload::Gauge(v) => Some(v),
            Payload::Counter(_) => None,
        }
    }

    pub fn delta(&self) -> Option<i64> {
        match self.payload {
            Payload::Counter(d) => Some(d),
            Payload::Gauge(_) => None,
        }
    }

    /// Scalar rendering used by the plain-text value endpoint
    pub fn scalar(&self) -> String {
        match self.payload {
            Payload::Gauge(v) => v.to_string(),
            Payload::Counter(d) => d.to_string(),
        }
    }

    pub fn to_wire(&self) -> WireMetric {
        WireMetric::from(self)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})={}", self.kind(), self.id, self.scalar())
    }
}

/// JSON shape exchanged between agent, server and snapshot file.
///
/// `type` stays a free-form string so that unknown kinds reach validation
/// instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMetric {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl From<&Metric> for WireMetric {
    fn from(metric: &Metric) -> Self {
        Self {
            id: metric.id.clone(),
            kind: metric.kind().as_str().to_string(),
            delta: metric.delta(),
            value: metric.value(),
        }
    }
}

impl TryFrom<WireMetric> for Metric {
    type Error = MetricError;

    fn try_from(wire: WireMetric) -> Result<Self, Self::Error> {
        validate(wire)
    }
}

/// Check the kind and that exactly the payload field matching it is present.
pub fn validate(wire: WireMetric) -> Result<Metric, MetricError> {
    let kind = MetricKind::parse(&wire.kind)?;
    if wire.id.is_empty() {
        return Err(MetricError::EmptyId);
    }
    if wire.delta.is_some() && wire.value.is_some() {
        return Err(MetricError::ConflictingPayload { id: wire.id, kind });
    }

    let payload = match kind {
        MetricKind::Gauge => Payload::Gauge(wire.value.ok_or(MetricError::PayloadMismatch {
            id: wire.id.clone(),
            kind,
            field: "value",
        })?),
        MetricKind::Counter => Payload::Counter(wire.delta.ok_or(MetricError::PayloadMismatch {
            id: wire.id.clone(),
            kind,
            field: "delta",
        })?),
    };

    Ok(Metric {
        id: wire.id,
        payload,
    })
}

/// Merge an incoming update into the stored metric.
///
/// Gauges are last-write-wins, counters accumulate. Counter accumulation wraps
/// on i64 overflow. When the kinds differ the incoming metric replaces the
/// stored one.
pub fn merge(existing: Metric, incoming: Metric) -> Metric {
    let payload = match (existing.payload, incoming.payload) {
        (Payload::Counter(stored), Payload::Counter(delta)) => {
            Payload::Counter(stored.wrapping_add(delta))
        }
        (_, payload) => payload,
    };

    Metric {
        id: existing.id,
        payload,
    }
}

/// Build a metric from the `/update/{type}/{name}/{value}` literal form.
pub fn parse_from_text(kind: &str, name: &str, literal: &str) -> Result<Metric, MetricError> {
    let kind = MetricKind::parse(kind)?;
    if name.is_empty() {
        return Err(MetricError::EmptyId);
    }

    let parse_error = || MetricError::ParseError {
        kind,
        literal: literal.to_string(),
    };

    match kind {
        MetricKind::Gauge => {
            let value: f64 = literal.trim().parse().map_err(|_| parse_error())?;
            if !value.is_finite() {
                return Err(parse_error());
            }
            Ok(Metric::gauge(name, value))
        }
        MetricKind::Counter => {
            let delta: i64 = literal.trim().parse().map_err(|_| parse_error())?;
            Ok(Metric::counter(name, delta))
        }
    }
}
