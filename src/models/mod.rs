pub mod metric;

pub use metric::{
    merge, parse_from_text, validate, Metric, MetricError, MetricKind, Payload, WireMetric,
};
