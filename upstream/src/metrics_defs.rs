//! Metrics definitions for the upstream clients.

use shared::metrics_defs::{MetricDef, MetricType};

pub const UPSTREAM_REQUEST: MetricDef = MetricDef {
    name: "upstream.request",
    metric_type: MetricType::Counter,
    description: "Number of requests sent to an upstream API, tagged by endpoint",
};

pub const UPSTREAM_RETRY: MetricDef = MetricDef {
    name: "upstream.retry",
    metric_type: MetricType::Counter,
    description: "Number of upstream requests retried after a retriable status",
};

pub const ALL_METRICS: &[MetricDef] = &[UPSTREAM_REQUEST, UPSTREAM_RETRY];
