//! Metrics definitions for the ledger service.

use shared::metrics_defs::{MetricDef, MetricType};

pub const CACHE_HIT: MetricDef = MetricDef {
    name: "cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of lookups served from the cache, tagged by key",
};

pub const CACHE_MISS: MetricDef = MetricDef {
    name: "cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of lookups that fell through to the upstream, tagged by key",
};

pub const CACHE_READ_ERROR: MetricDef = MetricDef {
    name: "cache.read_error",
    metric_type: MetricType::Counter,
    description: "Number of cache reads that failed or returned malformed data",
};

pub const CACHE_WRITE_ERROR: MetricDef = MetricDef {
    name: "cache.write_error",
    metric_type: MetricType::Counter,
    description: "Number of cache writes that failed",
};

pub const DRAIN_PAGES: MetricDef = MetricDef {
    name: "drain.pages",
    metric_type: MetricType::Histogram,
    description: "Number of pages fetched by a completed drain",
};

pub const DRAIN_RECORDS: MetricDef = MetricDef {
    name: "drain.records",
    metric_type: MetricType::Histogram,
    description: "Number of distinct records accumulated by a completed drain",
};

pub const DRAIN_DURATION: MetricDef = MetricDef {
    name: "drain.duration",
    metric_type: MetricType::Histogram,
    description: "Time to drain a paginated endpoint in seconds",
};

pub const SYNC_PERSIST_FAILURES: MetricDef = MetricDef {
    name: "sync.persist_failures",
    metric_type: MetricType::Counter,
    description: "Number of record writes that failed during a ledger sync",
};

pub const STORED_RECORDS: MetricDef = MetricDef {
    name: "store.records",
    metric_type: MetricType::Gauge,
    description: "Number of ledger records in the durable store after the last sync",
};

pub const ALL_METRICS: &[MetricDef] = &[
    CACHE_HIT,
    CACHE_MISS,
    CACHE_READ_ERROR,
    CACHE_WRITE_ERROR,
    DRAIN_PAGES,
    DRAIN_RECORDS,
    DRAIN_DURATION,
    SYNC_PERSIST_FAILURES,
    STORED_RECORDS,
];
