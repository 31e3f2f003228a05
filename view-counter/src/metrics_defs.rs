use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with status, or `cancelled` if the client went away.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const UPSTREAM_REQUESTS: MetricDef = MetricDef {
    name: "upstream.requests",
    metric_type: MetricType::Counter,
    description: "Admin API calls. Tagged with operation (read, write) and outcome.",
};

pub const SIGNATURE_REJECTED: MetricDef = MetricDef {
    name: "signature.rejected",
    metric_type: MetricType::Counter,
    description: "Requests refused because the signature header was missing or wrong",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    UPSTREAM_REQUESTS,
    SIGNATURE_REJECTED,
];
