//! Prometheus metrics for the core host.
//!
//! All metrics follow the naming convention: `ch_<area>_<metric>[_unit]`
//!
//! Cluster figures are gauges refreshed from the cluster subsystem's own
//! counters when metrics are scraped.

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Registry served at `/admin/metrics`
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // CORE METRICS
    // =========================================================================

    /// Cores currently registered across all containers
    pub static ref CORES_LOADED: IntGauge = IntGauge::new(
        "ch_cores_loaded",
        "Number of cores currently registered"
    ).expect("metric creation failed");

    /// Core creation failures recorded at load or reload
    pub static ref CORE_INIT_FAILURES: IntCounter = IntCounter::new(
        "ch_core_init_failures_total",
        "Total core creation failures"
    ).expect("metric creation failed");

    // =========================================================================
    // REQUEST METRICS
    // =========================================================================

    /// Requests routed to a core or to the admin handler
    pub static ref REQUESTS_HANDLED: IntCounterVec = IntCounterVec::new(
        Opts::new("ch_requests_handled_total", "Requests handled"),
        &["target", "outcome"]  // target: admin/core, outcome: ok/error
    ).expect("metric creation failed");

    /// Request handling duration
    pub static ref REQUEST_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "ch_request_duration_seconds",
            "Time spent handling a request"
        ).buckets(exponential_buckets(0.0001, 2.0, 16).expect("valid buckets"))
    ).expect("metric creation failed");

    // =========================================================================
    // CLUSTER METRICS
    // =========================================================================

    /// Hosts in the registry, the local host included
    pub static ref HOSTS_KNOWN: IntGauge = IntGauge::new(
        "ch_cluster_hosts_known",
        "Number of hosts in the cluster registry"
    ).expect("metric creation failed");

    /// Failed fetches since start
    pub static ref FETCH_FAILURES: IntGauge = IntGauge::new(
        "ch_cluster_fetch_failures",
        "Failed cluster fetches since start"
    ).expect("metric creation failed");
}

/// Proof that the metrics are registered.
#[derive(Debug, Clone, Copy)]
pub struct MetricsHandle {
    _private: (),
}

/// Register all metrics with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Cores
        Box::new(CORES_LOADED.clone()),
        Box::new(CORE_INIT_FAILURES.clone()),
        // Requests
        Box::new(REQUESTS_HANDLED.clone()),
        Box::new(REQUEST_DURATION.clone()),
        // Cluster
        Box::new(HOSTS_KNOWN.clone()),
        Box::new(FETCH_FAILURES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::Metrics(e.to_string())),
        }
    }

    Ok(MetricsHandle { _private: () })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
}

/// Count one handled request.
pub fn record_request(target: &str, ok: bool) {
    REQUESTS_HANDLED
        .with_label_values(&[target, if ok { "ok" } else { "error" }])
        .inc();
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
