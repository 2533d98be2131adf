use std::time::Duration;

use hive_core::{JobOutcome, MetricsBackend};
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

/// Worker metrics registered in their own [`Registry`].
///
/// Cloning is cheap; clones share the same collectors.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    started: IntCounter,
    finished: IntCounterVec,
    duration: HistogramVec,
    cancel_requested: IntCounter,
    queue_errors: IntCounterVec,
    running: IntGauge,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Register the collectors in an existing registry.
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let started = IntCounter::new("hive_jobs_started_total", "Jobs admitted for execution")?;
        let finished = IntCounterVec::new(
            Opts::new("hive_jobs_finished_total", "Jobs that left the registry"),
            &["outcome"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new("hive_job_duration_seconds", "Execution wall time")
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 1800.0]),
            &["outcome"],
        )?;
        let cancel_requested = IntCounter::new(
            "hive_jobs_cancel_requested_total",
            "Cancel signals that matched a running job",
        )?;
        let queue_errors = IntCounterVec::new(
            Opts::new("hive_queue_errors_total", "Queue transport errors by kind"),
            &["kind"],
        )?;
        let running = IntGauge::new("hive_running_jobs", "Jobs currently executing")?;

        registry.register(Box::new(started.clone()))?;
        registry.register(Box::new(finished.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(cancel_requested.clone()))?;
        registry.register(Box::new(queue_errors.clone()))?;
        registry.register(Box::new(running.clone()))?;

        Ok(Self {
            registry,
            started,
            finished,
            duration,
            cancel_requested,
            queue_errors,
            running,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Text exposition format, ready to serve on `/metrics`.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    fn duration_for(&self, outcome: JobOutcome) -> Histogram {
        self.duration.with_label_values(&[outcome.as_str()])
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn job_started(&self) {
        self.started.inc();
    }

    fn job_finished(&self, outcome: JobOutcome, duration: Duration) {
        self.finished.with_label_values(&[outcome.as_str()]).inc();
        self.duration_for(outcome).observe(duration.as_secs_f64());
    }

    fn job_cancel_requested(&self) {
        self.cancel_requested.inc();
    }

    fn queue_error(&self, kind: &'static str) {
        self.queue_errors.with_label_values(&[kind]).inc();
    }

    fn running_jobs(&self, count: usize) {
        self.running.set(count as i64);
    }
}
