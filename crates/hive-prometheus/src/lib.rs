//! Prometheus metrics backend for hive workers.
//!
//! [`PrometheusMetrics`] implements [`hive_core::MetricsBackend`]; hand a clone to the
//! worker builder and serve [`PrometheusMetrics::encode`] from your HTTP stack.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use hive_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let handle: hive_core::MetricsHandle = Arc::new(metrics.clone());
//! // WorkerBuilder::new(..).metrics(handle)
//! # let _ = handle;
//! let text = metrics.encode()?;
//! assert!(text.contains("hive_running_jobs"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `hive_jobs_started_total` - Counter
//! - `hive_jobs_finished_total{outcome}` - Counter
//! - `hive_job_duration_seconds{outcome}` - Histogram
//! - `hive_jobs_cancel_requested_total` - Counter
//! - `hive_queue_errors_total{kind}` - Counter
//! - `hive_running_jobs` - Gauge

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
