//! havoc-metrics — observability for the chaos loop.
//!
//! # Architecture
//!
//! ```text
//! ChaosMetrics
//!   ├── record_cycle() / record_termination() ← called by the engine
//!   ├── set_interval() / set_eligible()       ← pacing gauges
//!   └── snapshot() → MetricsSnapshot
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for /metrics endpoint
//! ```

pub mod collector;
pub mod prometheus;

pub use collector::{ChaosMetrics, MetricsSnapshot};
pub use prometheus::render_prometheus;
