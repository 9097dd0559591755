//! havoc-engine — runs chaos cycles against a cluster.
//!
//! # Architecture
//!
//! ```text
//! ChaosConfig (havoc.toml) ──from_config()──→ Configuration
//!
//! ChaosEngine
//!   ├── run_cycle()               ← one list/filter/select/terminate pass
//!   ├── calculate_next_interval() ← pacing from the eligible pool
//!   └── run()                     ← loop until shutdown or max runtime
//!
//! Terminator
//!   ├── terminate() → ClusterClient::delete_instance (skipped in dry-run)
//!   └── notify()    → Notifier::notify
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod terminator;

pub use config::{ChaosConfig, Configuration, WebhookSettings};
pub use engine::{ChaosEngine, Clock, CycleOutcome, CyclePhase, CycleReport};
pub use error::{ConfigError, EngineError, EngineResult};
pub use terminator::{TerminationOutcome, TerminationResult, Terminator};
