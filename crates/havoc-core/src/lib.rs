//! havoc-core — shared types for the havoc chaos engine.
//!
//! Holds the per-cycle instance snapshot model, the `Selector` used for
//! every label-like filter, and the duration syntax shared by the config
//! file and the CLI.

pub mod duration;
pub mod selector;
pub mod types;

pub use duration::{DurationError, format_duration, parse_duration};
pub use selector::{Operator, Requirement, Selector, SelectorError};
pub use types::*;
