//! havoc-select — from a raw instance snapshot to this cycle's victims.
//!
//! # Pipeline
//!
//! ```text
//! Vec<Instance>                        (listed from the cluster)
//!   ├── filter()       → CandidateSet  (predicates + blackout gate)
//!   ├── dedupe_by_owner()              (one random instance per owner)
//!   └── select_victims() → Vec<Instance> (shuffle, keep max_kill)
//! ```
//!
//! The filter stages commute; their order only affects how much work the
//! later stages do. Randomness is always drawn from a caller-supplied
//! generator so a fixed seed reproduces a cycle exactly.

pub mod dedupe;
pub mod error;
pub mod filter;
pub mod victim;

pub use dedupe::dedupe_by_owner;
pub use error::{SelectError, SelectResult};
pub use filter::{CandidateSet, FilterCriteria, eligible, filter};
pub use victim::select_victims;
