//! Selection outcomes that are not victims.

use thiserror::Error;

pub type SelectResult<T> = Result<T, SelectError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    /// Nothing survived filtering. Expected, not a failure.
    #[error("no eligible candidate")]
    NoEligibleCandidate,
}
