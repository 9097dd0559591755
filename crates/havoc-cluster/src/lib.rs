//! havoc-cluster — the collaborators a chaos cycle talks to.
//!
//! [`ClusterClient`] lists and deletes instances; [`Notifier`] announces
//! each victim. Both traits return boxed futures so the engine can hold
//! them as trait objects.

pub mod client;
pub mod error;
pub mod memory;
pub mod notify;

pub use client::{ClusterClient, ClusterFuture};
pub use error::{ClusterError, ClusterResult, NotifyError};
pub use memory::{DeleteFailure, DeletionRecord, Inventory, MemoryCluster};
pub use notify::{NoopNotifier, Notifier, NotifyFuture, WebhookNotifier};
