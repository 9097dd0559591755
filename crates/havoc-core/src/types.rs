//! Snapshot types for workload instances.
//!
//! An `Instance` is an immutable copy of what the cluster reported at the
//! start of a cycle. Snapshots are rebuilt every cycle and never mutated.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key/value metadata attached to instances and namespaces.
pub type Labels = HashMap<String, String>;

/// Namespace name → that namespace's own labels.
pub type NamespaceIndex = HashMap<String, Labels>;

/// Annotation set by the host agent on static (mirror) instances.
pub const MIRROR_ANNOTATION: &str = "kubernetes.io/config.mirror";

// ── Identity ──────────────────────────────────────────────────────

/// Namespace-scoped identity of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId {
    pub namespace: String,
    pub name: String,
}

impl InstanceId {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// ── Instance ──────────────────────────────────────────────────────

/// Lifecycle phase reported by the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

/// Reference to the controller resource that created an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerReference {
    /// Resource kind, e.g. "ReplicaSet" or "Job".
    pub kind: String,
    pub uid: String,
    /// Set on the reference that manages the instance.
    #[serde(default)]
    pub controller: bool,
}

/// A single workload instance as listed from the cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub namespace: String,
    pub name: String,
    pub phase: Phase,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub annotations: Labels,
    pub created_at: DateTime<Utc>,
    /// Present once the cluster has started tearing the instance down.
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owner_references: Vec<OwnerReference>,
}

impl Instance {
    /// Build a running instance with no metadata, created at `created_at`.
    pub fn new(namespace: &str, name: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            phase: Phase::Running,
            labels: Labels::new(),
            annotations: Labels::new(),
            created_at,
            deletion_timestamp: None,
            owner_references: Vec::new(),
        }
    }

    pub fn id(&self) -> InstanceId {
        InstanceId::new(&self.namespace, &self.name)
    }

    /// `{namespace}/{name}`, used in logs and as a map key.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn is_terminating(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    /// Host-managed instances outside controller supervision.
    pub fn is_static(&self) -> bool {
        self.annotations.contains_key(MIRROR_ANNOTATION)
    }

    /// The owner reference that manages this instance, if any.
    ///
    /// Prefers the reference flagged as controller and falls back to the
    /// first reference listed.
    pub fn controller_ref(&self) -> Option<&OwnerReference> {
        self.owner_references
            .iter()
            .find(|r| r.controller)
            .or_else(|| self.owner_references.first())
    }

    /// Lowercased kind of the controlling owner; empty when unowned.
    pub fn controller_kind(&self) -> String {
        self.controller_ref()
            .map(|r| r.kind.to_lowercase())
            .unwrap_or_default()
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_annotation(mut self, key: &str, value: &str) -> Self {
        self.annotations.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_owner(mut self, kind: &str, uid: &str) -> Self {
        self.owner_references.push(OwnerReference {
            kind: kind.to_string(),
            uid: uid.to_string(),
            controller: true,
        });
        self
    }

    pub fn with_deletion_timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.deletion_timestamp = Some(at);
        self
    }
}
