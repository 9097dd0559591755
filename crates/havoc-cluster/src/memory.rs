//! In-memory cluster backed by a JSON inventory.
//!
//! Serves the same listing and deletion calls a real cluster would, records
//! every successful delete, and lets tests inject failures.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use havoc_core::{Instance, Labels, NamespaceIndex};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::client::{ClusterClient, ClusterFuture};
use crate::error::{ClusterError, ClusterResult};

/// On-disk inventory: `{"namespaces": {...}, "instances": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub namespaces: NamespaceIndex,
    #[serde(default)]
    pub instances: Vec<Instance>,
}

/// One successful delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRecord {
    pub namespace: String,
    pub name: String,
    pub grace_period: Option<Duration>,
}

/// Failure injected for a single instance's delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteFailure {
    /// Listed, but already gone when the delete arrives.
    NotFound,
    Unavailable(String),
}

#[derive(Debug, Default)]
struct State {
    instances: Vec<Instance>,
    namespaces: NamespaceIndex,
    deletions: Vec<DeletionRecord>,
    list_failure: Option<String>,
    namespace_failure: Option<String>,
    delete_failures: HashMap<String, DeleteFailure>,
}

/// A cluster held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryCluster {
    state: RwLock<State>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an inventory; namespaces referenced only by instances are
    /// registered with no labels.
    pub fn from_inventory(inventory: Inventory) -> Self {
        let mut namespaces = inventory.namespaces;
        for instance in &inventory.instances {
            namespaces.entry(instance.namespace.clone()).or_default();
        }
        Self {
            state: RwLock::new(State {
                instances: inventory.instances,
                namespaces,
                ..Default::default()
            }),
        }
    }

    pub fn from_inventory_file(path: &Path) -> ClusterResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let inventory: Inventory = serde_json::from_str(&content)?;
        info!(
            path = %path.display(),
            namespaces = inventory.namespaces.len(),
            instances = inventory.instances.len(),
            "loaded inventory"
        );
        Ok(Self::from_inventory(inventory))
    }

    pub async fn insert_instance(&self, instance: Instance) {
        let mut state = self.state.write().await;
        state.namespaces.entry(instance.namespace.clone()).or_default();
        state.instances.push(instance);
    }

    pub async fn insert_namespace(&self, name: &str, labels: Labels) {
        self.state
            .write()
            .await
            .namespaces
            .insert(name.to_string(), labels);
    }

    /// Make every listing call fail with `reason` until cleared with `None`.
    pub async fn fail_listing(&self, reason: Option<&str>) {
        self.state.write().await.list_failure = reason.map(str::to_string);
    }

    /// Make only namespace listing fail with `reason` until cleared with `None`.
    pub async fn fail_namespace_listing(&self, reason: Option<&str>) {
        self.state.write().await.namespace_failure = reason.map(str::to_string);
    }

    /// Make deletes of `namespace/name` fail with `failure`.
    pub async fn fail_delete(&self, namespace: &str, name: &str, failure: DeleteFailure) {
        self.state
            .write()
            .await
            .delete_failures
            .insert(format!("{namespace}/{name}"), failure);
    }

    pub async fn instances(&self) -> Vec<Instance> {
        self.state.read().await.instances.clone()
    }

    /// Successful deletes, in the order they happened.
    pub async fn deletions(&self) -> Vec<DeletionRecord> {
        self.state.read().await.deletions.clone()
    }
}

impl ClusterClient for MemoryCluster {
    fn list_instances<'a>(&'a self, namespace: Option<&'a str>) -> ClusterFuture<'a, Vec<Instance>> {
        Box::pin(async move {
            let state = self.state.read().await;
            if let Some(reason) = &state.list_failure {
                return Err(ClusterError::Unavailable(reason.clone()));
            }
            let instances: Vec<Instance> = state
                .instances
                .iter()
                .filter(|i| namespace.is_none_or(|ns| i.namespace == ns))
                .cloned()
                .collect();
            debug!(scope = namespace.unwrap_or("*"), count = instances.len(), "listed instances");
            Ok(instances)
        })
    }

    fn list_namespaces(&self) -> ClusterFuture<'_, NamespaceIndex> {
        Box::pin(async move {
            let state = self.state.read().await;
            if let Some(reason) = state.list_failure.as_ref().or(state.namespace_failure.as_ref()) {
                return Err(ClusterError::Unavailable(reason.clone()));
            }
            Ok(state.namespaces.clone())
        })
    }

    fn delete_instance<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
        grace_period: Option<Duration>,
    ) -> ClusterFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            match state.delete_failures.get(&format!("{namespace}/{name}")) {
                Some(DeleteFailure::NotFound) => {
                    return Err(ClusterError::not_found(namespace, name));
                }
                Some(DeleteFailure::Unavailable(reason)) => {
                    return Err(ClusterError::Unavailable(reason.clone()));
                }
                None => {}
            }

            let Some(pos) = state
                .instances
                .iter()
                .position(|i| i.namespace == namespace && i.name == name)
            else {
                return Err(ClusterError::not_found(namespace, name));
            };
            state.instances.remove(pos);
            state.deletions.push(DeletionRecord {
                namespace: namespace.to_string(),
                name: name.to_string(),
                grace_period,
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::io::Write;

    fn pod(namespace: &str, name: &str) -> Instance {
        Instance::new(namespace, name, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn lists_by_scope() {
        let cluster = MemoryCluster::new();
        cluster.insert_instance(pod("default", "foo")).await;
        cluster.insert_instance(pod("testing", "bar")).await;

        assert_eq!(cluster.list_instances(None).await.unwrap().len(), 2);
        let scoped = cluster.list_instances(Some("testing")).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].name, "bar");

        let namespaces = cluster.list_namespaces().await.unwrap();
        assert!(namespaces.contains_key("default"));
        assert!(namespaces.contains_key("testing"));
    }

    #[tokio::test]
    async fn delete_removes_and_journals() {
        let cluster = MemoryCluster::new();
        cluster.insert_instance(pod("default", "foo")).await;

        cluster
            .delete_instance("default", "foo", Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert!(cluster.instances().await.is_empty());
        assert_eq!(
            cluster.deletions().await,
            vec![DeletionRecord {
                namespace: "default".to_string(),
                name: "foo".to_string(),
                grace_period: Some(Duration::from_secs(5)),
            }]
        );

        let err = cluster.delete_instance("default", "foo", None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn injected_failures() {
        let cluster = MemoryCluster::new();
        cluster.insert_instance(pod("default", "foo")).await;

        cluster.fail_listing(Some("api down")).await;
        assert!(matches!(
            cluster.list_instances(None).await,
            Err(ClusterError::Unavailable(_))
        ));
        assert!(cluster.list_namespaces().await.is_err());
        cluster.fail_listing(None).await;
        assert!(cluster.list_instances(None).await.is_ok());

        cluster.fail_namespace_listing(Some("namespaces forbidden")).await;
        assert!(cluster.list_instances(None).await.is_ok());
        assert!(matches!(
            cluster.list_namespaces().await,
            Err(ClusterError::Unavailable(_))
        ));
        cluster.fail_namespace_listing(None).await;
        assert!(cluster.list_namespaces().await.is_ok());

        cluster.fail_delete("default", "foo", DeleteFailure::NotFound).await;
        let err = cluster.delete_instance("default", "foo", None).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(cluster.instances().await.len(), 1);
        assert!(cluster.deletions().await.is_empty());
    }

    #[tokio::test]
    async fn loads_inventory_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "namespaces": {{ "default": {{ "env": "prod" }} }},
                "instances": [
                    {{ "namespace": "default", "name": "foo", "phase": "running",
                       "created_at": "2024-01-01T00:00:00Z" }},
                    {{ "namespace": "batch", "name": "bar", "phase": "pending",
                       "created_at": "2024-01-01T00:00:00Z",
                       "owner_references": [{{ "kind": "Job", "uid": "job-1", "controller": true }}] }}
                ]
            }}"#
        )
        .unwrap();

        let cluster = MemoryCluster::from_inventory_file(file.path()).unwrap();
        let namespaces = cluster.list_namespaces().await.unwrap();
        assert_eq!(namespaces["default"]["env"], "prod");
        assert!(namespaces["batch"].is_empty());

        let instances = cluster.list_instances(None).await.unwrap();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[1].controller_kind(), "job");
    }

    #[test]
    fn rejects_malformed_inventory() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            MemoryCluster::from_inventory_file(file.path()),
            Err(ClusterError::Deserialize(_))
        ));
    }
}
