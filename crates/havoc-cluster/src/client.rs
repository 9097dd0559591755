//! Cluster access trait.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use havoc_core::{Instance, NamespaceIndex};

use crate::error::ClusterResult;

/// Boxed future returned by [`ClusterClient`] methods.
pub type ClusterFuture<'a, T> = Pin<Box<dyn Future<Output = ClusterResult<T>> + Send + 'a>>;

/// Lists and deletes workload instances.
///
/// Implementations must be safe to share across tasks; the engine only
/// calls them from its single driving task.
pub trait ClusterClient: Send + Sync {
    /// Snapshot instances in `namespace`, or in every namespace when `None`.
    fn list_instances<'a>(&'a self, namespace: Option<&'a str>) -> ClusterFuture<'a, Vec<Instance>>;

    /// Every namespace with its own labels.
    fn list_namespaces(&self) -> ClusterFuture<'_, NamespaceIndex>;

    /// Delete one instance. `grace_period` of `None` uses the cluster default.
    ///
    /// Returns [`ClusterError::NotFound`](crate::ClusterError::NotFound)
    /// when the instance is already gone.
    fn delete_instance<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
        grace_period: Option<Duration>,
    ) -> ClusterFuture<'a, ()>;
}
