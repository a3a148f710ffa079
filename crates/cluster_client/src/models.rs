//! Minimal view of the cluster objects the janitor acts on.

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;

/// A cluster object reduced to what the cleanup decision needs: its name and
/// when the API server created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterObject {
    /// The object's name within its namespace
    pub name: String,
    /// The API server's creation timestamp
    pub created_at: DateTime<Utc>,
}

impl ClusterObject {
    /// Builds a `ClusterObject` from object metadata.
    ///
    /// Returns `None` when the name or the creation timestamp is absent,
    /// which only happens for objects not yet persisted by the API server.
    pub fn from_metadata(metadata: &ObjectMeta) -> Option<Self> {
        let name = metadata.name.clone()?;
        let created_at = metadata.creation_timestamp.as_ref()?.0;

        Some(Self { name, created_at })
    }
}
