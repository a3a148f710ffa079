//! Error types for cluster client operations.

/// Errors that can occur when talking to the Kubernetes API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The Kubernetes API call failed, including connection bootstrap
    /// failures when no in-cluster or kubeconfig credentials are available.
    #[error("Kubernetes API request failed: {0}")]
    Kube(#[from] kube::Error),
}
