//! Error types for the cleanup service.

/// Errors that can abort a cleanup run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A CI API call failed.
    #[error(transparent)]
    Ci(#[from] ci_client::Error),

    /// A Kubernetes API call failed.
    #[error(transparent)]
    Cluster(#[from] cluster_client::Error),
}
