//! Data models for the CI API.
//!
//! These mirror the JSON contracts returned by the CI API's list endpoints.
//! Field names on the wire are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;

/// A pipeline build as returned by the CI API.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    /// The unique id of the build
    pub id: String,
    /// The source hosting the repository (e.g. a git server hostname)
    pub repo_source: String,
    /// The owner of the repository
    pub repo_owner: String,
    /// The name of the repository
    pub repo_name: String,
    /// The current status of the build (pending, running, ...)
    pub build_status: String,
    /// When the build was inserted into the CI database
    pub inserted_at: DateTime<Utc>,
}

/// A pipeline release as returned by the CI API.
///
/// Unlike builds, releases predating the introduction of the `insertedAt`
/// column come back without a timestamp; callers have to skip those.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    /// The unique id of the release
    pub id: String,
    /// The source hosting the repository
    pub repo_source: String,
    /// The owner of the repository
    pub repo_owner: String,
    /// The name of the repository
    pub repo_name: String,
    /// The current status of the release
    pub release_status: String,
    /// When the release was inserted into the CI database, if recorded
    #[serde(default)]
    pub inserted_at: Option<DateTime<Utc>>,
}

/// Server-driven pagination state accompanying every list response.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// The page that was returned (1-based)
    pub page: u32,
    /// The requested page size
    pub size: u32,
    /// The total number of pages for this query
    pub total_pages: u32,
    /// The total number of items across all pages
    pub total_items: u64,
}

/// One page of non-terminal builds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PagedBuildsResponse {
    pub items: Vec<Build>,
    pub pagination: Pagination,
}

/// One page of non-terminal releases.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PagedReleasesResponse {
    pub items: Vec<Release>,
    pub pagination: Pagination,
}

/// Credentials sent to the client login endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Response of the client login endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub token: String,
}
