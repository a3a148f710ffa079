//! # JobJanitor Core
//!
//! Orchestration logic for the hanging-job cleanup: page through the CI API's
//! non-terminal builds and releases cancelling everything past its maximum
//! allowed lifetime, then delete the Kubernetes Jobs, ConfigMaps and Secrets
//! that outlived their expected cleanup by normal completion.
//!
//! The run is strictly sequential and stops at the first error; the next
//! scheduled run redoes the same reconciliation from scratch, which is safe
//! because only items that are still stale are acted on.

use chrono::{DateTime, Utc};
use ci_client::CiApi;
use cluster_client::{models::ClusterObject, ClusterApi};
use tracing::{info, instrument};

pub mod errors;
pub use errors::Error;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Maximum age in minutes for builds and releases before they are cancelled.
///
/// Five minutes under the six-hour token lifetime, the last chance for a job
/// to ship its logs to the API with valid credentials.
pub const BUILD_MAX_AGE_MINUTES: i64 = 6 * 60 - 5;

/// Maximum age in minutes for cluster objects before they are deleted.
///
/// Five minutes over the token lifetime: anything this old missed being
/// cleaned up through normal cancellation.
pub const RESOURCE_MAX_AGE_MINUTES: i64 = 6 * 60 + 5;

/// Page size used when listing builds and releases.
pub const PAGE_SIZE: u32 = 12;

/// Whether an item created at `created_at` has exceeded `max_age_minutes`
/// as of `now`. The comparison is strict: an item exactly at the threshold
/// is not yet stale.
pub fn is_stale(created_at: DateTime<Utc>, now: DateTime<Utc>, max_age_minutes: i64) -> bool {
    now.signed_duration_since(created_at).num_seconds() > max_age_minutes * 60
}

/// The cleanup service wiring the CI API and the cluster together.
pub struct JanitorService<C, K> {
    ci: C,
    cluster: K,
}

impl<C, K> JanitorService<C, K>
where
    C: CiApi,
    K: ClusterApi,
{
    pub fn new(ci: C, cluster: K) -> Self {
        Self { ci, cluster }
    }

    /// Fetches the CI bearer token once so the run fails fast on bad
    /// credentials, before any cleanup work starts.
    #[instrument(skip(self))]
    pub async fn init(&self) -> Result<(), Error> {
        self.ci.get_token().await?;

        Ok(())
    }

    /// Runs the full cleanup pass. The first error aborts the run.
    #[instrument(skip(self))]
    pub async fn clean(&self) -> Result<(), Error> {
        self.clean_builds().await?;
        self.clean_releases().await?;
        self.clean_jobs().await?;
        self.clean_config_maps().await?;
        self.clean_secrets().await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn clean_builds(&self) -> Result<(), Error> {
        let mut page_number = 1;
        let mut cancelled = 0;

        loop {
            let page = self.ci.get_running_builds(page_number, PAGE_SIZE).await?;

            for build in &page.items {
                if is_stale(build.inserted_at, Utc::now(), BUILD_MAX_AGE_MINUTES) {
                    self.ci.cancel_build(build).await?;
                    cancelled += 1;
                }
            }

            if page.pagination.total_pages <= page_number {
                break;
            }

            page_number += 1;
        }

        info!(pages = page_number, cancelled, "Cleaned builds");

        Ok(())
    }

    #[instrument(skip(self))]
    async fn clean_releases(&self) -> Result<(), Error> {
        let mut page_number = 1;
        let mut cancelled = 0;

        loop {
            let page = self.ci.get_running_releases(page_number, PAGE_SIZE).await?;

            for release in &page.items {
                // releases without a recorded timestamp cannot be aged
                let Some(inserted_at) = release.inserted_at else {
                    continue;
                };
                if is_stale(inserted_at, Utc::now(), BUILD_MAX_AGE_MINUTES) {
                    self.ci.cancel_release(release).await?;
                    cancelled += 1;
                }
            }

            if page.pagination.total_pages <= page_number {
                break;
            }

            page_number += 1;
        }

        info!(pages = page_number, cancelled, "Cleaned releases");

        Ok(())
    }

    #[instrument(skip(self))]
    async fn clean_jobs(&self) -> Result<(), Error> {
        let jobs = self.cluster.list_jobs().await?;
        let stale = stale_objects(&jobs);

        for job in &stale {
            self.cluster.delete_job(&job.name).await?;
        }

        info!(total = jobs.len(), deleted = stale.len(), "Cleaned jobs");

        Ok(())
    }

    #[instrument(skip(self))]
    async fn clean_config_maps(&self) -> Result<(), Error> {
        let config_maps = self.cluster.list_config_maps().await?;
        let stale = stale_objects(&config_maps);

        for config_map in &stale {
            self.cluster.delete_config_map(&config_map.name).await?;
        }

        info!(
            total = config_maps.len(),
            deleted = stale.len(),
            "Cleaned configmaps"
        );

        Ok(())
    }

    #[instrument(skip(self))]
    async fn clean_secrets(&self) -> Result<(), Error> {
        let secrets = self.cluster.list_secrets().await?;
        let stale = stale_objects(&secrets);

        for secret in &stale {
            self.cluster.delete_secret(&secret.name).await?;
        }

        info!(
            total = secrets.len(),
            deleted = stale.len(),
            "Cleaned secrets"
        );

        Ok(())
    }
}

fn stale_objects(objects: &[ClusterObject]) -> Vec<ClusterObject> {
    let now = Utc::now();
    objects
        .iter()
        .filter(|object| is_stale(object.created_at, now, RESOURCE_MAX_AGE_MINUTES))
        .cloned()
        .collect()
}
