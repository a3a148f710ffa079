//! Client for the Kubernetes resources backing CI builds and releases.
//!
//! Every build or release executes as a Job with an accompanying ConfigMap
//! and Secret, all carrying a `createdBy` label. This crate lists those three
//! kinds scoped to a single namespace and deletes them with foreground
//! cascading, so dependent Pods go away with their Job.

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, ListParams};
use tracing::{info, instrument, warn};

pub mod errors;
pub use errors::Error;

pub mod models;
use models::ClusterObject;

/// Operations the cleanup service needs from the cluster.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Lists the labelled Jobs in the configured namespace.
    async fn list_jobs(&self) -> Result<Vec<ClusterObject>, Error>;

    /// Lists the labelled ConfigMaps in the configured namespace.
    async fn list_config_maps(&self) -> Result<Vec<ClusterObject>, Error>;

    /// Lists the labelled Secrets in the configured namespace.
    async fn list_secrets(&self) -> Result<Vec<ClusterObject>, Error>;

    /// Deletes a Job and, through foreground cascading, its Pods.
    async fn delete_job(&self, name: &str) -> Result<(), Error>;

    /// Deletes a ConfigMap.
    async fn delete_config_map(&self, name: &str) -> Result<(), Error>;

    /// Deletes a Secret.
    async fn delete_secret(&self, name: &str) -> Result<(), Error>;
}

/// A Kubernetes client scoped to one namespace and one label selector.
#[derive(Clone)]
pub struct ClusterClient {
    client: kube::Client,
    namespace: String,
    label_selector: String,
}

impl ClusterClient {
    /// Creates a new client for the given namespace and label selector.
    ///
    /// Connection configuration is discovered through the standard chain:
    /// in-cluster service account when deployed, kubeconfig otherwise.
    ///
    /// # Errors
    ///
    /// Returns `Error::Kube` if no usable configuration can be found.
    pub async fn new(namespace: &str, label_selector: &str) -> Result<Self, Error> {
        let client = kube::Client::try_default().await?;

        Ok(Self {
            client,
            namespace: namespace.to_string(),
            label_selector: label_selector.to_string(),
        })
    }

    fn jobs(&self) -> Api<Job> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn config_maps(&self) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn secrets(&self) -> Api<Secret> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn list_params(&self) -> ListParams {
        ListParams::default().labels(&self.label_selector)
    }
}

/// Reduces a list of object metadata to [`ClusterObject`]s, skipping entries
/// the janitor cannot act on.
fn collect_objects(kind: &str, metas: impl IntoIterator<Item = ObjectMeta>) -> Vec<ClusterObject> {
    metas
        .into_iter()
        .filter_map(|meta| match ClusterObject::from_metadata(&meta) {
            Some(object) => Some(object),
            None => {
                warn!(
                    kind = kind,
                    name = meta.name.as_deref().unwrap_or("<unnamed>"),
                    "Skipping object without name or creation timestamp"
                );
                None
            }
        })
        .collect()
}

#[async_trait]
impl ClusterApi for ClusterClient {
    #[instrument(skip(self))]
    async fn list_jobs(&self) -> Result<Vec<ClusterObject>, Error> {
        info!(
            namespace = self.namespace,
            label_selector = self.label_selector,
            "Retrieving jobs"
        );

        let list = self.jobs().list(&self.list_params()).await?;
        let jobs = collect_objects("job", list.items.into_iter().map(|job| job.metadata));

        info!(
            namespace = self.namespace,
            count = jobs.len(),
            "Retrieved jobs"
        );

        Ok(jobs)
    }

    #[instrument(skip(self))]
    async fn list_config_maps(&self) -> Result<Vec<ClusterObject>, Error> {
        info!(
            namespace = self.namespace,
            label_selector = self.label_selector,
            "Retrieving configmaps"
        );

        let list = self.config_maps().list(&self.list_params()).await?;
        let config_maps = collect_objects("configmap", list.items.into_iter().map(|cm| cm.metadata));

        info!(
            namespace = self.namespace,
            count = config_maps.len(),
            "Retrieved configmaps"
        );

        Ok(config_maps)
    }

    #[instrument(skip(self))]
    async fn list_secrets(&self) -> Result<Vec<ClusterObject>, Error> {
        info!(
            namespace = self.namespace,
            label_selector = self.label_selector,
            "Retrieving secrets"
        );

        let list = self.secrets().list(&self.list_params()).await?;
        let secrets = collect_objects("secret", list.items.into_iter().map(|s| s.metadata));

        info!(
            namespace = self.namespace,
            count = secrets.len(),
            "Retrieved secrets"
        );

        Ok(secrets)
    }

    #[instrument(skip(self))]
    async fn delete_job(&self, name: &str) -> Result<(), Error> {
        info!(namespace = self.namespace, name = name, "Deleting job");

        self.jobs()
            .delete(name, &DeleteParams::foreground())
            .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_config_map(&self, name: &str) -> Result<(), Error> {
        info!(namespace = self.namespace, name = name, "Deleting configmap");

        self.config_maps()
            .delete(name, &DeleteParams::foreground())
            .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_secret(&self, name: &str) -> Result<(), Error> {
        info!(namespace = self.namespace, name = name, "Deleting secret");

        self.secrets()
            .delete(name, &DeleteParams::foreground())
            .await?;

        Ok(())
    }
}
