//! JobJanitor: cancel hanging CI builds and releases and delete the cluster
//! objects that back them.
//!
//! Runs a single cleanup pass and exits; recurrence comes from an external
//! scheduler such as a Kubernetes CronJob.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ci_client::CiClient;
use cluster_client::ClusterClient;
use job_janitor_core::JanitorService;

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

/// Cancel hanging CI builds and releases and clean up their cluster objects
#[derive(Debug, Parser)]
#[command(name = "job-janitor")]
#[command(about = "Cancel hanging CI builds and releases and clean up their cluster objects", long_about = None)]
struct Cli {
    /// The base url of the CI API to communicate with
    #[arg(long, env = "API_BASE_URL")]
    api_base_url: String,

    /// The id of the client as configured in the CI API
    #[arg(long, env = "CLIENT_ID")]
    client_id: String,

    /// The secret of the client as configured in the CI API
    #[arg(long, env = "CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    /// The namespace where the build and release jobs are created
    #[arg(long, env = "JOB_NAMESPACE")]
    job_namespace: String,

    /// The label selector marking objects as created by the CI platform
    #[arg(long, env = "CREATED_BY_LABEL", default_value = "createdBy=ci-api")]
    created_by_label: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_env("JOB_JANITOR_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let ci_client = CiClient::new(&cli.api_base_url, &cli.client_id, &cli.client_secret)?;
    let cluster_client = ClusterClient::new(&cli.job_namespace, &cli.created_by_label).await?;

    let service = JanitorService::new(ci_client, cluster_client);

    service.init().await?;
    service.clean().await?;

    info!("Done!");

    Ok(())
}
