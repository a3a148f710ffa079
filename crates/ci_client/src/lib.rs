//! Client for the CI platform's REST API.
//!
//! This crate provides a client that authenticates with client credentials,
//! retrieves paginated lists of non-terminal builds and releases, and issues
//! the delete-to-cancel calls for both.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Method, StatusCode};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

pub mod errors;
pub use errors::Error;

pub mod models;
use models::{
    Build, ClientCredentials, PagedBuildsResponse, PagedReleasesResponse, Release, TokenResponse,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Fixed timeout applied to every outbound request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How often a single call is attempted before its error is returned.
const MAX_ATTEMPTS: u32 = 3;

/// Operations the cleanup service needs from the CI API.
#[async_trait]
pub trait CiApi: Send + Sync {
    /// Logs in with the configured client credentials and caches the returned
    /// bearer token for subsequent calls.
    async fn get_token(&self) -> Result<String, Error>;

    /// Fetches one page of builds in a non-terminal state.
    async fn get_running_builds(
        &self,
        page_number: u32,
        page_size: u32,
    ) -> Result<PagedBuildsResponse, Error>;

    /// Fetches one page of releases in a non-terminal state.
    async fn get_running_releases(
        &self,
        page_number: u32,
        page_size: u32,
    ) -> Result<PagedReleasesResponse, Error>;

    /// Cancels a single build.
    async fn cancel_build(&self, build: &Build) -> Result<(), Error>;

    /// Cancels a single release.
    async fn cancel_release(&self, release: &Release) -> Result<(), Error>;
}

/// A client for the CI API, authenticated with client credentials.
///
/// The bearer token obtained by [`CiApi::get_token`] is cached for the
/// lifetime of the client; there is no refresh, a run is expected to finish
/// well within the token lifetime.
#[derive(Debug)]
pub struct CiClient {
    http: reqwest::Client,
    api_base_url: String,
    client_id: String,
    client_secret: String,
    token: RwLock<Option<String>>,
}

impl CiClient {
    /// Creates a new client for the CI API at `api_base_url`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidBaseUrl` if the base URL does not parse and
    /// `Error::Transport` if the underlying HTTP client cannot be built.
    pub fn new(api_base_url: &str, client_id: &str, client_secret: &str) -> Result<Self, Error> {
        Url::parse(api_base_url)?;

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token: RwLock::new(None),
        })
    }

    fn cached_token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    fn store_token(&self, token: &str) {
        if let Ok(mut guard) = self.token.write() {
            *guard = Some(token.to_string());
        }
    }

    /// Sends a request, retrying transport errors and 5xx responses with
    /// jittered exponential backoff, and returns the response body once the
    /// expected status is seen.
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
        expected_status: StatusCode,
    ) -> Result<String, Error> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let mut request = self.http.request(method.clone(), url);
            if let Some(token) = self.cached_token() {
                request = request.bearer_auth(token);
            }
            if let Some(body) = &body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) if response.status() == expected_status => {
                    return Ok(response.text().await?);
                }
                Ok(response) => {
                    let status = response.status();
                    if !status.is_server_error() || attempt >= MAX_ATTEMPTS {
                        error!(
                            method = %method,
                            url = url,
                            status = status.as_u16(),
                            "Request failed with unexpected status code"
                        );
                        return Err(Error::UnexpectedStatus {
                            method: method.to_string(),
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }
                    warn!(
                        method = %method,
                        url = url,
                        status = status.as_u16(),
                        attempt = attempt,
                        "Request failed with server error, retrying"
                    );
                }
                Err(err) => {
                    if attempt >= MAX_ATTEMPTS {
                        return Err(Error::Transport(err));
                    }
                    warn!(
                        method = %method,
                        url = url,
                        error = %err,
                        attempt = attempt,
                        "Request failed, retrying"
                    );
                }
            }

            tokio::time::sleep(backoff_delay(attempt)).await;
        }
    }

    async fn get(&self, url: &str) -> Result<String, Error> {
        self.request(Method::GET, url, None, StatusCode::OK).await
    }

    async fn delete(&self, url: &str) -> Result<String, Error> {
        self.request(Method::DELETE, url, None, StatusCode::OK)
            .await
    }
}

/// Backoff before the next attempt: 500ms doubling per attempt, plus up to
/// 250ms of jitter.
fn backoff_delay(attempt: u32) -> Duration {
    let base = Duration::from_millis(500) * 2u32.saturating_pow(attempt.saturating_sub(1));
    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..250));
    base + jitter
}

#[async_trait]
impl CiApi for CiClient {
    #[instrument(skip(self))]
    async fn get_token(&self) -> Result<String, Error> {
        debug!("Retrieving bearer token");

        let credentials = ClientCredentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        };

        let url = format!("{}/api/auth/client/login", self.api_base_url);
        let body = self
            .request(
                Method::POST,
                &url,
                Some(serde_json::to_value(&credentials)?),
                StatusCode::OK,
            )
            .await?;

        let token_response: TokenResponse = serde_json::from_str(&body).map_err(|err| {
            error!(body = body, "Failed deserializing login response");
            err
        })?;

        if token_response.token.is_empty() {
            return Err(Error::AuthError(
                "Login response contained an empty token".to_string(),
            ));
        }

        self.store_token(&token_response.token);

        Ok(token_response.token)
    }

    #[instrument(skip(self))]
    async fn get_running_builds(
        &self,
        page_number: u32,
        page_size: u32,
    ) -> Result<PagedBuildsResponse, Error> {
        debug!(page_number, page_size, "Retrieving running builds");

        let url = format!(
            "{}/api/builds?filter[status]=running&page[number]={}&page[size]={}",
            self.api_base_url, page_number, page_size
        );

        let body = self.get(&url).await?;
        let paged: PagedBuildsResponse = serde_json::from_str(&body).map_err(|err| {
            error!(body = body, url = url, "Failed deserializing builds response");
            err
        })?;

        debug!(
            page_number,
            items = paged.items.len(),
            total_pages = paged.pagination.total_pages,
            "Retrieved running builds page"
        );

        Ok(paged)
    }

    #[instrument(skip(self))]
    async fn get_running_releases(
        &self,
        page_number: u32,
        page_size: u32,
    ) -> Result<PagedReleasesResponse, Error> {
        debug!(page_number, page_size, "Retrieving running releases");

        let url = format!(
            "{}/api/releases?filter[status]=running&page[number]={}&page[size]={}",
            self.api_base_url, page_number, page_size
        );

        let body = self.get(&url).await?;
        let paged: PagedReleasesResponse = serde_json::from_str(&body).map_err(|err| {
            error!(body = body, url = url, "Failed deserializing releases response");
            err
        })?;

        debug!(
            page_number,
            items = paged.items.len(),
            total_pages = paged.pagination.total_pages,
            "Retrieved running releases page"
        );

        Ok(paged)
    }

    #[instrument(skip(self, build), fields(build_id = %build.id))]
    async fn cancel_build(&self, build: &Build) -> Result<(), Error> {
        info!(
            repo_source = build.repo_source,
            repo_owner = build.repo_owner,
            repo_name = build.repo_name,
            build_id = build.id,
            inserted_at = %build.inserted_at,
            "Canceling build"
        );

        let url = format!(
            "{}/api/pipelines/{}/{}/{}/builds/{}",
            self.api_base_url, build.repo_source, build.repo_owner, build.repo_name, build.id
        );

        self.delete(&url).await?;

        Ok(())
    }

    #[instrument(skip(self, release), fields(release_id = %release.id))]
    async fn cancel_release(&self, release: &Release) -> Result<(), Error> {
        info!(
            repo_source = release.repo_source,
            repo_owner = release.repo_owner,
            repo_name = release.repo_name,
            release_id = release.id,
            "Canceling release"
        );

        let url = format!(
            "{}/api/pipelines/{}/{}/{}/releases/{}",
            self.api_base_url, release.repo_source, release.repo_owner, release.repo_name, release.id
        );

        self.delete(&url).await?;

        Ok(())
    }
}
