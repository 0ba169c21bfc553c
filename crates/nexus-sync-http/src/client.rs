use std::future::Future;

use nexus_sync::{Endpoint, SyncError};
use reqwest::Url;
use tokio_util::sync::CancellationToken;

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("nexus-sync/", env!("CARGO_PKG_VERSION"));

/// Authenticated HTTP access to one repository manager endpoint.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct NexusClient {
    endpoint: Endpoint,
    client: reqwest::Client,
}

impl NexusClient {
    pub fn new(endpoint: Endpoint) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SyncError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Self::with_client(endpoint, client)
    }

    /// Use an existing client, e.g. one shared between both sides.
    pub fn with_client(endpoint: Endpoint, client: reqwest::Client) -> Result<Self, SyncError> {
        parse_base_url(&endpoint.url)?;
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Listing URL for this endpoint's repository.
    pub fn assets_url(&self, continuation_token: Option<&str>) -> Result<Url, SyncError> {
        let raw = format!("{}/service/rest/v1/assets", self.endpoint.base_url());
        let mut url = parse_base_url(&raw)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("repository", &self.endpoint.repository);
            if let Some(token) = continuation_token {
                query.append_pair("continuationToken", token);
            }
        }
        Ok(url)
    }

    pub(crate) fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.password))
    }

    pub(crate) fn put(&self, url: &str, body: reqwest::Body) -> reqwest::RequestBuilder {
        self.client
            .put(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.password))
            .body(body)
    }
}

/// Parse an absolute http(s) URL, rejecting anything else up front.
pub fn parse_base_url(url: &str) -> Result<Url, SyncError> {
    let parsed = Url::parse(url)
        .map_err(|e| SyncError::Configuration(format!("invalid URL '{url}': {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(SyncError::Configuration(format!(
            "unsupported URL scheme '{other}' in '{url}'"
        ))),
    }
}

/// Await `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, SyncError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SyncError::Cancelled),
        output = fut => Ok(output),
    }
}

/// Send a request, failing fast once the run is cancelled.
pub(crate) async fn send(
    request: reqwest::RequestBuilder,
    cancel: &CancellationToken,
) -> Result<reqwest::Response, SyncError> {
    cancellable(cancel, request.send())
        .await?
        .map_err(|e| SyncError::Transport(e.to_string()))
}

/// Turn a non-2xx response into a `Response` error carrying the status.
///
/// The error body is read under `cancel` as well, so a server that stalls
/// after sending its status cannot hold up cancellation.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    what: &str,
    cancel: &CancellationToken,
) -> Result<reqwest::Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = cancellable(cancel, response.text()).await?.unwrap_or_default();
    let body = body.trim();
    if body.is_empty() {
        Err(SyncError::Response(format!("{what} returned HTTP {status}")))
    } else {
        Err(SyncError::Response(format!(
            "{what} returned HTTP {status}: {body}"
        )))
    }
}
