use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};

use crate::error::{GenError, Result};
use crate::types::{GenerationRequest, JobPoll, ResolvedAsset, SubmitReceipt};

fn normalize(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// The remote operations the orchestration layer depends on.
///
/// [`GenerationClient`] is the production implementation; tests inject
/// an in-memory double. Implementations are stateless request/response
/// wrappers; in particular, `poll` performs exactly one status check
/// and never retries on its own.
pub trait GenerationApi: Send + Sync {
    /// Submit a generation job. Returns the service-assigned job id.
    fn submit(&self, request: &GenerationRequest) -> impl Future<Output = Result<String>> + Send;

    /// Check a job's status once.
    fn poll(&self, job_id: &str) -> impl Future<Output = Result<JobPoll>> + Send;

    /// Fetch the full asset record for a completed job.
    fn fetch_asset(&self, asset_id: &str) -> impl Future<Output = Result<ResolvedAsset>> + Send;

    /// Set an asset's like flag to the desired value.
    fn set_like(&self, asset_id: &str, liked: bool) -> impl Future<Output = Result<()>> + Send;
}

/// HTTP client for the generation service.
///
/// Thin and stateless: every method is a single request/response
/// exchange. All calls require a bearer credential; a missing credential
/// fails fast with [`GenError::Auth`] before any network I/O.
///
/// # Example
/// ```no_run
/// use lookgen::GenerationClient;
///
/// let client = GenerationClient::new("https://api.example.com")
///     .with_bearer("token-123");
/// assert_eq!(client.endpoint(), "https://api.example.com");
/// ```
#[derive(Debug, Clone)]
pub struct GenerationClient {
    http: Client,
    endpoint: String,
    bearer: Option<String>,
}

impl GenerationClient {
    /// Create a new client pointing at the given service endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: normalize(endpoint.into()),
            bearer: None,
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, timeouts, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Set the bearer credential sent with every call.
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Returns the configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The credential, or an auth error when it is absent or empty.
    fn bearer(&self) -> Result<&str> {
        match self.bearer.as_deref() {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(GenError::Auth("missing bearer credential".into())),
        }
    }

    async fn do_submit(&self, request: &GenerationRequest) -> Result<String> {
        request.validate()?;
        let token = self.bearer()?;

        let url = format!("{}/generate", self.endpoint);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .timeout(Duration::from_secs(30))
            .json(request)
            .send()
            .await
            .map_err(|e| GenError::Network {
                context: format!(
                    "Cannot reach the generation service at {} \u{2014} is it up?",
                    self.endpoint
                ),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status, body, "generation request"));
        }

        let receipt: SubmitReceipt = resp.json().await.map_err(|e| GenError::Network {
            context: "Failed to parse submit response".into(),
            source: e,
        })?;

        if receipt.job_id.is_empty() {
            return Err(GenError::InvalidResponse("Response missing jobId".into()));
        }
        Ok(receipt.job_id)
    }

    async fn do_poll(&self, job_id: &str) -> Result<JobPoll> {
        let token = self.bearer()?;

        let url = format!("{}/generate/{}", self.endpoint, job_id);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| GenError::Network {
                context: format!("Failed to check job {}", job_id),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status, body, &format!("job {}", job_id)));
        }

        resp.json().await.map_err(|e| GenError::Network {
            context: format!("Failed to parse status of job {}", job_id),
            source: e,
        })
    }

    async fn do_fetch_asset(&self, asset_id: &str) -> Result<ResolvedAsset> {
        let token = self.bearer()?;

        let url = format!("{}/assets/{}", self.endpoint, asset_id);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| GenError::Network {
                context: format!("Failed to fetch asset {}", asset_id),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status, body, &format!("asset {}", asset_id)));
        }

        resp.json().await.map_err(|e| GenError::Network {
            context: format!("Failed to parse asset {}", asset_id),
            source: e,
        })
    }

    async fn do_set_like(&self, asset_id: &str, liked: bool) -> Result<()> {
        let token = self.bearer()?;

        let url = format!("{}/assets/{}/like", self.endpoint, asset_id);
        let builder = if liked {
            self.http.post(&url)
        } else {
            self.http.delete(&url)
        };

        let resp = builder
            .bearer_auth(token)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| GenError::Network {
                context: format!("Failed to update like for asset {}", asset_id),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status, body, &format!("asset {}", asset_id)));
        }
        Ok(())
    }
}

impl GenerationApi for GenerationClient {
    async fn submit(&self, request: &GenerationRequest) -> Result<String> {
        self.do_submit(request).await
    }

    async fn poll(&self, job_id: &str) -> Result<JobPoll> {
        self.do_poll(job_id).await
    }

    async fn fetch_asset(&self, asset_id: &str) -> Result<ResolvedAsset> {
        self.do_fetch_asset(asset_id).await
    }

    async fn set_like(&self, asset_id: &str, liked: bool) -> Result<()> {
        self.do_set_like(asset_id, liked).await
    }
}

/// Map a non-success status to the error taxonomy.
fn status_error(status: StatusCode, body: String, what: &str) -> GenError {
    match status.as_u16() {
        401 | 403 => GenError::Auth(format!("{} rejected: not authenticated", what)),
        404 => GenError::NotFound(what.to_string()),
        400 | 422 => {
            if body.is_empty() {
                GenError::Validation(format!("{} rejected by the service", what))
            } else {
                GenError::Validation(body)
            }
        }
        s => GenError::Http { status: s, body },
    }
}
