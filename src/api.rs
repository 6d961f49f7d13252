//! Client for the job tracker REST service.
//!
//! No retries: a failed call is reported once and the caller decides what to
//! show. Records are normalized into [`JobApplication`] here so the rest of the
//! crate never sees the server's mixed key spellings.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::models::{Analytics, ApplicationStatus, JobApplication};
use crate::validate::ValidatedJob;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No response was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx response; `message` is the body's `error` field when present.
    #[error("server returned HTTP {status}: {}", message.as_deref().unwrap_or("<no message>"))]
    Server { status: u16, message: Option<String> },

    /// 2xx response whose body did not have the expected shape.
    #[error("malformed response from {endpoint}: {detail}")]
    Malformed { endpoint: String, detail: String },

    #[error("invalid API base URL '{0}'")]
    InvalidBaseUrl(String),
}

impl ApiError {
    /// Text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Transport(_) => {
                "Could not reach the job tracker service. Please try again.".to_string()
            }
            ApiError::Server {
                message: Some(message),
                ..
            } => message.clone(),
            ApiError::Server {
                status,
                message: None,
            } => format!("Request failed (HTTP {})", status),
            ApiError::Malformed { .. } => {
                "Received an unexpected response from the job tracker service.".to_string()
            }
            ApiError::InvalidBaseUrl(url) => format!("Invalid API URL: {}", url),
        }
    }
}

/// Operations the list view and the CLI need from the remote service.
pub trait JobsApi: Send + Sync {
    /// GET `show_jobs`. An empty `search` and `None` status are left off the query.
    fn list_jobs(
        &self,
        search: &str,
        status: Option<ApplicationStatus>,
    ) -> impl Future<Output = Result<Vec<JobApplication>, ApiError>> + Send;

    fn delete_job(&self, job_id: &str) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn update_status(
        &self,
        job_id: &str,
        status: ApplicationStatus,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn job_details(
        &self,
        job_id: &str,
    ) -> impl Future<Output = Result<JobApplication, ApiError>> + Send;

    fn update_job(
        &self,
        job_id: &str,
        job: &ValidatedJob,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn create_job(&self, job: &ValidatedJob) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn list_companies(&self) -> impl Future<Output = Result<Vec<String>, ApiError>> + Send;

    fn analytics(&self) -> impl Future<Output = Result<Analytics, ApiError>> + Send;
}

#[derive(Debug, Deserialize)]
struct JobsEnvelope {
    jobs: Vec<JobApplication>,
}

#[derive(Debug, Deserialize)]
struct DetailsEnvelope {
    #[serde(rename = "jobDetails")]
    job_details: JobApplication,
}

#[derive(Debug, Deserialize)]
struct CompaniesEnvelope {
    companies: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HttpJobsApi {
    client: Client,
    base_url: Url,
}

impl HttpJobsApi {
    /// `base_url` is the API root, e.g. `http://127.0.0.1:5000/api`. A call
    /// that takes longer than `timeout` end to end fails as a transport error.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let parsed =
            Url::parse(base_url).map_err(|_| ApiError::InvalidBaseUrl(base_url.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(CONNECT_TIMEOUT))
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        debug!(endpoint, "sending request");
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!(endpoint, error = %e, "request timed out");
            } else {
                warn!(endpoint, error = %e, "request did not reach the server");
            }
            ApiError::Transport(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = server_error(status.as_u16(), &body);
        warn!(endpoint, status = status.as_u16(), error = %err, "request failed");
        Err(err)
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        response: Response,
    ) -> Result<T, ApiError> {
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        decode_body(endpoint, &body)
    }
}

/// Build the error for a non-2xx response from its raw body.
fn server_error(status: u16, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|m| !m.trim().is_empty());
    ApiError::Server { status, message }
}

fn decode_body<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| {
        error!(endpoint, error = %e, "response body has an unexpected shape");
        ApiError::Malformed {
            endpoint: endpoint.to_string(),
            detail: e.to_string(),
        }
    })
}

impl JobsApi for HttpJobsApi {
    async fn list_jobs(
        &self,
        search: &str,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<JobApplication>, ApiError> {
        let mut request = self.client.get(self.endpoint(&["show_jobs"])?);
        if !search.is_empty() {
            request = request.query(&[("search", search)]);
        }
        if let Some(status) = status {
            request = request.query(&[("status", status.label())]);
        }

        let response = self.send("show_jobs", request).await?;
        let envelope: JobsEnvelope = self.read_json("show_jobs", response).await?;
        debug!(count = envelope.jobs.len(), "fetched jobs");
        Ok(envelope.jobs)
    }

    async fn delete_job(&self, job_id: &str) -> Result<(), ApiError> {
        let request = self.client.delete(self.endpoint(&["delete_job", job_id])?);
        self.send("delete_job", request).await?;
        Ok(())
    }

    async fn update_status(&self, job_id: &str, status: ApplicationStatus) -> Result<(), ApiError> {
        let request = self
            .client
            .put(self.endpoint(&["update_status", job_id])?)
            .json(&json!({ "newStatus": status }));
        self.send("update_status", request).await?;
        Ok(())
    }

    async fn job_details(&self, job_id: &str) -> Result<JobApplication, ApiError> {
        let request = self.client.get(self.endpoint(&["job_details", job_id])?);
        let response = self.send("job_details", request).await?;
        let envelope: DetailsEnvelope = self.read_json("job_details", response).await?;
        Ok(envelope.job_details)
    }

    async fn update_job(&self, job_id: &str, job: &ValidatedJob) -> Result<(), ApiError> {
        let request = self
            .client
            .put(self.endpoint(&["update_job", job_id])?)
            .json(&job.update_body());
        self.send("update_job", request).await?;
        Ok(())
    }

    async fn create_job(&self, job: &ValidatedJob) -> Result<(), ApiError> {
        let request = self.client.post(self.endpoint(&["jobs"])?).json(job);
        self.send("jobs", request).await?;
        Ok(())
    }

    async fn list_companies(&self) -> Result<Vec<String>, ApiError> {
        let request = self.client.get(self.endpoint(&["companies"])?);
        let response = self.send("companies", request).await?;
        let envelope: CompaniesEnvelope = self.read_json("companies", response).await?;
        Ok(envelope.companies)
    }

    async fn analytics(&self) -> Result<Analytics, ApiError> {
        let request = self.client.get(self.endpoint(&["analytics"])?);
        let response = self.send("analytics", request).await?;
        self.read_json("analytics", response).await
    }
}
