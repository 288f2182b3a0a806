//! JSON-over-HTTP implementation of the session collaborators.
//!
//! | Call | Request | Response |
//! |------|---------|----------|
//! | duplicate lookup | `GET {base}/invoices/{uuid}/exists` | `{"exists": bool}` |
//! | active projects | `GET {base}/projects` | `[{"code": "...", "name": "..."}]` |
//! | submission | `POST {base}/invoices` with a [`SubmissionPayload`] | `{"success": bool, "message": "..."}` |

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::core::{BackendConfig, PortalError};
use crate::gate::{InvoiceRegistry, Project, ProjectCatalog, SubmissionPayload, SubmissionReceipt, SubmissionSink};

/// Portal backend reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ExistsResponse {
    exists: bool,
}

impl HttpBackend {
    /// Build a client for `base_url` with the given request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PortalError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortalError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build from the `[backend]` config section.
    ///
    /// # Errors
    ///
    /// Returns `PortalError::Config` when no `base_url` is configured.
    pub fn from_config(config: &BackendConfig) -> Result<Self, PortalError> {
        let base_url = config
            .base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| PortalError::Config("backend.base_url is not set".into()))?;
        Self::new(base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `{base}/invoices/{uuid}/exists` with the UUID percent-encoded as one
    /// path segment.
    fn exists_url(&self, uuid: &str) -> Result<reqwest::Url, PortalError> {
        let uuid = uuid.trim().to_uppercase();
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| PortalError::Config(format!("backend.base_url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| PortalError::Config("backend.base_url cannot take a path".into()))?
            .pop_if_empty()
            .extend(["invoices", uuid.as_str(), "exists"]);
        Ok(url)
    }

    async fn read_json<T: DeserializeOwned>(
        resp: reqwest::Response,
        fail: fn(String) -> PortalError,
    ) -> Result<T, PortalError> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| PortalError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(fail(format!("HTTP {status}: {body}")));
        }
        serde_json::from_str(&body).map_err(|e| fail(format!("unexpected response: {e}")))
    }
}

impl InvoiceRegistry for HttpBackend {
    async fn exists(&self, uuid: &str) -> Result<bool, PortalError> {
        let url = self.exists_url(uuid)?;
        tracing::debug!(%url, "duplicate lookup");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PortalError::Network(e.to_string()))?;
        let answer: ExistsResponse = Self::read_json(resp, PortalError::Lookup).await?;
        Ok(answer.exists)
    }
}

impl ProjectCatalog for HttpBackend {
    async fn list(&self) -> Result<Vec<Project>, PortalError> {
        let resp = self
            .client
            .get(self.url("projects"))
            .send()
            .await
            .map_err(|e| PortalError::Network(e.to_string()))?;
        let projects: Vec<Project> = Self::read_json(resp, PortalError::Lookup).await?;
        tracing::debug!(count = projects.len(), "active projects loaded");
        Ok(projects)
    }
}

impl SubmissionSink for HttpBackend {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt, PortalError> {
        tracing::info!(uuid = %payload.uuid, week = %payload.payment_week, "submitting invoice");
        let resp = self
            .client
            .post(self.url("invoices"))
            .json(payload)
            .send()
            .await
            .map_err(|e| PortalError::Network(e.to_string()))?;
        Self::read_json(resp, PortalError::Submission).await
    }
}
