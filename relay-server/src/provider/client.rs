//! Authenticated HTTP client for the verification provider's REST API.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use super::error::ProviderError;
use crate::config::Config;

/// Outbound provider operations used by the relay.
///
/// `ProviderClient` is the production implementation; tests substitute
/// in-process stubs.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Issue a request to `path` (relative to the versioned API root).
    ///
    /// Successful responses whose body is not JSON resolve to `Value::Null`.
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ProviderError>;

    async fn get_workflow_run(&self, run_id: &str) -> Result<Value, ProviderError> {
        self.call(Method::GET, &format!("workflow_runs/{}", run_id), None)
            .await
    }

    async fn get_applicant(&self, applicant_id: &str) -> Result<Value, ProviderError> {
        self.call(Method::GET, &format!("applicants/{}", applicant_id), None)
            .await
    }

    async fn create_applicant(&self, body: &Value) -> Result<Value, ProviderError> {
        self.call(Method::POST, "applicants", Some(body)).await
    }

    async fn create_workflow_run(&self, body: &Value) -> Result<Value, ProviderError> {
        self.call(Method::POST, "workflow_runs", Some(body)).await
    }
}

/// reqwest-backed provider client.
#[derive(Clone)]
pub struct ProviderClient {
    http: Client,
    base: Url,
    version: String,
    token: String,
}

impl ProviderClient {
    /// Build a client from configuration. The timeout applies to every call.
    pub fn new(config: &Config) -> Result<Self, ProviderError> {
        let base = Url::parse(&config.api_base)
            .map_err(|e| ProviderError::Transport(format!("invalid api base: {}", e)))?;
        if base.cannot_be_a_base() {
            return Err(ProviderError::Transport(format!(
                "invalid api base: {}",
                config.api_base
            )));
        }

        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base,
            version: config.api_version.clone(),
            token: config.api_token.clone(),
        })
    }

    /// Resolve `path` under `<base>/<version>/`, percent-encoding each segment.
    fn url_for(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&self.version);
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                segments.push(segment);
            }
        }
        url
    }
}

#[async_trait]
impl ProviderApi for ProviderClient {
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ProviderError> {
        let url = self.url_for(path);

        let mut request = self
            .http
            .request(method.clone(), url)
            .header("Authorization", format!("Token token={}", self.token))
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(method = %method, path = %path, error = %e, "provider_request_failed");
                return Err(e.into());
            }
        };

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let err = ProviderError::from_response(status.as_u16(), &bytes);
            warn!(
                method = %method,
                path = %path,
                status = status.as_u16(),
                message = %err,
                "provider_error_response"
            );
            return Err(err);
        }

        info!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            body_length = bytes.len(),
            "provider_request_complete"
        );

        Ok(serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}
