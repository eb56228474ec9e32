//! # HTTP Processor Client
//!
//! JSON over HTTP against the processor's work-item API:
//!
//! - `POST {base}/v1/work-items` submits a [`WorkItemDescription`]
//! - `GET {base}/v1/work-items/{key}` returns a [`StatusReport`]
//!
//! A 4xx answer to a submission is a rejection. Any 5xx or network failure is
//! a [`ProcessorError`], which the poller treats as transient.

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use tracing::{debug, info, warn};

use super::{ExternalProcessor, ProcessorResult, StatusReport, SubmitResponse, WorkItemDescription};
use crate::config::{ConfigResult, ConfigurationError, ProcessorConfig};
use crate::errors::ProcessorError;

#[derive(Clone)]
pub struct HttpProcessorClient {
    client: Client,
    base_url: Url,
    config: ProcessorConfig,
}

impl std::fmt::Debug for HttpProcessorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProcessorClient")
            .field("base_url", &self.base_url.as_str())
            .field("request_timeout_seconds", &self.config.request_timeout_seconds)
            .field("auth_enabled", &self.config.api_token.is_some())
            .finish()
    }
}

impl HttpProcessorClient {
    pub fn new(config: ProcessorConfig) -> ConfigResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ConfigurationError::invalid_value("processor.base_url", &config.base_url, e.to_string())
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigurationError::invalid_value(
                "processor.base_url",
                &config.base_url,
                "must be a hierarchical URL",
            ));
        }

        let mut builder = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(format!("lifecycle-tracker/{}", env!("CARGO_PKG_VERSION")));

        if let Some(token) = config.api_token.as_deref().filter(|t| !t.is_empty()) {
            let mut headers = reqwest::header::HeaderMap::new();
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| {
                    ConfigurationError::invalid_value("processor.api_token", "<redacted>", e.to_string())
                })?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|e| ConfigurationError::LoadError {
            error: format!("Failed to create HTTP client: {e}"),
        })?;

        info!(
            base_url = %config.base_url,
            timeout_seconds = config.request_timeout_seconds,
            auth_enabled = config.api_token.is_some(),
            "Created processor HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, key: Option<&str>) -> ProcessorResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ProcessorError::RequestFailed(format!("base URL {} cannot take a path", self.base_url))
            })?;
            segments.pop_if_empty().extend(["v1", "work-items"]);
            if let Some(key) = key {
                segments.push(key);
            }
        }
        Ok(url)
    }

    async fn error_body(response: Response) -> String {
        response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string())
    }
}

#[async_trait]
impl ExternalProcessor for HttpProcessorClient {
    async fn submit(&self, description: &WorkItemDescription) -> ProcessorResult<SubmitResponse> {
        let url = self.endpoint(None)?;
        debug!(url = %url, request_id = %description.request_id, "Submitting work item");

        let response = self.client.post(url).json(description).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json::<SubmitResponse>().await?);
        }

        let body = Self::error_body(response).await;
        if status.is_client_error() {
            warn!(
                request_id = %description.request_id,
                status = %status,
                error = %body,
                "Processor rejected work item"
            );
            return Ok(SubmitResponse::rejected(format!("HTTP {status}: {body}")));
        }

        Err(ProcessorError::Api {
            status: status.as_u16(),
            message: body,
        })
    }

    async fn get_status(&self, external_key: &str) -> ProcessorResult<StatusReport> {
        let url = self.endpoint(Some(external_key))?;
        debug!(url = %url, internal_key = %external_key, "Querying work item status");

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json::<StatusReport>().await?);
        }

        Err(ProcessorError::Api {
            status: status.as_u16(),
            message: Self::error_body(response).await,
        })
    }
}
