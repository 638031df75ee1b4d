//! HTTP transport seam.
//!
//! The coordinator only needs "send this request, give me the status and
//! body back". [`ReqwestTransport`] is the production implementation; tests
//! plug in scripted transports.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::request::{ApiRequest, ApiResponse};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue `request`. Any HTTP status (including 401) is `Ok`; `Err` means
    /// no response was obtained.
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        (**self).send(request).await
    }
}

/// `reqwest`-backed transport rooted at the configured API URL.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    api_url: String,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_client(reqwest::Client::new(), &config.api_url)
    }

    pub fn with_client(client: reqwest::Client, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, request: &ApiRequest) -> String {
        format!("{}{}", self.api_url, request.path)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(request);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        tracing::debug!(
            request_id = %request.id(),
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            "request completed"
        );

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
