//! Shared JSON-over-HTTP transport for the REST providers.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{AgentError, truncate_chars};

/// Characters of an error response body kept in [`AgentError::ApiRequest`].
const MAX_ERROR_BODY_CHARS: usize = 500;

/// HTTP client bound to one provider endpoint and key.
#[derive(Clone)]
pub(crate) struct HttpClientBase {
    pub(crate) provider: &'static str,
    pub(crate) endpoint: String,
    api_key: String,
    http: Client,
}

impl HttpClientBase {
    pub(crate) fn new(
        provider: &'static str,
        endpoint: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::ApiRequest {
                provider: provider.to_string(),
                message: format!("failed to build HTTP client: {e}"),
                status: None,
            })?;
        Ok(Self {
            provider,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http,
        })
    }

    /// Joins `path` onto the endpoint.
    pub(crate) fn build_url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    /// POSTs `body` with the API key in header `key_header` plus `headers`.
    ///
    /// Non-2xx responses become [`AgentError::ApiRequest`] carrying the
    /// status and a truncated body.
    pub(crate) async fn post_with_key_header<Req, Res>(
        &self,
        url: &str,
        key_header: &str,
        headers: &[(&str, &str)],
        body: &Req,
    ) -> Result<Res, AgentError>
    where
        Req: Serialize + Sync,
        Res: DeserializeOwned,
    {
        let mut builder = self
            .http
            .post(url)
            .header(key_header, &self.api_key)
            .json(body);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let response = builder.send().await.map_err(|e| self.request_error(e))?;
        let status = response.status();
        debug!(provider = self.provider, status = status.as_u16(), "provider responded");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::ApiRequest {
                provider: self.provider.to_string(),
                message: truncate_chars(body.trim(), MAX_ERROR_BODY_CHARS),
                status: Some(status.as_u16()),
            });
        }

        response.json().await.map_err(|e| AgentError::ResponseParse {
            provider: self.provider.to_string(),
            message: e.to_string(),
        })
    }

    fn request_error(&self, e: reqwest::Error) -> AgentError {
        let status = e.status().map(|s| s.as_u16());
        AgentError::ApiRequest {
            provider: self.provider.to_string(),
            message: e.without_url().to_string(),
            status,
        }
    }
}

impl std::fmt::Debug for HttpClientBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClientBase")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
