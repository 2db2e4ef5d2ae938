use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::metrics;

/// Longest response body kept in a [`HttpError::Status`].
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Request timeout")]
    Timeout,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Request failed: {0}")]
    Request(String),
}

impl HttpError {
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(403)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HttpError::Timeout
        } else if e.is_connect() {
            HttpError::ConnectionFailed(e.to_string())
        } else if e.is_decode() {
            HttpError::Decode(e.to_string())
        } else {
            HttpError::Request(e.to_string())
        }
    }
}

/// Connection settings for one remote service.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Label used in logs and metrics, e.g. `sonarr`.
    pub service: String,
    pub base_url: String,
    pub timeout: Duration,
    pub verify_tls: bool,
    /// Headers sent with every request (API keys).
    pub default_headers: Vec<(String, String)>,
    /// Basic auth credentials sent with every request.
    pub basic_auth: Option<(String, String)>,
}

impl HttpSettings {
    pub fn new(service: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            verify_tls: true,
            default_headers: Vec::new(),
            basic_auth: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tls_verification(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Send basic auth, unless both parts are empty.
    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        self.basic_auth = (!username.is_empty() || !password.is_empty())
            .then(|| (username.to_string(), password.to_string()));
        self
    }
}

/// Request/auth core shared by the vendor clients.
#[derive(Debug, Clone)]
pub struct HttpCore {
    client: Client,
    base_url: String,
    service: String,
    basic_auth: Option<(String, String)>,
}

impl HttpCore {
    pub fn new(settings: HttpSettings) -> Result<Self, HttpError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &settings.default_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| HttpError::Request(format!("invalid header name {}: {}", name, e)))?;
            let mut value = HeaderValue::from_str(value)
                .map_err(|e| HttpError::Request(format!("invalid header value: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(settings.timeout)
            .cookie_store(true)
            .danger_accept_invalid_certs(!settings.verify_tls)
            .default_headers(headers)
            .build()
            .map_err(|e| HttpError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            service: settings.service,
            basic_auth: settings.basic_auth,
        })
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Send a request, recording metrics and turning non-2xx into [`HttpError::Status`].
    async fn send(&self, request: RequestBuilder) -> Result<Response, HttpError> {
        let request = match &self.basic_auth {
            Some((username, password)) => request.basic_auth(username, Some(password)),
            None => request,
        };
        let start = Instant::now();
        let result = request.send().await;
        metrics::EXTERNAL_SERVICE_DURATION
            .with_label_values(&[self.service.as_str()])
            .observe(start.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(response) if response.status().is_success() => Ok(response),
            Ok(response) => {
                let status = response.status().as_u16();
                let body: String = response
                    .text()
                    .await
                    .unwrap_or_default()
                    .chars()
                    .take(MAX_ERROR_BODY)
                    .collect();
                Err(HttpError::Status { status, body })
            }
            Err(e) => Err(HttpError::from(e)),
        };

        let label = if outcome.is_ok() { "success" } else { "error" };
        metrics::EXTERNAL_SERVICE_REQUESTS
            .with_label_values(&[self.service.as_str(), label])
            .inc();
        outcome
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, HttpError> {
        debug!(service = %self.service, path, "GET");
        let response = self.send(self.client.get(self.url(path))).await?;
        response
            .json()
            .await
            .map_err(|e| HttpError::Decode(e.to_string()))
    }

    /// GET with query parameters. Only the path is logged, so secrets may travel in `query`.
    pub async fn get_json_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, HttpError> {
        debug!(service = %self.service, path, "GET");
        let response = self
            .send(self.client.get(self.url(path)).query(query))
            .await?;
        response
            .json()
            .await
            .map_err(|e| HttpError::Decode(e.to_string()))
    }

    pub async fn get_text(&self, path: &str) -> Result<String, HttpError> {
        debug!(service = %self.service, path, "GET");
        let response = self.send(self.client.get(self.url(path))).await?;
        Ok(response.text().await?)
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(service = %self.service, path, "POST");
        let response = self
            .send(self.client.post(self.url(path)).json(body))
            .await?;
        response
            .json()
            .await
            .map_err(|e| HttpError::Decode(e.to_string()))
    }

    /// POST a JSON body, ignoring the response content.
    pub async fn post_json_unit<B>(&self, path: &str, body: &B) -> Result<(), HttpError>
    where
        B: Serialize + ?Sized,
    {
        debug!(service = %self.service, path, "POST");
        self.send(self.client.post(self.url(path)).json(body))
            .await?;
        Ok(())
    }

    pub async fn post_form(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<String, HttpError> {
        debug!(service = %self.service, path, "POST form");
        let response = self
            .send(self.client.post(self.url(path)).form(params))
            .await?;
        Ok(response.text().await?)
    }

    pub async fn delete(&self, path: &str) -> Result<(), HttpError> {
        debug!(service = %self.service, path, "DELETE");
        self.send(self.client.delete(self.url(path))).await?;
        Ok(())
    }
}
