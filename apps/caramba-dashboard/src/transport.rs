use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use caramba_shared::api::ErrorBody;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ApiError, UNPARSABLE_ERROR_DETAIL};
use crate::surface::Surface;

/// One call against the panel API, relative to the panel base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn post<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self, ApiError> {
        Self::new(Method::POST, path).with_json(body)
    }

    pub fn put<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self, ApiError> {
        Self::new(Method::PUT, path).with_json(body)
    }

    fn with_json<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::RequestFailed(format!("Failed to encode request: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }
}

/// Status, content type and body of an HTTP exchange, before any interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn json(status: u16, value: &Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body: value.to_string().into_bytes(),
        }
    }

    pub fn no_content() -> Self {
        Self {
            status: 204,
            content_type: None,
            body: Vec::new(),
        }
    }
}

/// Carries a request to the panel and hands back the raw response.
///
/// Only connection-level problems are errors here; status codes are
/// interpreted by [`Transport`].
#[async_trait]
pub trait Backend: Send + Sync {
    async fn execute(&self, request: &ApiRequest) -> Result<RawResponse, ApiError>;
}

/// `reqwest` backend talking to a live panel.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpBackend {
    pub fn new(
        base_url: String,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: auth_token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn execute(&self, request: &ApiRequest) -> Result<RawResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = self.client.request(request.method.clone(), &url);
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Decoded body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Json(Value),
    Text(String),
}

impl Payload {
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        match self {
            Payload::Json(value) => serde_json::from_value(value).map_err(|e| {
                warn!("Unexpected response shape: {}", e);
                ApiError::MalformedResponse
            }),
            Payload::Empty | Payload::Text(_) => Err(ApiError::MalformedResponse),
        }
    }
}

/// How a failed call is surfaced to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reporting {
    /// Blocking alert with the failure message.
    Alert,
    /// Log only. Background refreshes use this so a dead panel does not
    /// raise an alert every period.
    Quiet,
}

/// Single entry point for panel calls.
///
/// Turns raw responses into [`Payload`]s or typed [`ApiError`]s and applies
/// the session policy: a 401 navigates the surface to the login page,
/// regardless of [`Reporting`].
#[derive(Clone)]
pub struct Transport {
    backend: Arc<dyn Backend>,
    login_path: String,
}

impl Transport {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            login_path: "/".to_string(),
        }
    }

    /// Perform the request without touching the surface.
    pub async fn send(&self, request: &ApiRequest) -> Result<Payload, ApiError> {
        debug!(method = %request.method, path = %request.path, "panel request");
        let response = self.backend.execute(request).await?;
        interpret(response)
    }

    pub async fn call(
        &self,
        request: &ApiRequest,
        surface: &mut dyn Surface,
        reporting: Reporting,
    ) -> Result<Payload, ApiError> {
        let result = self.send(request).await;
        if let Err(err) = &result {
            self.report(request, err, surface, reporting);
        }
        result
    }

    pub async fn call_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        surface: &mut dyn Surface,
        reporting: Reporting,
    ) -> Result<T, ApiError> {
        let result = match self.send(request).await {
            Ok(payload) => payload.decode(),
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            self.report(request, err, surface, reporting);
        }
        result
    }

    fn report(
        &self,
        request: &ApiRequest,
        err: &ApiError,
        surface: &mut dyn Surface,
        reporting: Reporting,
    ) {
        if err.is_session_expired() {
            warn!(path = %request.path, "Session expired, leaving dashboard");
            surface.redirect(&self.login_path);
            return;
        }

        warn!(method = %request.method, path = %request.path, "API call failed: {}", err);
        if reporting == Reporting::Alert {
            surface.alert(&format!("API Error: {}", err));
        }
    }
}

fn interpret(response: RawResponse) -> Result<Payload, ApiError> {
    if response.status == 401 {
        return Err(ApiError::SessionExpired);
    }

    if !(200..300).contains(&response.status) {
        let detail = serde_json::from_slice::<ErrorBody>(&response.body)
            .ok()
            .and_then(|body| body.message())
            .unwrap_or_else(|| UNPARSABLE_ERROR_DETAIL.to_string());
        return Err(ApiError::RequestFailed(detail));
    }

    if response.status == 204 || response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Payload::Empty);
    }

    let is_json = response
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));

    if is_json {
        serde_json::from_slice(&response.body)
            .map(Payload::Json)
            .map_err(|_| ApiError::MalformedResponse)
    } else {
        Ok(Payload::Text(
            String::from_utf8_lossy(&response.body).into_owned(),
        ))
    }
}
