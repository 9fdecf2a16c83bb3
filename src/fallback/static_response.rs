//! Fallback provider returning a fixed response.

use axum::http::{header, HeaderValue, StatusCode};

use crate::config::{ConfigError, FallbackConfig};
use crate::fallback::FallbackProvider;
use crate::upstream::{ForwardedRequest, UpstreamResponse};

/// Always answers with the same status, content type and body.
#[derive(Debug, Clone)]
pub struct StaticFallback {
    response: UpstreamResponse,
}

impl StaticFallback {
    pub fn new(status: StatusCode, content_type: HeaderValue, body: impl Into<String>) -> Self {
        let response = UpstreamResponse::new(status, body).with_header(header::CONTENT_TYPE, content_type);
        Self { response }
    }

    /// String bodies are sent verbatim as text, anything else as JSON.
    /// The status must be 2xx.
    pub fn from_config(config: &FallbackConfig) -> Result<Self, ConfigError> {
        let status = StatusCode::from_u16(config.status).map_err(|e| ConfigError::InvalidFallback {
            name: config.name.clone(),
            reason: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(ConfigError::InvalidFallback {
                name: config.name.clone(),
                reason: format!("status {} is not 2xx", status.as_u16()),
            });
        }

        let (default_type, body) = match &config.body {
            serde_json::Value::Null => ("application/json", String::new()),
            serde_json::Value::String(text) => ("text/plain; charset=utf-8", text.clone()),
            value => ("application/json", value.to_string()),
        };

        let content_type = match &config.content_type {
            Some(value) => HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidFallback {
                name: config.name.clone(),
                reason: format!("content type: {}", e),
            })?,
            None => HeaderValue::from_static(default_type),
        };

        Ok(Self::new(status, content_type, body))
    }
}

impl FallbackProvider for StaticFallback {
    fn fallback(&self, _request: &ForwardedRequest) -> UpstreamResponse {
        self.response.clone()
    }
}
