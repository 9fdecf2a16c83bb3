//! Semantic validation of a parsed configuration.
//!
//! Returns all validation errors, not just the first.

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use url::Url;

use crate::config::schema::{GatewayConfig, HeaderPair, ResourceType, RouteConfig};
use crate::resilience::BackoffPolicy;
use crate::upstream::request::is_absolute;

/// A single semantic problem, located by a dotted field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the whole configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be positive"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be positive"));
    }
    if config.retries.max_delay_ms < config.retries.base_delay_ms {
        errors.push(ValidationError::new(
            "retries.max_delay_ms",
            "must not be lower than base_delay_ms",
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    let mut fallback_names = HashSet::new();
    for (i, fallback) in config.fallbacks.iter().enumerate() {
        let field = format!("fallbacks[{}]", i);
        if fallback.name.is_empty() {
            errors.push(ValidationError::new(format!("{}.name", field), "must not be empty"));
        } else if !fallback_names.insert(fallback.name.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.name", field),
                format!("duplicate fallback '{}'", fallback.name),
            ));
        }
        match StatusCode::from_u16(fallback.status) {
            Ok(status) if status.is_success() => {}
            Ok(_) => errors.push(ValidationError::new(
                format!("{}.status", field),
                format!("{} is not a 2xx status", fallback.status),
            )),
            Err(_) => errors.push(ValidationError::new(
                format!("{}.status", field),
                format!("{} is not a valid status code", fallback.status),
            )),
        }
        if let Some(content_type) = &fallback.content_type {
            if HeaderValue::from_str(content_type).is_err() {
                errors.push(ValidationError::new(
                    format!("{}.content_type", field),
                    "not a valid header value",
                ));
            }
        }
    }

    let backoff = BackoffPolicy::from(&config.retries);
    let request_timeout = Duration::from_secs(config.timeouts.request_secs);
    let mut prefixes = HashSet::new();
    for (i, route) in config.routes.iter().enumerate() {
        let field = format!("routes[{}]", i);
        validate_route(&field, route, &mut errors);
        check_request_envelope(&field, route, &backoff, request_timeout, &mut errors);
        if !prefixes.insert(route.prefix.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.prefix", field),
                format!("duplicate prefix '{}'", route.prefix),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(field: &str, route: &RouteConfig, errors: &mut Vec<ValidationError>) {
    if !route.prefix.starts_with('/') {
        errors.push(ValidationError::new(
            format!("{}.prefix", field),
            "must start with '/'",
        ));
    }
    if route.timeout_ms == 0 {
        errors.push(ValidationError::new(format!("{}.timeout_ms", field), "must be positive"));
    }
    if route.charset.trim().is_empty() {
        errors.push(ValidationError::new(format!("{}.charset", field), "must not be empty"));
    }

    match route.resource_type {
        ResourceType::Proxy => {
            check_backend_url(&format!("{}.provider", field), &route.provider, errors);
        }
        ResourceType::Redirect => {
            if route.url.is_empty() {
                errors.push(ValidationError::new(
                    format!("{}.url", field),
                    "redirect routes need a url",
                ));
            } else if HeaderValue::from_str(&route.url).is_err() {
                errors.push(ValidationError::new(
                    format!("{}.url", field),
                    "not usable as a Location header",
                ));
            }
        }
        ResourceType::Stream | ResourceType::File => {
            if route.url.is_empty() {
                errors.push(ValidationError::new(
                    format!("{}.url", field),
                    format!("{} routes need a url", route.resource_type),
                ));
            } else if is_absolute(&route.url) {
                check_backend_url(&format!("{}.url", field), &route.url, errors);
            } else {
                check_backend_url(&format!("{}.provider", field), &route.provider, errors);
            }
        }
    }

    validate_headers(&format!("{}.default_headers", field), &route.default_headers, errors);
    for name in &route.ignored_headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                format!("{}.ignored_headers", field),
                format!("'{}' is not a valid header name", name),
            ));
        }
    }
}

/// Worst case time a route can spend on one request: the admission wait and
/// every attempt are each bounded by the route timeout, plus the backoff
/// between attempts.
fn route_budget(route: &RouteConfig, backoff: &BackoffPolicy) -> Duration {
    let timeout = Duration::from_millis(route.timeout_ms);
    timeout
        .saturating_mul(route.retries.saturating_add(2))
        .saturating_add(backoff.worst_case_total(route.retries))
}

// The outer request timeout must cover the whole retry loop and the fallback.
fn check_request_envelope(
    field: &str,
    route: &RouteConfig,
    backoff: &BackoffPolicy,
    request_timeout: Duration,
    errors: &mut Vec<ValidationError>,
) {
    if route.resource_type == ResourceType::Redirect || route.timeout_ms == 0 || request_timeout.is_zero() {
        return;
    }
    let budget = route_budget(route, backoff);
    if budget > request_timeout {
        errors.push(ValidationError::new(
            format!("{}.timeout_ms", field),
            format!(
                "{} retries of {}ms can take up to {}ms, beyond timeouts.request_secs ({}s)",
                route.retries,
                route.timeout_ms,
                budget.as_millis(),
                request_timeout.as_secs()
            ),
        ));
    }
}

fn validate_headers(field: &str, headers: &[HeaderPair], errors: &mut Vec<ValidationError>) {
    for pair in headers {
        if HeaderName::from_bytes(pair.name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                field,
                format!("'{}' is not a valid header name", pair.name),
            ));
        }
        if HeaderValue::from_str(&pair.value).is_err() {
            errors.push(ValidationError::new(
                field,
                format!("value of '{}' is not a valid header value", pair.name),
            ));
        }
    }
}

fn check_backend_url(field: &str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.is_empty() {
        errors.push(ValidationError::new(field, "must not be empty"));
        return;
    }
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid url: {}", e))),
    }
}
