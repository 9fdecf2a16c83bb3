//! Response framing.
//!
//! # Responsibilities
//! - Build buffered, redirect and file responses with exact framing
//! - Mirror the client's keep-alive choice onto the response
//!
//! # Design Decisions
//! - `Content-Length` is always set from the real byte count
//! - Buffered bodies default to `application/json`
//! - Buffered bodies are UTF-8 after decoding, so a relayed `charset`
//!   parameter is rewritten to `utf-8`
//! - `Connection` is only written for HTTP/1.x; HTTP/2 forbids it

use std::borrow::Cow;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode, Version},
    response::Response,
};

use crate::error::GatewayError;

/// Content type of buffered responses whose backend sent none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Content type of files whose type could not be determined.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Relabel a content type for a body re-encoded as UTF-8. Types without a
/// `charset` parameter are returned unchanged.
pub fn utf8_content_type(value: &str) -> Cow<'_, str> {
    let mut params = value.split(';');
    let essence = params.next().unwrap_or_default();
    let mut rewritten = false;
    let mut out = essence.trim_end().to_string();

    for param in params {
        let param = param.trim();
        if param.is_empty() {
            continue;
        }
        let is_charset = param
            .split_once('=')
            .is_some_and(|(name, _)| name.trim().eq_ignore_ascii_case("charset"));
        out.push_str("; ");
        if is_charset {
            out.push_str("charset=utf-8");
            rewritten = true;
        } else {
            out.push_str(param);
        }
    }

    if rewritten {
        Cow::Owned(out)
    } else {
        Cow::Borrowed(value)
    }
}

/// A fully buffered response.
pub fn buffered(status: StatusCode, content_type: Option<&str>, body: String) -> Response {
    let content_type = content_type
        .and_then(|value| HeaderValue::from_str(&utf8_content_type(value)).ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    let length = body.len();

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    response
}

/// `302 Found` pointing at `location`, with an empty body.
pub fn redirect(location: &str) -> Result<Response, GatewayError> {
    let location = HeaderValue::from_str(location)
        .map_err(|_| GatewayError::InvalidRequest(format!("unusable redirect target '{}'", location)))?;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::FOUND;
    let headers = response.headers_mut();
    headers.insert(header::LOCATION, location);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(0u64));
    Ok(response)
}

/// A streamed file response. `headers` must already carry length and type.
pub fn streamed(headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.headers_mut() = headers;
    response
}

/// `attachment; filename="<name>"`.
pub fn attachment_disposition(file_name: &str) -> Result<HeaderValue, GatewayError> {
    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name))
        .map_err(|_| GatewayError::InvalidRequest(format!("unusable file name '{}'", file_name)))
}

/// Echo the client's keep-alive decision.
pub fn mirror_keep_alive(response: &mut Response, version: Version, keep_alive: bool) {
    if version != Version::HTTP_10 && version != Version::HTTP_11 {
        return;
    }
    let value = if keep_alive { "keep-alive" } else { "close" };
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static(value));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_framing() {
        let response = buffered(StatusCode::OK, None, "{\"ok\":true}".to_string());
        assert_eq!(response.headers()[header::CONTENT_TYPE], DEFAULT_CONTENT_TYPE);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "11");

        let text = buffered(StatusCode::CREATED, Some("text/plain"), "héllo".to_string());
        assert_eq!(text.status(), StatusCode::CREATED);
        assert_eq!(text.headers()[header::CONTENT_TYPE], "text/plain");
        // Byte length, not character count.
        assert_eq!(text.headers()[header::CONTENT_LENGTH], "6");
    }

    #[test]
    fn test_utf8_content_type() {
        assert_eq!(utf8_content_type("text/plain; charset=ISO-8859-1"), "text/plain; charset=utf-8");
        assert_eq!(
            utf8_content_type("text/html;Charset=\"windows-1252\";level=1"),
            "text/html; charset=utf-8; level=1"
        );
        assert!(matches!(utf8_content_type("application/json"), Cow::Borrowed("application/json")));
        assert!(matches!(utf8_content_type("text/plain; format=flowed"), Cow::Borrowed(_)));

        let relabelled = buffered(StatusCode::OK, Some("text/plain; charset=ISO-8859-1"), "café".to_string());
        assert_eq!(relabelled.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(relabelled.headers()[header::CONTENT_LENGTH], "5");
    }

    #[test]
    fn test_redirect() {
        let response = redirect("https://example.com/new").unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "https://example.com/new");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "0");
    }

    #[test]
    fn test_mirror_keep_alive() {
        let mut response = buffered(StatusCode::OK, None, String::new());
        mirror_keep_alive(&mut response, Version::HTTP_11, false);
        assert_eq!(response.headers()[header::CONNECTION], "close");

        mirror_keep_alive(&mut response, Version::HTTP_10, true);
        assert_eq!(response.headers()[header::CONNECTION], "keep-alive");

        let mut h2 = buffered(StatusCode::OK, None, String::new());
        mirror_keep_alive(&mut h2, Version::HTTP_2, true);
        assert!(!h2.headers().contains_key(header::CONNECTION));
    }

    #[test]
    fn test_attachment_disposition() {
        let value = attachment_disposition("doc.pdf").unwrap();
        assert_eq!(value, "attachment; filename=\"doc.pdf\"");
    }
}
