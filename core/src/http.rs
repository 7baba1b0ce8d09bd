//! HTTP transport types and the injected transport boundary.
//!
//! # Design
//! The broker never touches the network itself. It builds an `HttpRequest`
//! as plain data and hands it to a caller-supplied `Transport`, which returns
//! a `TransportResponse`. Response bodies are exposed through consuming
//! readers (`self: Box<Self>`), so a response body can be read at most once
//! and only in the representation the classifier asks for.
//!
//! `HttpResponse` is the buffered, plain-data response used by hosts that
//! already hold the whole body in memory (and by tests).

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Blob;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether cookies and credentials travel with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialsMode {
    Omit,
    #[default]
    Include,
}

/// Cache mode the transport should apply to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    NoStore,
}

/// Request body as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    Binary(Vec<u8>),
}

impl Body {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Text(text) => text.as_bytes(),
            Body::Binary(bytes) => bytes,
        }
    }
}

/// An HTTP request described as plain data.
///
/// Built by the broker. The transport executes it and returns the matching
/// `TransportResponse`.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub credentials: CredentialsMode,
    pub cache: CacheMode,
    pub body: Option<Body>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Failures raised by the transport collaborator or by its body readers.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("response body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// The injected fetch primitive.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: HttpRequest,
    ) -> Result<Box<dyn TransportResponse>, TransportError>;
}

/// A response whose body has not been read yet.
///
/// Every reader consumes the response, so exactly one representation can be
/// read per response.
#[async_trait]
pub trait TransportResponse: Send {
    fn status(&self) -> u16;

    fn status_text(&self) -> &str;

    /// True iff the status is in the 2xx range.
    fn ok(&self) -> bool {
        (200..300).contains(&self.status())
    }

    async fn text(self: Box<Self>) -> Result<String, TransportError>;

    async fn json(self: Box<Self>) -> Result<serde_json::Value, TransportError>;

    async fn blob(self: Box<Self>) -> Result<Blob, TransportError>;

    async fn array_buffer(self: Box<Self>) -> Result<Vec<u8>, TransportError>;
}

/// An HTTP response described as plain data, fully buffered.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Build a response with the canonical reason phrase for `status`.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: reason_phrase(status).to_string(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[async_trait]
impl TransportResponse for HttpResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Invalid UTF-8 is replaced, never rejected.
    async fn text(self: Box<Self>) -> Result<String, TransportError> {
        Ok(String::from_utf8_lossy(&self.body).into_owned())
    }

    /// An empty body decodes to `null` so bodiless successes (204) classify.
    async fn json(self: Box<Self>) -> Result<serde_json::Value, TransportError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    async fn blob(self: Box<Self>) -> Result<Blob, TransportError> {
        let content_type = self.header("content-type").unwrap_or_default().to_string();
        Ok(Blob {
            content_type,
            bytes: self.body,
        })
    }

    async fn array_buffer(self: Box<Self>) -> Result<Vec<u8>, TransportError> {
        Ok(self.body)
    }
}

/// Reason phrases for the statuses the broker reacts to, plus the common ones.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        418 => "I'm a teapot",
        422 => "Unprocessable Entity",
        451 => "Unavailable For Legal Reasons",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_flag_covers_2xx_only() {
        assert!(HttpResponse::new(200, "").ok());
        assert!(HttpResponse::new(204, "").ok());
        assert!(!HttpResponse::new(199, "").ok());
        assert!(!HttpResponse::new(300, "").ok());
        assert!(!HttpResponse::new(500, "").ok());
    }

    #[test]
    fn request_header_lookup_ignores_case() {
        let req = HttpRequest {
            method: HttpMethod::Get,
            url: "http://localhost/x".to_string(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            credentials: CredentialsMode::Include,
            cache: CacheMode::NoStore,
            body: None,
        };
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("accept"), None);
    }

    #[tokio::test]
    async fn text_reader_replaces_invalid_utf8() {
        let response = Box::new(HttpResponse::new(401, vec![b'b', b'a', b'd', 0xff]));
        assert_eq!(response.text().await.unwrap(), "bad\u{fffd}");
    }

    #[test]
    fn credentials_mode_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&CredentialsMode::Include).unwrap(), "\"include\"");
        let mode: CredentialsMode = serde_json::from_str("\"omit\"").unwrap();
        assert_eq!(mode, CredentialsMode::Omit);
    }
}
