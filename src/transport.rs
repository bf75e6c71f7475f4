//! One outbound HTTP call per invocation.
//!
//! [`Transport`] is the seam between orchestration logic and the network;
//! [`HttpTransport`] is the reqwest implementation used in production.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::HttpSettings;
use crate::error::{GenflowError, Result};

/// How a call authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// Credential travels inside the JSON body.
    None,
    Bearer(String),
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::None => write!(f, "None"),
            Auth::Bearer(_) => write!(f, "Bearer(***)"),
        }
    }
}

/// A fully built POST request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpCall {
    pub url: Url,
    pub auth: Auth,
    pub body: Value,
}

impl HttpCall {
    pub fn new(url: Url, auth: Auth, body: Value) -> Self {
        Self { url, auth, body }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Bytes { content_type: String, data: Vec<u8> },
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl TransportResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: ResponseBody::Json(body),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

pub trait Transport: Send + Sync {
    fn send(
        &self,
        call: &HttpCall,
    ) -> impl Future<Output = std::result::Result<TransportResponse, TransportError>> + Send;
}

/// reqwest-backed transport. Build once and share.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(GenflowError::Http)?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn send(
        &self,
        call: &HttpCall,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let mut request = self
            .client
            .post(call.url.clone())
            .header("content-type", "application/json")
            .json(&call.body);
        if let Auth::Bearer(token) = &call.auth {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        let data = response.bytes().await?.to_vec();

        Ok(TransportResponse {
            status,
            body: decode_body(&content_type, data),
        })
    }
}

fn decode_body(content_type: &str, data: Vec<u8>) -> ResponseBody {
    if content_type.starts_with("image/")
        || content_type.starts_with("audio/")
        || content_type.starts_with("video/")
        || content_type == "application/octet-stream"
    {
        return ResponseBody::Bytes {
            content_type: content_type.to_string(),
            data,
        };
    }
    // Some providers send JSON under text/plain or omit the header.
    match serde_json::from_slice::<Value>(&data) {
        Ok(value) => ResponseBody::Json(value),
        Err(_) => ResponseBody::Text(String::from_utf8_lossy(&data).into_owned()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_body_is_decoded() {
        let body = decode_body("application/json", br#"{"status":"success"}"#.to_vec());
        assert_eq!(body.as_json(), Some(&json!({"status": "success"})));
    }

    #[test]
    fn json_without_content_type_is_decoded() {
        let body = decode_body("", br#"{"a":1}"#.to_vec());
        assert_eq!(body, ResponseBody::Json(json!({"a": 1})));
    }

    #[test]
    fn image_body_is_kept_binary() {
        let body = decode_body("image/png", vec![0x89, 0x50, 0x4e, 0x47]);
        assert_eq!(
            body,
            ResponseBody::Bytes {
                content_type: "image/png".into(),
                data: vec![0x89, 0x50, 0x4e, 0x47],
            }
        );
    }

    #[test]
    fn html_error_page_is_text() {
        let body = decode_body("text/html", b"<html>Bad Gateway</html>".to_vec());
        assert_eq!(body, ResponseBody::Text("<html>Bad Gateway</html>".into()));
    }

    #[test]
    fn bearer_is_redacted() {
        assert_eq!(format!("{:?}", Auth::Bearer("sk-1".into())), "Bearer(***)");
    }

    #[test]
    fn transport_error_display() {
        assert_eq!(TransportError::Timeout.to_string(), "request timed out");
        assert_eq!(
            TransportError::Network("connection refused".into()).to_string(),
            "network error: connection refused"
        );
    }
}
