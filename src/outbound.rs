//! Outbound HTTP helper for calling third-party REST services.
//!
//! ```rust,ignore
//! let response = RequestClient::new(Method::GET, "https://api.example.com/models")
//!     .payload(json!({"make": "honda"}))
//!     .send()
//!     .await?;
//! assert_eq!(response.status_code, 200);
//! ```

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum OutboundError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid header `{0}`")]
    InvalidHeader(String),
}

/// Status, raw body and decoded text of a response.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundResponse {
    pub status_code: u16,
    #[serde(skip)]
    pub payload: Vec<u8>,
    pub text: String,
}

impl OutboundResponse {
    /// The body parsed as JSON, if it is JSON.
    #[must_use]
    pub fn json(&self) -> Option<JsonValue> {
        serde_json::from_slice(&self.payload).ok()
    }
}

/// One outbound request. GET sends the payload as query parameters; every other method
/// sends it as a JSON body.
#[derive(Debug, Clone)]
pub struct RequestClient {
    client: reqwest::Client,
    method: Method,
    url: String,
    headers: HeaderMap,
    payload: Option<JsonValue>,
    timeout: Duration,
}

impl RequestClient {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            payload: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Reuse an existing client and its connection pool.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// # Errors
    ///
    /// `InvalidHeader` if the name or value is not a valid HTTP header.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, OutboundError> {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| OutboundError::InvalidHeader(name.to_string()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| OutboundError::InvalidHeader(name.to_string()))?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    #[must_use]
    pub fn payload(mut self, payload: JsonValue) -> Self {
        self.payload = Some(payload);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// # Errors
    ///
    /// `Transport` when the request cannot be sent or the body cannot be read. Non-2xx
    /// statuses are not errors; check `status_code`.
    pub async fn send(self) -> Result<OutboundResponse, OutboundError> {
        tracing::info!(method = %self.method, url = %self.url, "Outbound request");

        let mut request = self
            .client
            .request(self.method.clone(), &self.url)
            .headers(self.headers)
            .timeout(self.timeout);
        if let Some(payload) = &self.payload {
            request = if self.method == Method::GET {
                request.query(&query_pairs(payload))
            } else {
                request.json(payload)
            };
        }

        let response = request.send().await.inspect_err(|err| {
            tracing::warn!(method = %self.method, url = %self.url, error = %err, "Outbound request failed");
        })?;
        let status_code = response.status().as_u16();
        let payload = response.bytes().await?.to_vec();
        let text = String::from_utf8_lossy(&payload).into_owned();

        tracing::info!(
            method = %self.method,
            url = %self.url,
            status = status_code,
            bytes = payload.len(),
            "Outbound response"
        );
        Ok(OutboundResponse {
            status_code,
            payload,
            text,
        })
    }
}

fn query_pairs(payload: &JsonValue) -> Vec<(String, String)> {
    match payload {
        JsonValue::Object(fields) => fields
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| {
                let value = match value {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_pairs() {
        let pairs = query_pairs(&json!({"make": "honda", "year": 2020, "trim": null}));
        assert_eq!(
            pairs,
            vec![
                ("make".to_string(), "honda".to_string()),
                ("year".to_string(), "2020".to_string()),
            ]
        );
        assert!(query_pairs(&json!([1, 2])).is_empty());
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        let err = RequestClient::new(Method::GET, "http://localhost")
            .header("bad header", "x")
            .unwrap_err();
        assert!(matches!(err, OutboundError::InvalidHeader(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let err = RequestClient::new(Method::POST, "http://127.0.0.1:9/cars")
            .payload(json!({"model": "Civic"}))
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .unwrap_err();
        assert!(matches!(err, OutboundError::Transport(_)));
    }

    #[test]
    fn test_response_json() {
        let response = OutboundResponse {
            status_code: 200,
            payload: br#"{"ok":true}"#.to_vec(),
            text: r#"{"ok":true}"#.to_string(),
        };
        assert_eq!(response.json(), Some(json!({"ok": true})));
    }
}
