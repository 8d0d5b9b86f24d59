//! Request descriptors and interpreted responses.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ClientError;
use crate::http::{HttpMethod, HttpResponse};
use crate::types::ErrorEnvelope;

/// What to send, relative to the client's base URL. Built per call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
    /// When false the credential header is not attached.
    pub authenticated: bool,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            query: Vec::new(),
            authenticated: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Put, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }
}

/// Response payload: parsed JSON when possible, raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

/// Advisory rate-limit headers. Any of them may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    pub reset: Option<u64>,
}

/// A response returned to the caller. Not retained by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: ResponseBody,
    /// Set when a non-empty body failed to parse as JSON.
    pub malformed: bool,
}

impl Response {
    pub fn from_http(raw: HttpResponse) -> Self {
        let (body, malformed) = if raw.body.trim().is_empty() {
            (ResponseBody::Text(raw.body), false)
        } else {
            match serde_json::from_str::<Value>(&raw.body) {
                Ok(value) => (ResponseBody::Json(value), false),
                Err(_) => (ResponseBody::Text(raw.body), true),
            }
        };
        Self {
            status: raw.status,
            headers: raw.headers,
            body,
            malformed,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// `Retry-After` in whole seconds. HTTP-date values are ignored.
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    pub fn rate_limit(&self) -> RateLimitInfo {
        let numeric = |name: &str| -> Option<u64> {
            self.header(name).and_then(|v| v.trim().parse().ok())
        };
        RateLimitInfo {
            limit: numeric("x-ratelimit-limit"),
            remaining: numeric("x-ratelimit-remaining"),
            reset: numeric("x-ratelimit-reset"),
        }
    }

    /// Body as text: raw text as received, or the JSON re-serialized.
    pub fn text(&self) -> String {
        match &self.body {
            ResponseBody::Text(text) => text.clone(),
            ResponseBody::Json(value) => value.to_string(),
        }
    }

    pub fn json_value(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    /// Decode the JSON body into a typed payload.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        let value = self.json_value().ok_or_else(|| {
            ClientError::Deserialization(format!(
                "HTTP {} response body is not JSON",
                self.status
            ))
        })?;
        serde_json::from_value(value.clone())
            .map_err(|e| ClientError::Deserialization(e.to_string()))
    }

    /// The error envelope, when the body has that shape.
    pub fn error_envelope(&self) -> Option<ErrorEnvelope> {
        self.json_value()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// 2xx passes through; 429 becomes `RateLimited`; anything else `Api`.
    pub fn error_for_status(self) -> Result<Self, ClientError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }

    pub(crate) fn into_error(self) -> ClientError {
        if self.is_rate_limited() {
            return ClientError::RateLimited(self);
        }
        ClientError::Api {
            status: self.status,
            envelope: self.error_envelope(),
            body: self.text(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(status: u16, headers: &[(&str, &str)], body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.to_string(),
        }
    }

    #[test]
    fn descriptor_defaults_to_authenticated_without_body() {
        let desc = RequestDescriptor::get("/projects/abc");
        assert_eq!(desc.method, HttpMethod::Get);
        assert!(desc.authenticated);
        assert!(desc.body.is_none());
        assert!(desc.query.is_empty());
        assert!(!desc.unauthenticated().authenticated);
    }

    #[test]
    fn json_body_is_parsed() {
        let resp = Response::from_http(raw(200, &[], r#"{"id":"abc","name":"T"}"#));
        assert!(!resp.malformed);
        assert_eq!(resp.json_value().unwrap()["name"], "T");
    }

    #[test]
    fn non_json_body_is_kept_as_text_and_flagged() {
        let resp = Response::from_http(raw(200, &[], "<html>oops</html>"));
        assert!(resp.malformed);
        assert_eq!(resp.body, ResponseBody::Text("<html>oops</html>".to_string()));
        assert!(resp.is_success());
    }

    #[test]
    fn empty_body_is_not_malformed() {
        let resp = Response::from_http(raw(204, &[], ""));
        assert!(!resp.malformed);
        assert_eq!(resp.text(), "");
    }

    #[test]
    fn retry_after_seconds() {
        let resp = Response::from_http(raw(429, &[("Retry-After", "5")], ""));
        assert_eq!(resp.retry_after(), Some(Duration::from_secs(5)));

        let date = Response::from_http(raw(
            429,
            &[("Retry-After", "Wed, 21 Oct 2015 07:28:00 GMT")],
            "",
        ));
        assert_eq!(date.retry_after(), None);
    }

    #[test]
    fn rate_limit_headers() {
        let resp = Response::from_http(raw(
            200,
            &[
                ("X-RateLimit-Limit", "100"),
                ("x-ratelimit-remaining", "42"),
                ("X-RateLimit-Reset", "1700000000"),
            ],
            "{}",
        ));
        assert_eq!(
            resp.rate_limit(),
            RateLimitInfo {
                limit: Some(100),
                remaining: Some(42),
                reset: Some(1_700_000_000),
            }
        );
    }

    #[test]
    fn error_for_status_classifies() {
        let ok = Response::from_http(raw(201, &[], "{}")).error_for_status();
        assert!(ok.is_ok());

        let limited = Response::from_http(raw(429, &[], "")).error_for_status();
        assert!(matches!(limited, Err(ClientError::RateLimited(r)) if r.status == 429));

        let body = json!({
            "error": "ValidationError",
            "message": "Invalid input",
            "details": [{"field": "files", "message": "required"}]
        });
        let err = Response::from_http(raw(400, &[], &body.to_string()))
            .error_for_status()
            .unwrap_err();
        match err {
            ClientError::Api { status, envelope, .. } => {
                assert_eq!(status, 400);
                let envelope = envelope.unwrap();
                assert_eq!(envelope.error, "ValidationError");
                assert_eq!(envelope.details.unwrap()[0].field, "files");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn api_error_without_envelope_keeps_raw_body() {
        let err = Response::from_http(raw(502, &[], "Bad Gateway"))
            .error_for_status()
            .unwrap_err();
        match err {
            ClientError::Api { status, envelope, body } => {
                assert_eq!(status, 502);
                assert!(envelope.is_none());
                assert_eq!(body, "Bad Gateway");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn typed_decode_of_text_body_fails() {
        let resp = Response::from_http(raw(200, &[], "nope"));
        let err = resp.json::<serde_json::Map<String, Value>>().unwrap_err();
        assert!(matches!(err, ClientError::Deserialization(_)));
    }
}
