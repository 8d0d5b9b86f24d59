//! Authenticated, rate-limit-aware client for the sketch editor API.
//!
//! # Design
//! `SketchClient` holds only immutable configuration: base URL, credential,
//! options, a transport and a sleeper. Every call goes through `request`,
//! which builds an `HttpRequest` from a `RequestDescriptor`, sends it, and
//! repeats the identical request while the server answers 429 and the retry
//! policy allows. No state is shared between calls, so one client can be used
//! from many threads at once.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::{is_header_safe, Credential};
use crate::error::ClientError;
use crate::http::{HttpRequest, HttpTransport, UreqTransport};
use crate::request::{RequestDescriptor, Response};
use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

const DEFAULT_USER_AGENT: &str = concat!("sketch-client/", env!("CARGO_PKG_VERSION"));

/// Per-client options. Immutable once the client is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Per-attempt timeout. Only applied by the built-in ureq transport.
    pub timeout: Duration,
    pub retry_policy: RetryPolicy,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry_policy: RetryPolicy::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct SketchClient {
    base_url: String,
    credential: Credential,
    options: ClientOptions,
    transport: Arc<dyn HttpTransport>,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for SketchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SketchClient")
            .field("base_url", &self.base_url)
            .field("credential", &self.credential)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

// Everything but unreserved characters; `.` stays encoded so ids can never
// form dot-segments.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'~');

/// Encode a caller-supplied value as exactly one path segment.
fn segment(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT).to_string()
}

fn validate_base_url(base_url: &str) -> Result<String, ClientError> {
    let parsed = Url::parse(base_url)
        .map_err(|e| ClientError::Configuration(format!("invalid base URL {base_url:?}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ClientError::Configuration(format!(
            "base URL must use http or https, got {:?}",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none() {
        return Err(ClientError::Configuration(format!(
            "base URL {base_url:?} has no host"
        )));
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(ClientError::Configuration(format!(
            "base URL {base_url:?} must not carry a query or fragment"
        )));
    }
    Ok(base_url.trim_end_matches('/').to_string())
}

impl SketchClient {
    /// Build a client that talks HTTP through ureq.
    pub fn new(
        base_url: &str,
        credential: Credential,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let transport = UreqTransport::new(options.timeout);
        Self::with_transport(base_url, credential, options, transport)
    }

    /// Build a client on top of a caller-supplied transport.
    pub fn with_transport<T>(
        base_url: &str,
        credential: Credential,
        options: ClientOptions,
        transport: T,
    ) -> Result<Self, ClientError>
    where
        T: HttpTransport + 'static,
    {
        let base_url = validate_base_url(base_url)?;
        credential.validate()?;
        if !is_header_safe(&options.user_agent) {
            return Err(ClientError::Configuration(
                "user agent contains illegal characters".to_string(),
            ));
        }
        if options.timeout.is_zero() {
            return Err(ClientError::Configuration(
                "timeout must be positive".to_string(),
            ));
        }
        Ok(Self {
            base_url,
            credential,
            options,
            transport: Arc::new(transport),
            sleeper: Arc::new(ThreadSleeper),
        })
    }

    /// Replace how backoff waits are performed.
    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Turn a descriptor into the exact request that goes on the wire.
    pub fn build_request(&self, descriptor: &RequestDescriptor) -> Result<HttpRequest, ClientError> {
        let mut url = self.base_url.clone();
        if !descriptor.path.starts_with('/') {
            url.push('/');
        }
        url.push_str(&descriptor.path);
        if !descriptor.query.is_empty() {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(descriptor.query.iter())
                .finish();
            url.push('?');
            url.push_str(&query);
        }

        let mut headers = vec![("User-Agent".to_string(), self.options.user_agent.clone())];

        let body = match &descriptor.body {
            Some(value) if descriptor.method.allows_body() => {
                let text = serde_json::to_string(value)
                    .map_err(|e| ClientError::Serialization(e.to_string()))?;
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                Some(text)
            }
            _ => None,
        };

        if descriptor.authenticated {
            let (name, value) = self.credential.header();
            headers.push((name.to_string(), value));
        }

        Ok(HttpRequest {
            method: descriptor.method,
            url,
            headers,
            body,
        })
    }

    /// Send a request, backing off and resending while the server answers 429.
    ///
    /// Returns `Ok` for every HTTP status, including a final 429 once the
    /// retry policy is exhausted. Only transport failures are `Err`, and
    /// those are never retried.
    pub fn request(&self, descriptor: &RequestDescriptor) -> Result<Response, ClientError> {
        let request = self.build_request(descriptor)?;
        let policy = self.options.retry_policy;
        let auth = if descriptor.authenticated {
            self.credential.scheme()
        } else {
            "none"
        };

        let mut attempt = 1;
        loop {
            info!(
                method = %descriptor.method,
                path = %descriptor.path,
                auth,
                attempt,
                "sending request"
            );
            let started = Instant::now();
            let raw = match self.transport.execute(&request) {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(
                        method = %descriptor.method,
                        path = %descriptor.path,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        error = %err,
                        "request failed"
                    );
                    return Err(err.into());
                }
            };
            let response = Response::from_http(raw);
            info!(
                status = response.status,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "received response"
            );
            if response.malformed {
                debug!(status = response.status, "malformed-response: body is not JSON");
            }

            if !response.is_rate_limited() {
                return Ok(response);
            }
            if attempt >= policy.max_attempts() {
                warn!(attempts = attempt, "rate limit retries exhausted");
                return Ok(response);
            }

            let delay = policy.delay_for(attempt, response.retry_after());
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "rate limited, backing off"
            );
            self.sleeper.sleep(delay);
            attempt += 1;
        }
    }

    fn send_checked(&self, descriptor: RequestDescriptor) -> Result<Response, ClientError> {
        self.request(&descriptor)?.error_for_status()
    }

    fn to_json<P: Serialize + ?Sized>(payload: &P) -> Result<Value, ClientError> {
        serde_json::to_value(payload).map_err(|e| ClientError::Serialization(e.to_string()))
    }

    /// `POST /projects`
    pub fn create_project<P: Serialize + ?Sized>(&self, payload: &P) -> Result<Response, ClientError> {
        self.send_checked(RequestDescriptor::post("/projects", Self::to_json(payload)?))
    }

    /// `GET /projects/{id}`
    pub fn get_project(&self, id: &str) -> Result<Response, ClientError> {
        self.send_checked(RequestDescriptor::get(format!("/projects/{}", segment(id))))
    }

    /// `PUT /projects/{id}`
    pub fn update_project<P: Serialize + ?Sized>(
        &self,
        id: &str,
        payload: &P,
    ) -> Result<Response, ClientError> {
        self.send_checked(RequestDescriptor::put(
            format!("/projects/{}", segment(id)),
            Self::to_json(payload)?,
        ))
    }

    /// `DELETE /projects/{id}`
    pub fn delete_project(&self, id: &str) -> Result<Response, ClientError> {
        self.send_checked(RequestDescriptor::delete(format!("/projects/{}", segment(id))))
    }

    /// `GET /{username}/sketches`. Public route: no credential is attached.
    pub fn list_user_projects(&self, username: &str) -> Result<Response, ClientError> {
        self.send_checked(
            RequestDescriptor::get(format!("/{}/sketches", segment(username))).unauthenticated(),
        )
    }

    /// Call `GET /auth/access-check` with the configured credential.
    ///
    /// `Some(true)` when accepted, `Some(false)` on 401/403, `None` when the
    /// endpoint does not exist (404).
    pub fn check_access(&self) -> Result<Option<bool>, ClientError> {
        let response = self.request(&RequestDescriptor::get("/auth/access-check"))?;
        match response.status {
            200..=299 => Ok(Some(true)),
            401 | 403 => Ok(Some(false)),
            404 => Ok(None),
            _ => Err(response.into_error()),
        }
    }

    /// Editor origin: the base URL without its trailing `/api` segment.
    fn editor_origin(&self) -> &str {
        self.base_url.strip_suffix("/api").unwrap_or(&self.base_url)
    }

    /// Link to a sketch in the editor.
    pub fn sketch_url(&self, username: &str, project_id: &str) -> String {
        format!("{}/{username}/sketches/{project_id}", self.editor_origin())
    }

    /// Link to a sketch's full-screen view.
    pub fn full_view_url(&self, username: &str, project_id: &str) -> String {
        format!("{}/{username}/full/{project_id}", self.editor_origin())
    }
}
