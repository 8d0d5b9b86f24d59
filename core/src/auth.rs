//! Credentials and the auth header they produce.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::ClientError;

/// Name of the editor's session cookie.
pub const SESSION_COOKIE_NAME: &str = "connect.sid";

/// Header values may hold tab, visible ASCII and obs-text; no other controls.
pub(crate) fn is_header_safe(value: &str) -> bool {
    value.bytes().all(|b| b == b'\t' || (b >= 0x20 && b != 0x7f))
}

/// The single credential a client attaches to authenticated requests.
///
/// `Debug` never prints the secret parts.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Browser session cookie, sent as `Cookie: connect.sid=<value>`.
    SessionCookie { value: String },

    /// Personal access token, sent as HTTP Basic auth.
    BasicToken { username: String, token: String },
}

impl Credential {
    pub fn session_cookie(value: impl Into<String>) -> Self {
        Credential::SessionCookie {
            value: value.into(),
        }
    }

    pub fn basic_token(username: impl Into<String>, token: impl Into<String>) -> Self {
        Credential::BasicToken {
            username: username.into(),
            token: token.into(),
        }
    }

    /// Reject credentials that cannot possibly produce a valid header.
    pub fn validate(&self) -> Result<(), ClientError> {
        match self {
            Credential::SessionCookie { value } => {
                if value.trim().is_empty() {
                    return Err(ClientError::Configuration(
                        "session cookie is empty".to_string(),
                    ));
                }
                if value.contains(';') || !is_header_safe(value) {
                    return Err(ClientError::Configuration(
                        "session cookie contains illegal characters".to_string(),
                    ));
                }
            }
            Credential::BasicToken { username, token } => {
                if username.is_empty() || token.is_empty() {
                    return Err(ClientError::Configuration(
                        "basic token credential needs both username and token".to_string(),
                    ));
                }
                if username.contains(':') {
                    return Err(ClientError::Configuration(
                        "username must not contain ':'".to_string(),
                    ));
                }
            }
        }
        if !is_header_safe(&self.header().1) {
            return Err(ClientError::Configuration(format!(
                "{} credential does not form a valid header value",
                self.scheme()
            )));
        }
        Ok(())
    }

    /// Short scheme name, safe to log.
    pub fn scheme(&self) -> &'static str {
        match self {
            Credential::SessionCookie { .. } => "session-cookie",
            Credential::BasicToken { .. } => "basic-token",
        }
    }

    /// The `(name, value)` auth header for this credential.
    pub fn header(&self) -> (&'static str, String) {
        match self {
            Credential::SessionCookie { value } => {
                ("Cookie", format!("{SESSION_COOKIE_NAME}={value}"))
            }
            Credential::BasicToken { username, token } => {
                let encoded = STANDARD.encode(format!("{username}:{token}"));
                ("Authorization", format!("Basic {encoded}"))
            }
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::SessionCookie { .. } => f
                .debug_struct("SessionCookie")
                .field("value", &"<redacted>")
                .finish(),
            Credential::BasicToken { username, .. } => f
                .debug_struct("BasicToken")
                .field("username", username)
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}
