//! Client configuration from environment variables.
//!
//! | Variable                | Meaning                                        |
//! |-------------------------|------------------------------------------------|
//! | `SKETCH_API_BASE_URL`   | API root, default `https://editor.p5js.org/api` |
//! | `SKETCH_USE_TOKEN_AUTH` | `true` selects basic-token auth                |
//! | `SKETCH_SESSION_COOKIE` | value of the `connect.sid` cookie              |
//! | `SKETCH_USERNAME`       | account name for token auth                    |
//! | `SKETCH_ACCESS_TOKEN`   | personal access token                          |
//! | `SKETCH_TIMEOUT_MS`     | per-attempt timeout                            |
//! | `SKETCH_MAX_ATTEMPTS`   | attempts while rate limited                    |
//! | `SKETCH_BASE_DELAY_MS`  | first backoff delay                            |

use std::time::Duration;

use crate::auth::Credential;
use crate::client::{ClientOptions, SketchClient};
use crate::error::ClientError;
use crate::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://editor.p5js.org/api";

// Placeholder values shipped in example configs; never real credentials.
const PLACEHOLDERS: &[&str] = &[
    "YOUR_SESSION_COOKIE_HERE",
    "your_username",
    "your_personal_access_token",
];

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub credential: Credential,
    pub options: ClientOptions,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup` instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("SKETCH_API_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let use_token = match lookup("SKETCH_USE_TOKEN_AUTH") {
            Some(v) => parse_bool("SKETCH_USE_TOKEN_AUTH", &v)?,
            None => false,
        };

        let credential = if use_token {
            let username = required(&lookup, "SKETCH_USERNAME")?;
            let token = required(&lookup, "SKETCH_ACCESS_TOKEN")?;
            Credential::basic_token(username, token)
        } else {
            Credential::session_cookie(required(&lookup, "SKETCH_SESSION_COOKIE")?)
        };

        let defaults = ClientOptions::default();
        let timeout = match lookup("SKETCH_TIMEOUT_MS") {
            Some(v) => Duration::from_millis(parse_u64("SKETCH_TIMEOUT_MS", &v)?),
            None => defaults.timeout,
        };
        let max_attempts = match lookup("SKETCH_MAX_ATTEMPTS") {
            Some(v) => u32::try_from(parse_u64("SKETCH_MAX_ATTEMPTS", &v)?).map_err(|_| {
                ClientError::Configuration("SKETCH_MAX_ATTEMPTS is out of range".to_string())
            })?,
            None => defaults.retry_policy.max_attempts(),
        };
        let base_delay = match lookup("SKETCH_BASE_DELAY_MS") {
            Some(v) => Duration::from_millis(parse_u64("SKETCH_BASE_DELAY_MS", &v)?),
            None => defaults.retry_policy.base_delay(),
        };

        Ok(Self {
            base_url,
            credential,
            options: ClientOptions {
                timeout,
                retry_policy: RetryPolicy::new(max_attempts, base_delay)?,
                ..defaults
            },
        })
    }

    pub fn into_client(self) -> Result<SketchClient, ClientError> {
        SketchClient::new(&self.base_url, self.credential, self.options)
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ClientError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ClientError::Configuration(format!("{key} is not set")))?;
    if PLACEHOLDERS.contains(&value.as_str()) {
        return Err(ClientError::Configuration(format!(
            "{key} still holds the placeholder value"
        )));
    }
    Ok(value)
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ClientError> {
    value.trim().parse().map_err(|_| {
        ClientError::Configuration(format!("{key} must be a non-negative integer, got {value:?}"))
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ClientError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ClientError::Configuration(format!(
            "{key} must be a boolean, got {value:?}"
        ))),
    }
}
