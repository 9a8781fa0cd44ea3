//! Provider error normalization.

use serde_json::Value;
use thiserror::Error;

/// Failure of an outbound provider call.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The provider answered with a non-success HTTP status.
    #[error("{message}")]
    Status {
        status: u16,
        message: String,
        raw: Value,
    },
    /// The call did not complete within the configured timeout.
    #[error("provider request timed out")]
    Timeout,
    /// The request could not be sent or the response could not be read.
    #[error("provider request failed: {0}")]
    Transport(String),
}

impl ProviderError {
    /// Build a status error from an upstream status code and its raw body.
    ///
    /// The message is taken from `error.message`, then `message`, falling back
    /// to `provider error <status>`.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let raw = match serde_json::from_slice::<Value>(body) {
            Ok(v) => v,
            Err(_) if body.is_empty() => Value::Null,
            Err(_) => Value::String(String::from_utf8_lossy(body).into_owned()),
        };

        let message = raw
            .pointer("/error/message")
            .and_then(Value::as_str)
            .or_else(|| raw.get("message").and_then(Value::as_str))
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("provider error {}", status));

        ProviderError::Status {
            status,
            message,
            raw,
        }
    }

    /// HTTP status to surface to the relay's own caller.
    pub fn status_code(&self) -> u16 {
        match self {
            ProviderError::Status { status, .. } => *status,
            ProviderError::Timeout => 504,
            ProviderError::Transport(_) => 502,
        }
    }

    /// Raw upstream payload, when there was one.
    pub fn raw(&self) -> Option<&Value> {
        match self {
            ProviderError::Status { raw, .. } if !raw.is_null() => Some(raw),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}
