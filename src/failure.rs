//! Connection failure injection.
//!
//! A host profile may carry a [`ConnectionFailure`]; connect then raises the
//! corresponding error before touching any session state. Synthesis is
//! deterministic: every connect to the same host yields an identical error.

use crate::environ::HostKey;
use crate::error::ConnectError;
use std::sync::Arc;
use thiserror::Error;

/// Default key material for `BadHostKey` when the test supplies none.
const DEFAULT_OFFERED_KEY: &str = "ssh-ed25519 AAAAMockOfferedKey";
const DEFAULT_EXPECTED_KEY: &str = "ssh-ed25519 AAAAMockExpectedKey";

/// Tagged description of a synthesized connect-time failure.
#[derive(Debug, Clone)]
pub enum ConnectionFailure {
    /// Name resolution fails; the raised error embeds the hostname.
    Dns,
    /// The connection attempt times out. This is a static error, not a wait.
    Timeout,
    /// Authentication is rejected regardless of supplied credentials.
    Auth,
    /// The host refuses the connection.
    Refused,
    /// Host key verification fails, with optional custom key material.
    BadHostKey {
        offered: Option<String>,
        expected: Option<String>,
    },
    /// An arbitrary test-supplied error value, surfaced unmodified. Every
    /// connect raises the same shared value.
    Custom(Arc<dyn std::error::Error + Send + Sync>),
}

/// Backing error for [`ConnectionFailure::custom`] message strings.
#[derive(Debug, Error)]
#[error("{0}")]
struct MessageError(String);

impl ConnectionFailure {
    /// Host-key failure with defaulted key material.
    pub fn bad_host_key() -> Self {
        Self::BadHostKey {
            offered: None,
            expected: None,
        }
    }

    /// Host-key failure with explicit offered/expected keys.
    pub fn bad_host_key_with(offered: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::BadHostKey {
            offered: Some(offered.into()),
            expected: Some(expected.into()),
        }
    }

    /// Custom failure from a plain message string.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(Arc::new(MessageError(message.into())))
    }

    /// Custom failure carrying a caller-supplied error value.
    pub fn custom_error(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(error))
    }

    /// Synthesize the connect error for this failure.
    pub(crate) fn synthesize(&self, key: &HostKey, username: Option<&str>) -> ConnectError {
        match self {
            Self::Dns => ConnectError::DnsFailure {
                host: key.host.clone(),
            },
            Self::Timeout => ConnectError::Timeout {
                host: key.host.clone(),
                port: key.port,
            },
            Self::Auth => ConnectError::AuthFailed {
                host: key.host.clone(),
                user: username.unwrap_or("unknown").to_string(),
            },
            Self::Refused => ConnectError::Refused {
                host: key.host.clone(),
                port: key.port,
            },
            Self::BadHostKey { offered, expected } => ConnectError::HostKeyMismatch {
                host: key.host.clone(),
                offered: offered.clone().unwrap_or_else(|| DEFAULT_OFFERED_KEY.to_string()),
                expected: expected
                    .clone()
                    .unwrap_or_else(|| DEFAULT_EXPECTED_KEY.to_string()),
            },
            Self::Custom(source) => ConnectError::Custom(Arc::clone(source)),
        }
    }
}
