//! Error types surfaced by the generation core.
//!
//! Only [`GenError::Configuration`] and [`GenError::Provider`] ever reach the
//! user. Cache and example-corpus failures are logged and degraded locally,
//! but keep their own variants so the degrade paths can log something precise.

use crate::ai_client::Provider;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Broad classification of a failed provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Auth,
    Quota,
    Network,
    Timeout,
    MalformedResponse,
    Api,
}

impl ProviderErrorKind {
    /// Whether retrying the same request later has a reasonable chance of succeeding.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Quota | Self::Network | Self::Timeout)
    }

    /// Classify a non-success HTTP response.
    pub fn from_status(status: u16, body: &str) -> Self {
        let lowered = body.to_lowercase();
        match status {
            401 | 403 => Self::Auth,
            429 => Self::Quota,
            _ if lowered.contains("quota") || lowered.contains("rate limit") => Self::Quota,
            408 | 504 => Self::Timeout,
            _ => Self::Api,
        }
    }

    fn hint(self) -> &'static str {
        match self {
            Self::Auth => "check the API key; retrying will not help",
            Self::Quota => "quota or rate limit hit; retry in a few minutes",
            Self::Network => "network failure; retrying may help",
            Self::Timeout => "the request timed out; retrying may help",
            Self::MalformedResponse => "unexpected response shape; retrying is unlikely to help",
            Self::Api => "the provider rejected the request",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auth => "authentication",
            Self::Quota => "quota",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::MalformedResponse => "malformed response",
            Self::Api => "api",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum GenError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{provider} {kind} error: {message} ({hint})", hint = .kind.hint())]
    Provider {
        provider: Provider,
        kind: ProviderErrorKind,
        message: String,
    },

    #[error("cache I/O error at {path:?}: {source}")]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not load examples for '{category}': {reason}")]
    ExampleLoad { category: String, reason: String },
}

impl GenError {
    pub fn provider(provider: Provider, kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self::Provider {
            provider,
            kind,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { kind, .. } => kind.is_retryable(),
            _ => false,
        }
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 2,
            Self::Provider { .. } => 3,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ProviderErrorKind::from_status(401, ""), ProviderErrorKind::Auth);
        assert_eq!(ProviderErrorKind::from_status(403, ""), ProviderErrorKind::Auth);
        assert_eq!(ProviderErrorKind::from_status(429, ""), ProviderErrorKind::Quota);
        assert_eq!(
            ProviderErrorKind::from_status(400, "Quota exceeded for project"),
            ProviderErrorKind::Quota
        );
        assert_eq!(ProviderErrorKind::from_status(500, "boom"), ProviderErrorKind::Api);
    }

    #[test]
    fn test_provider_error_mentions_provider_and_retry_hint() {
        let err = GenError::provider(Provider::Groq, ProviderErrorKind::Quota, "429 Too Many Requests");
        let text = err.to_string();
        assert!(text.contains("groq"));
        assert!(text.contains("retry in a few minutes"));
        assert!(err.is_retryable());
        assert_eq!(err.exit_code(), 3);

        let auth = GenError::provider(Provider::Gemini, ProviderErrorKind::Auth, "bad key");
        assert!(!auth.is_retryable());
        assert!(auth.to_string().contains("retrying will not help"));
    }
}
