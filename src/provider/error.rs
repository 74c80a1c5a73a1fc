//! Provider error types and HTTP status classification.

use std::fmt;
use std::time::Duration;

/// Classification of a failed provider call.
///
/// The pipeline's retry policy keys off this: `QuotaExhausted`, `Timeout`
/// and `Network` are transient and retried with backoff; everything else
/// requires user action and fails the pipeline immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// 429 or an explicit quota/credit exhaustion reply.
    QuotaExhausted,
    /// 401/403 - bad or revoked credential.
    PermissionDenied,
    /// 4xx indicating the request itself is unacceptable.
    MalformedRequest,
    /// The provider did not answer in time.
    Timeout,
    /// Connection-level failure or a 5xx from the provider.
    Network,
    /// Anything we could not classify.
    Unknown,
}

impl ProviderErrorKind {
    /// Whether the pipeline may retry a call that failed with this kind.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderErrorKind::QuotaExhausted
                | ProviderErrorKind::Timeout
                | ProviderErrorKind::Network
        )
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderErrorKind::QuotaExhausted => "quota exhausted",
            ProviderErrorKind::PermissionDenied => "permission denied",
            ProviderErrorKind::MalformedRequest => "malformed request",
            ProviderErrorKind::Timeout => "timeout",
            ProviderErrorKind::Network => "network error",
            ProviderErrorKind::Unknown => "unknown error",
        };
        f.write_str(s)
    }
}

/// Map an HTTP status code to an error classification.
pub fn classify_status(status: u16) -> ProviderErrorKind {
    match status {
        429 => ProviderErrorKind::QuotaExhausted,
        401 | 403 => ProviderErrorKind::PermissionDenied,
        408 => ProviderErrorKind::Timeout,
        400 | 404 | 413 | 422 => ProviderErrorKind::MalformedRequest,
        500..=599 => ProviderErrorKind::Network,
        _ => ProviderErrorKind::Unknown,
    }
}

/// A failed provider interaction.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// A request reached (or tried to reach) the provider and failed.
    #[error("{provider} request failed ({kind}): {message}")]
    Request {
        provider: String,
        kind: ProviderErrorKind,
        message: String,
    },
    /// The provider cannot be constructed at all, typically a missing
    /// credential. Surfaces to the caller unmodified.
    #[error("provider configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    pub fn request(
        provider: impl Into<String>,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        ProviderError::Request {
            provider: provider.into(),
            kind,
            message: message.into(),
        }
    }

    /// Classification of this error, if it came from a request.
    pub fn kind(&self) -> Option<ProviderErrorKind> {
        match self {
            ProviderError::Request { kind, .. } => Some(*kind),
            ProviderError::Configuration(_) => None,
        }
    }

    /// Whether the retry policy may re-send the request.
    pub fn is_retryable(&self) -> bool {
        self.kind().map_or(false, |k| k.is_retryable())
    }

    /// Build a request error from a reqwest transport failure.
    pub fn from_transport(provider: &str, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ProviderErrorKind::Timeout
        } else {
            ProviderErrorKind::Network
        };
        ProviderError::request(provider, kind, err.to_string())
    }
}

/// Retry schedule for transient provider failures.
///
/// Linear backoff: attempt 0 waits `base_delay`, attempt 1 waits
/// `2 * base_delay`, and so on. Defaults match the 5s/10s schedule the
/// pipeline documents; tests substitute a zero delay.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Extra provider calls allowed after the first transient failure.
    pub provider_retries: u32,
    /// Extra parse attempts allowed after the first extraction/validation
    /// failure.
    pub parse_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            provider_retries: 2,
            parse_retries: 2,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * (attempt + 1)
    }

    /// A policy that never sleeps, for tests.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(429), ProviderErrorKind::QuotaExhausted);
        assert_eq!(classify_status(401), ProviderErrorKind::PermissionDenied);
        assert_eq!(classify_status(403), ProviderErrorKind::PermissionDenied);
        assert_eq!(classify_status(400), ProviderErrorKind::MalformedRequest);
        assert_eq!(classify_status(408), ProviderErrorKind::Timeout);
        assert_eq!(classify_status(500), ProviderErrorKind::Network);
        assert_eq!(classify_status(529), ProviderErrorKind::Network);
        assert_eq!(classify_status(302), ProviderErrorKind::Unknown);
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ProviderErrorKind::QuotaExhausted.is_retryable());
        assert!(ProviderErrorKind::Timeout.is_retryable());
        assert!(ProviderErrorKind::Network.is_retryable());
        assert!(!ProviderErrorKind::PermissionDenied.is_retryable());
        assert!(!ProviderErrorKind::MalformedRequest.is_retryable());
        assert!(!ProviderErrorKind::Unknown.is_retryable());
    }

    #[test]
    fn test_configuration_error_never_retryable() {
        let err = ProviderError::Configuration("PERPLEXITY_API_KEY not set".into());
        assert!(!err.is_retryable());
        assert!(err.kind().is_none());
    }

    #[test]
    fn test_linear_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(5));
        assert_eq!(policy.delay(1), Duration::from_secs(10));
    }
}
