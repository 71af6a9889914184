use std::time::Duration;

/// Typed error hierarchy for the external generation service.
/// Classifies errors as fatal (don't retry), retryable, or operational.
#[derive(Clone, Debug, thiserror::Error)]
pub enum GenerationError {
    // Fatal — don't retry
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Retryable
    #[error("rate limited")]
    RateLimited,
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("generation service returned an empty response")]
    EmptyResponse,

    // Operational
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("cancelled")]
    Cancelled,
}

impl GenerationError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError { .. } | Self::NetworkError(_) | Self::EmptyResponse
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_) | Self::InvalidRequest(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::InvalidRequest(_) => "invalid_request",
            Self::RateLimited => "rate_limited",
            Self::ServerError { .. } => "server_error",
            Self::NetworkError(_) => "network_error",
            Self::EmptyResponse => "empty_response",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
        }
    }

    /// Classify an HTTP status code into the appropriate error variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed(body),
            400 => Self::InvalidRequest(body),
            429 => Self::RateLimited,
            500..=599 => Self::ServerError { status, body },
            _ => Self::InvalidRequest(format!("unexpected status {status}: {body}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(GenerationError::RateLimited.is_retryable());
        assert!(GenerationError::ServerError { status: 500, body: "err".into() }.is_retryable());
        assert!(GenerationError::NetworkError("tcp".into()).is_retryable());
        assert!(GenerationError::EmptyResponse.is_retryable());
    }

    #[test]
    fn fatal_classification() {
        assert!(GenerationError::AuthenticationFailed("bad key".into()).is_fatal());
        assert!(GenerationError::InvalidRequest("bad".into()).is_fatal());
        assert!(!GenerationError::RateLimited.is_fatal());
    }

    #[test]
    fn not_retryable_and_not_fatal() {
        let timeout = GenerationError::Timeout(Duration::from_secs(30));
        assert!(!timeout.is_retryable());
        assert!(!timeout.is_fatal());

        let cancelled = GenerationError::Cancelled;
        assert!(!cancelled.is_retryable());
        assert!(!cancelled.is_fatal());
    }

    #[test]
    fn from_status_mapping() {
        assert!(GenerationError::from_status(401, "unauthorized".into()).is_fatal());
        assert!(GenerationError::from_status(400, "bad request".into()).is_fatal());
        assert!(GenerationError::from_status(429, "slow down".into()).is_retryable());
        assert!(GenerationError::from_status(500, "internal".into()).is_retryable());
        assert!(GenerationError::from_status(503, "unavailable".into()).is_retryable());
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(GenerationError::Cancelled.error_kind(), "cancelled");
        assert_eq!(GenerationError::RateLimited.error_kind(), "rate_limited");
        assert_eq!(GenerationError::EmptyResponse.error_kind(), "empty_response");
    }
}
