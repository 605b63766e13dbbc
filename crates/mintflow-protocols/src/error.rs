//! Shared error types for backend and wallet capabilities.

use thiserror::Error;

/// Errors returned by backend capability implementations.
///
/// `Network` and `RateLimited` are transient: polling loops absorb them
/// and keep going. Everything else is surfaced to the caller with the
/// raw backend reason preserved.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request payload was rejected by the backend.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// No valid session; the caller must re-authenticate.
    #[error("Not authenticated: {0}")]
    Auth(String),

    /// The backend was unreachable or the connection dropped.
    #[error("Backend unreachable: {0}")]
    Network(String),

    /// The backend rate-limited the request (HTTP 429).
    #[error("Rate limited by backend")]
    RateLimited,

    /// Business-state conflict (e.g. a claim is already pending).
    /// Not a transient fault; never retried.
    #[error("Backend conflict [{code}]: {message}")]
    Conflict { code: String, message: String },

    /// Any other non-success response.
    #[error("Backend error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("Failed to decode backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Whether a retry inside a polling loop may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Network(_) | BackendError::RateLimited)
    }
}

/// Errors surfaced by the wallet-signing capability.
///
/// All variants are hard failures: in the claim flow they trigger the
/// compensating voucher cancellation.
#[derive(Debug, Error)]
pub enum WalletError {
    /// The user rejected the signing request.
    #[error("Signing request rejected by user")]
    Rejected,

    /// The wallet capability is not available.
    #[error("Wallet unavailable: {0}")]
    Unavailable(String),

    /// The wallet did not respond within the deadline.
    #[error("Wallet timed out after {0}s")]
    Timeout(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BackendError::RateLimited.is_transient());
        assert!(BackendError::Network("connection reset".into()).is_transient());
        assert!(!BackendError::Auth("expired".into()).is_transient());
        assert!(
            !BackendError::Conflict {
                code: "claim_pending".into(),
                message: "a claim is already pending".into()
            }
            .is_transient()
        );
    }
}
