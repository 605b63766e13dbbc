//! Explicit session context threaded into backends and coordinators.

use serde::{Deserialize, Serialize};

/// Authenticated user context.
///
/// Constructed once at startup and passed explicitly; no component reads
/// session state from ambient storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token for backend requests.
    pub auth_token: String,
    /// The user's wallet address (settlement recipient and gate key).
    pub wallet_address: String,
}

impl Session {
    /// Create a session.
    pub fn new(auth_token: impl Into<String>, wallet_address: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            wallet_address: wallet_address.into(),
        }
    }

    /// Whether the session carries a usable token.
    pub fn is_authenticated(&self) -> bool {
        !self.auth_token.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_authenticated() {
        assert!(Session::new("tok", "0xabc").is_authenticated());
        assert!(!Session::new("", "0xabc").is_authenticated());
        assert!(!Session::new("   ", "0xabc").is_authenticated());
    }
}
