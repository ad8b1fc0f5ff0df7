//! Authenticator capability.
//!
//! A challenge suspends the caller until the user responds. The vault only
//! needs to know whether it succeeded; the variants exist for logging.

use async_trait::async_trait;

/// Why a challenge did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The user dismissed the prompt.
    #[error("authentication cancelled")]
    Cancelled,

    /// The presented credential did not match.
    #[error("authentication failed: {reason}")]
    Failed { reason: String },

    /// Too many failed attempts; the authenticator refuses for now.
    #[error("authentication locked out")]
    LockedOut,

    /// No usable authentication method (no passcode, no enrollment).
    #[error("authentication unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Device-owner authentication.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Show `prompt` and wait for the user. Timeouts are the implementation's
    /// concern.
    async fn challenge(&self, prompt: &str) -> Result<(), AuthError>;
}
