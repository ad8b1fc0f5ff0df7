//! Vault error types.
//!
//! All vault subsystems surface errors through [`VaultError`], which is the
//! single error type returned by every public API in this crate. Expected
//! conditions (the user declined a prompt, the identifier is absent) are
//! ordinary variants rather than panics so callers are forced to handle them.
//!
//! Callers that hand errors to an untrusted consumer should convert them with
//! [`VaultError::public`], which strips the trust findings from integrity
//! failures.

use std::collections::BTreeSet;

use crate::trust::FindingKind;

/// Unified error type for the BioSecure credential vault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    // -- Caller errors ------------------------------------------------------
    /// Empty or malformed input. Never retried.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    // -- Guard errors -------------------------------------------------------
    /// The trust verifier judged the device untrustworthy.
    #[error("integrity violation: {} finding(s)", findings.len())]
    IntegrityViolation { findings: BTreeSet<FindingKind> },

    // -- Authentication errors ----------------------------------------------
    /// The user failed or cancelled the authentication challenge.
    #[error("authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    // -- Backend errors -----------------------------------------------------
    /// The requested secret does not exist.
    #[error("secret not found: identifier={identifier}")]
    NotFound { identifier: String },

    /// Opaque non-success status from the secure storage backend.
    #[error("backend error: status={code}")]
    BackendError { code: i32 },

    // -- Crypto errors ------------------------------------------------------
    /// Encryption failed (e.g. invalid key length).
    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    /// Decryption failed (e.g. wrong key, bad padding, truncated envelope).
    #[error("decryption failed: {reason}")]
    DecryptionFailed { reason: String },

    /// The platform CSPRNG could not be sampled.
    #[error("secure randomness unavailable")]
    RandomnessUnavailable,

    // -- Ambient errors -----------------------------------------------------
    /// Configuration is missing or malformed.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    /// I/O error from the filesystem (file backend, config loading).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout the vault crate.
pub type Result<T> = std::result::Result<T, VaultError>;

impl VaultError {
    /// `true` for conditions that are part of normal operation: the user said
    /// no, or the identifier was never stored.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. } | Self::NotFound { .. }
        )
    }

    /// `true` when issuing the same call again may succeed.
    ///
    /// Only a fresh authentication challenge qualifies; cipher failures are
    /// deterministic and integrity violations must not be retried
    /// automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }

    /// Convert into the form that may be shown to a consumer.
    pub fn public(&self) -> PublicError {
        match self {
            Self::InvalidArgument { reason } => PublicError::InvalidArguments {
                reason: reason.clone(),
            },
            Self::IntegrityViolation { .. } => PublicError::IntegrityCheckFailed,
            Self::AuthenticationFailed { .. } => PublicError::AuthenticationFailed,
            Self::NotFound { .. } => PublicError::NotFound,
            Self::BackendError { code } => PublicError::Backend { code: *code },
            Self::EncryptionFailed { .. }
            | Self::DecryptionFailed { .. }
            | Self::RandomnessUnavailable => PublicError::Crypto,
            Self::Config { .. } | Self::Io(_) | Self::Serialization(_) => PublicError::Internal,
        }
    }
}

/// Consumer-facing error.
///
/// Carries no trust findings, so a caller probing the vault learns only that
/// the device was rejected, not which check fired.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublicError {
    #[error("missing or invalid arguments: {reason}")]
    InvalidArguments { reason: String },

    #[error("security validation failed")]
    IntegrityCheckFailed,

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("item not found")]
    NotFound,

    #[error("secure storage error: {code}")]
    Backend { code: i32 },

    #[error("cryptographic operation failed")]
    Crypto,

    #[error("internal error")]
    Internal,
}

impl PublicError {
    /// Stable machine-readable code for the error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::IntegrityCheckFailed => "integrity_check_failed",
            Self::AuthenticationFailed => "auth_failed",
            Self::NotFound => "not_found",
            Self::Backend { .. } => "backend_error",
            Self::Crypto => "crypto_error",
            Self::Internal => "internal_error",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_backend() {
        let err = VaultError::BackendError { code: -25299 };
        assert_eq!(err.to_string(), "backend error: status=-25299");
    }

    #[test]
    fn error_display_integrity_counts_findings() {
        let findings: BTreeSet<_> = [FindingKind::DebuggerAttached, FindingKind::LoaderInjection]
            .into_iter()
            .collect();
        let err = VaultError::IntegrityViolation { findings };
        assert_eq!(err.to_string(), "integrity violation: 2 finding(s)");
    }

    #[test]
    fn public_error_hides_findings() {
        let findings: BTreeSet<_> = [FindingKind::TamperArtifact].into_iter().collect();
        let public = VaultError::IntegrityViolation { findings }.public();

        assert_eq!(public, PublicError::IntegrityCheckFailed);
        assert_eq!(public.code(), "integrity_check_failed");
        assert!(!public.to_string().contains("tamper"));
    }

    #[test]
    fn expected_vs_exceptional() {
        assert!(
            VaultError::NotFound {
                identifier: "k".into()
            }
            .is_expected()
        );
        assert!(
            VaultError::AuthenticationFailed {
                reason: "cancelled".into()
            }
            .is_expected()
        );
        assert!(!VaultError::BackendError { code: 1 }.is_expected());
        assert!(!VaultError::RandomnessUnavailable.is_expected());
    }

    #[test]
    fn only_authentication_is_retryable() {
        assert!(
            VaultError::AuthenticationFailed {
                reason: "declined".into()
            }
            .is_retryable()
        );
        assert!(
            !VaultError::DecryptionFailed {
                reason: "bad padding".into()
            }
            .is_retryable()
        );
        assert!(
            !VaultError::IntegrityViolation {
                findings: BTreeSet::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn crypto_errors_share_public_code() {
        assert_eq!(VaultError::RandomnessUnavailable.public().code(), "crypto_error");
        assert_eq!(
            VaultError::EncryptionFailed {
                reason: "x".into()
            }
            .public()
            .code(),
            "crypto_error"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<VaultError>();
        assert_send_sync::<PublicError>();
    }
}
