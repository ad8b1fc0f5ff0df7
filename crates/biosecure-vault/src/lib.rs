//! Biometric-gated credential vault.
//!
//! This crate stores small secrets (tokens, keys, passwords) in a platform
//! secure store such that reading them back requires a biometric match
//! against the currently enrolled biometry, and refuses to operate at all on
//! a device that looks tampered with.
//!
//! Platform services are injected as capability traits so the core is free
//! of OS-version conditionals and can be driven by test doubles:
//!
//! | capability | trait | provided here |
//! |---|---|---|
//! | at-rest storage | [`SecureBackend`] | [`MemoryBackend`], [`FileBackend`] |
//! | user challenge | [`Authenticator`] | none |
//! | device capability | [`CapabilityProbe`] | none |
//! | randomness | [`RandomSource`] | [`SystemRandomSource`] |
//! | trust verdict | [`IntegrityCheck`] | [`TrustVerifier`] |
//!
//! # Modules
//!
//! - [`crypto`]: AES-256-CBC/PKCS#7 cipher envelopes, key generation, PBKDF2.
//! - [`trust`]: tamper, debugger and instrumentation heuristics.
//! - [`policy`]: the fixed access policy, capability and security level.
//! - [`backend`]: the storage capability and an in-memory backend.
//! - [`file_backend`]: encrypted one-file-per-secret backend.
//! - [`auth`]: the authentication capability.
//! - [`config`]: deployment configuration.
//! - [`vault`]: the guarded [`CredentialVault`].
//! - [`error`]: unified error types.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use biosecure_vault::{CredentialVault, MemoryBackend};
//!
//! let vault = CredentialVault::new(Arc::new(MemoryBackend::new()), authenticator, probe);
//!
//! vault.store("session_token", b"abc123")?;
//! let token = vault.retrieve("session_token").await?;
//! assert_eq!(token, b"abc123");
//! ```
//!
//! # Known limitations
//!
//! The cipher is unauthenticated CBC. A party that can submit modified
//! envelopes and observe whether decryption fails has a padding oracle.
//! Callers that need integrity must authenticate envelopes themselves.

pub mod auth;
pub mod backend;
pub mod config;
pub mod crypto;
pub mod error;
pub mod file_backend;
pub mod policy;
pub mod trust;
pub mod vault;

// Re-export the most commonly used types at the crate root for convenience.
pub use auth::{AuthError, Authenticator};
pub use backend::{MemoryBackend, SecureBackend, Status};
pub use config::VaultConfig;
pub use crypto::{CipherEnvelope, RandomSource, SystemRandomSource};
pub use error::{PublicError, Result, VaultError};
pub use file_backend::FileBackend;
pub use policy::{
    AccessPolicy, AuthenticationRequirement, BiometricCapability, BiometricKind, CapabilityProbe,
    PromptText, SecurityLevel,
};
pub use trust::{FindingKind, IntegrityCheck, TrustSettings, TrustVerdict, TrustVerifier};
pub use vault::{CredentialVault, DeviceCapabilities};
