//! The credential vault.
//!
//! [`CredentialVault`] orchestrates one request at a time:
//!
//! 1. **Guard**: a fresh [`TrustVerdict`] is computed. If the device is not
//!    trusted the call fails with [`VaultError::IntegrityViolation`] before
//!    anything else happens, including argument validation.
//! 2. **Dispatch** to the injected [`SecureBackend`]: `store` replaces any
//!    prior value (delete, then add under the deployment [`AccessPolicy`]);
//!    `retrieve` first wins an [`Authenticator`] challenge; `delete` and
//!    `clear_all` treat a missing item as success.
//!
//! The vault holds no mutable state. Concurrent calls for the same identifier
//! race at the backend and the last writer wins.
//!
//! # Example
//!
//! ```rust,ignore
//! let vault = CredentialVault::new(backend, authenticator, probe)
//!     .with_config(VaultConfig::load(&path)?);
//!
//! vault.store("session_token", b"abc123")?;
//! let token = vault.retrieve("session_token").await?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::auth::Authenticator;
use crate::backend::{SecureBackend, Status};
use crate::config::VaultConfig;
use crate::crypto;
use crate::error::{Result, VaultError};
use crate::policy::{self, AccessPolicy, BiometricKind, CapabilityProbe, SecurityLevel};
use crate::trust::{IntegrityCheck, SystemHost, TrustVerdict, TrustVerifier};

/// What the device can do, reported by [`CredentialVault::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    /// An enrolled biometric can be evaluated right now.
    pub biometric_available: bool,
    /// The biometric modality prompts will name.
    pub modality: BiometricKind,
    pub secure_enclave_available: bool,
    pub security_level: SecurityLevel,
}

/// Guarded secret storage over injected platform capabilities.
pub struct CredentialVault {
    backend: Arc<dyn SecureBackend>,
    authenticator: Arc<dyn Authenticator>,
    probe: Arc<dyn CapabilityProbe>,
    /// `None` means the real host, checked with the config's trust settings.
    integrity: Option<Arc<dyn IntegrityCheck>>,
    config: VaultConfig,
}

impl CredentialVault {
    pub fn new(
        backend: Arc<dyn SecureBackend>,
        authenticator: Arc<dyn Authenticator>,
        probe: Arc<dyn CapabilityProbe>,
    ) -> Self {
        Self {
            backend,
            authenticator,
            probe,
            integrity: None,
            config: VaultConfig::default(),
        }
    }

    /// Replace the host trust verifier with another verdict source.
    pub fn with_integrity_check(mut self, check: Arc<dyn IntegrityCheck>) -> Self {
        self.integrity = Some(check);
        self
    }

    pub fn with_config(mut self, config: VaultConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// The policy every secret is stored under.
    pub fn policy(&self) -> AccessPolicy {
        AccessPolicy::for_deployment(self.config.scope.clone())
    }

    /// Compute a fresh verdict. Never cached.
    pub fn verify_trust(&self) -> TrustVerdict {
        match &self.integrity {
            Some(check) => check.verify(),
            None => TrustVerifier::new(SystemHost, self.config.trust_settings()).verify(),
        }
    }

    fn guard(&self, operation: &'static str) -> Result<()> {
        let verdict = self.verify_trust();
        if verdict.trusted {
            return Ok(());
        }
        warn!(
            operation,
            findings = verdict.reasons.len(),
            "refusing operation on untrusted device"
        );
        Err(VaultError::IntegrityViolation {
            findings: verdict.reasons,
        })
    }

    // -- Operations ---------------------------------------------------------

    /// Report the device's authentication capabilities.
    pub fn initialize(&self) -> Result<DeviceCapabilities> {
        self.guard("initialize")?;

        let probe = self.probe.as_ref();
        let capability = policy::current_capability(probe);
        let capabilities = DeviceCapabilities {
            biometric_available: capability.available,
            modality: policy::prompt_modality(probe),
            secure_enclave_available: probe.secure_hardware_available(),
            security_level: policy::security_level(probe),
        };

        info!(
            biometric_available = capabilities.biometric_available,
            modality = %capabilities.modality,
            security_level = %capabilities.security_level,
            "vault initialized"
        );
        Ok(capabilities)
    }

    /// Store `payload` under `identifier`, replacing any prior value.
    pub fn store(&self, identifier: &str, payload: &[u8]) -> Result<()> {
        self.guard("store")?;
        require_identifier(identifier)?;
        require_payload(payload)?;
        self.store_unguarded(identifier, payload)
    }

    /// Authenticate the user, then return the stored bytes unchanged.
    pub async fn retrieve(&self, identifier: &str) -> Result<Vec<u8>> {
        self.guard("retrieve")?;
        require_identifier(identifier)?;
        self.retrieve_unguarded(identifier).await
    }

    /// Remove `identifier`. Removing a missing item succeeds.
    pub fn delete(&self, identifier: &str) -> Result<()> {
        self.guard("delete")?;
        require_identifier(identifier)?;

        match self.backend.delete(identifier) {
            Status::Success | Status::NotFound => {
                info!(identifier, "secret deleted");
                Ok(())
            }
            Status::Failure(code) => Err(VaultError::BackendError { code }),
        }
    }

    /// Remove every secret in the configured scope.
    pub fn clear_all(&self) -> Result<()> {
        self.guard("clear_all")?;

        let scope = self.config.scope.as_deref();
        match self.backend.delete_all(scope) {
            Status::Success | Status::NotFound => {
                info!(scope = scope.unwrap_or("*"), "vault cleared");
                Ok(())
            }
            Status::Failure(code) => Err(VaultError::BackendError { code }),
        }
    }

    /// Encrypt `payload` under `key`, then store the envelope.
    pub fn store_sealed(&self, identifier: &str, payload: &[u8], key: &[u8]) -> Result<()> {
        self.guard("store_sealed")?;
        require_identifier(identifier)?;
        require_payload(payload)?;
        crypto::validate_key(key)?;

        let envelope = crypto::encrypt(payload, key)?;
        self.store_unguarded(identifier, &envelope.into_bytes())
    }

    /// Retrieve an envelope written by [`store_sealed`](Self::store_sealed)
    /// and decrypt it.
    pub async fn retrieve_sealed(&self, identifier: &str, key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        self.guard("retrieve_sealed")?;
        require_identifier(identifier)?;
        crypto::validate_key(key)?;

        let envelope = Zeroizing::new(self.retrieve_unguarded(identifier).await?);
        crypto::decrypt(&envelope, key)
    }

    // -- Internals ----------------------------------------------------------

    fn store_unguarded(&self, identifier: &str, payload: &[u8]) -> Result<()> {
        let policy = self.policy();

        // Replace semantics: the outcome of the pre-delete does not matter.
        let cleared = self.backend.delete(identifier);
        debug!(identifier, status = %cleared, "cleared previous value");

        match self.backend.add(identifier, payload, &policy) {
            Status::Success => {
                info!(identifier, requirement = %policy.requirement, "secret stored");
                Ok(())
            }
            status => Err(VaultError::BackendError {
                code: status.code(),
            }),
        }
    }

    async fn retrieve_unguarded(&self, identifier: &str) -> Result<Vec<u8>> {
        let modality = policy::prompt_modality(self.probe.as_ref());
        let prompt = self.config.prompts.select(modality);

        if let Err(e) = self.authenticator.challenge(prompt).await {
            info!(identifier, reason = %e, "authentication did not succeed");
            return Err(VaultError::AuthenticationFailed {
                reason: e.to_string(),
            });
        }

        match self.backend.query(identifier) {
            (Status::Success, Some(payload)) => {
                info!(identifier, "secret retrieved");
                Ok(payload)
            }
            (Status::Success, None) => Err(VaultError::BackendError {
                code: Status::Success.code(),
            }),
            (Status::NotFound, _) => Err(VaultError::NotFound {
                identifier: identifier.to_string(),
            }),
            (Status::Failure(code), _) => Err(VaultError::BackendError { code }),
        }
    }
}

fn require_identifier(identifier: &str) -> Result<()> {
    if identifier.is_empty() {
        return Err(VaultError::InvalidArgument {
            reason: "identifier must not be empty".into(),
        });
    }
    Ok(())
}

fn require_payload(payload: &[u8]) -> Result<()> {
    if payload.is_empty() {
        return Err(VaultError::InvalidArgument {
            reason: "payload must not be empty".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
