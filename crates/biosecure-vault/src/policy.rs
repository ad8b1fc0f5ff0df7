//! Access policy and device capability.
//!
//! Every secret is stored under the same fixed policy: it may only be read
//! after a biometric match against the *currently enrolled* biometry, on a
//! device that has a passcode set, and it never synchronizes off the device.
//! There is no per-secret override.
//!
//! Whether the device can satisfy that policy right now is answered by a
//! [`CapabilityProbe`], whose implementation varies per build target. The
//! functions in this module turn probe answers into [`BiometricCapability`],
//! [`SecurityLevel`] and the prompt copy shown during a challenge.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What authentication must succeed before a secret can be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationRequirement {
    None,
    /// Passcode or any enrolled biometric.
    DeviceOwnerAny,
    /// A biometric match against the enrollment set that existed when the
    /// secret was stored. Adding or removing a finger/face invalidates it.
    BiometricCurrentEnrollmentOnly,
}

impl AuthenticationRequirement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::DeviceOwnerAny => "device_owner_any",
            Self::BiometricCurrentEnrollmentOnly => "biometric_current_enrollment_only",
        }
    }
}

impl std::fmt::Display for AuthenticationRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access control attached to a secret at store time.
///
/// Immutable once attached: a later store replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub requirement: AuthenticationRequirement,
    /// The secret is only accessible while a device passcode is set.
    pub passcode_required: bool,
    /// Always `false`: secrets never leave the device.
    pub synchronizable: bool,
    /// Optional access group the secret belongs to.
    pub scope: Option<String>,
}

impl AccessPolicy {
    /// The single policy every secret in this deployment is stored under.
    pub fn for_deployment(scope: Option<String>) -> Self {
        Self {
            requirement: AuthenticationRequirement::BiometricCurrentEnrollmentOnly,
            passcode_required: true,
            synchronizable: false,
            scope,
        }
    }
}

/// Requirement for a given secret. Fixed per deployment.
pub fn requirement_for(_identifier: &str) -> AuthenticationRequirement {
    AuthenticationRequirement::BiometricCurrentEnrollmentOnly
}

/// Biometric modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiometricKind {
    #[default]
    None,
    Fingerprint,
    Face,
}

impl BiometricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Fingerprint => "fingerprint",
            Self::Face => "face",
        }
    }
}

impl std::fmt::Display for BiometricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only snapshot of what biometric authentication can do right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiometricCapability {
    pub kind: BiometricKind,
    pub available: bool,
}

/// Coarse device security classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    None,
    Passcode,
    Fingerprint,
    Face,
}

impl SecurityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Passcode => "passcode",
            Self::Fingerprint => "fingerprint",
            Self::Face => "face",
        }
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Capability probe
// ---------------------------------------------------------------------------

/// Platform capability queries.
pub trait CapabilityProbe: Send + Sync {
    /// Whether device-owner authentication can be evaluated at all, i.e. a
    /// passcode is set.
    fn can_evaluate_device_owner_auth(&self) -> bool;

    /// The biometric modality that is enrolled and usable.
    fn enrolled_biometric_modality(&self) -> BiometricKind;

    /// The biometric sensor present, enrolled or not.
    fn biometry_type(&self) -> BiometricKind {
        self.enrolled_biometric_modality()
    }

    /// Whether a hardware-backed key store (secure enclave, TEE) exists.
    fn secure_hardware_available(&self) -> bool {
        false
    }
}

/// What biometric authentication can do right now.
///
/// Reflects evaluability: an un-enrolled sensor is never reported as
/// available.
pub fn current_capability(probe: &dyn CapabilityProbe) -> BiometricCapability {
    if !probe.can_evaluate_device_owner_auth() {
        return BiometricCapability {
            kind: BiometricKind::None,
            available: false,
        };
    }

    let kind = probe.enrolled_biometric_modality();
    BiometricCapability {
        kind,
        available: kind != BiometricKind::None,
    }
}

/// The modality to name in prompt copy.
///
/// Falls back to the sensor type when nothing is enrolled, so the prompt still
/// names the hardware the user will be asked to use.
pub fn prompt_modality(probe: &dyn CapabilityProbe) -> BiometricKind {
    match probe.enrolled_biometric_modality() {
        BiometricKind::None => probe.biometry_type(),
        kind => kind,
    }
}

pub fn security_level(probe: &dyn CapabilityProbe) -> SecurityLevel {
    if !probe.can_evaluate_device_owner_auth() {
        return SecurityLevel::None;
    }
    match probe.enrolled_biometric_modality() {
        BiometricKind::Face => SecurityLevel::Face,
        BiometricKind::Fingerprint => SecurityLevel::Fingerprint,
        BiometricKind::None => SecurityLevel::Passcode,
    }
}

/// `true` when at least a passcode protects the device.
pub fn is_device_secure(probe: &dyn CapabilityProbe) -> bool {
    security_level(probe) != SecurityLevel::None
}

// ---------------------------------------------------------------------------
// Prompt copy
// ---------------------------------------------------------------------------

/// Text shown by the authenticator, per modality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptText {
    pub face: String,
    pub fingerprint: String,
    pub generic: String,
}

impl Default for PromptText {
    fn default() -> Self {
        Self {
            face: "Authenticate with Face ID to access secure data".into(),
            fingerprint: "Authenticate with Touch ID to access secure data".into(),
            generic: "Authenticate to access secure data".into(),
        }
    }
}

impl PromptText {
    pub fn select(&self, kind: BiometricKind) -> &str {
        match kind {
            BiometricKind::Face => &self.face,
            BiometricKind::Fingerprint => &self.fingerprint,
            BiometricKind::None => &self.generic,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
