//! Capability probe for desktop hosts.
//!
//! A desktop host has no biometric sensor the vault can use. Device-owner
//! authentication is evaluable once a passcode has been set with
//! `biosecure passcode set`.

use std::path::PathBuf;

use biosecure_vault::{BiometricKind, CapabilityProbe};

use crate::passcode::passcode_is_set;

pub struct HostProbe {
    passcode_path: PathBuf,
}

impl HostProbe {
    pub fn new(passcode_path: impl Into<PathBuf>) -> Self {
        Self {
            passcode_path: passcode_path.into(),
        }
    }
}

impl CapabilityProbe for HostProbe {
    fn can_evaluate_device_owner_auth(&self) -> bool {
        passcode_is_set(&self.passcode_path)
    }

    fn enrolled_biometric_modality(&self) -> BiometricKind {
        BiometricKind::None
    }
}
