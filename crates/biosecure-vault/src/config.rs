//! Vault configuration.
//!
//! [`VaultConfig`] holds the deployment-level settings: the access group
//! secrets are stored under, the service name used by backends, the prompt
//! copy, and additions to the trust verifier's lists. Defaults come from the
//! [`Default`] implementation; a TOML file and the `BIOSECURE_SCOPE`
//! environment variable can override them.
//!
//! ```toml
//! scope = "team.example.shared"
//! service = "com.example.wallet"
//!
//! [prompts]
//! face = "Look at your phone to unlock your wallet"
//!
//! [trust]
//! extra_tamper_paths = ["/usr/libexec/cydia"]
//! extra_instrumentation_names = ["objection"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, VaultError};
use crate::policy::PromptText;
use crate::trust::TrustSettings;

/// Environment variable that overrides [`VaultConfig::scope`].
pub const SCOPE_ENV: &str = "BIOSECURE_SCOPE";

/// Default service name.
pub const DEFAULT_SERVICE: &str = "com.biosecure.vault";

/// Additions to the trust verifier's platform lists.
///
/// Entries can only be added; the built-in lists are always checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustOverrides {
    pub extra_tamper_paths: Vec<String>,
    pub extra_instrumentation_names: Vec<String>,
}

impl TrustOverrides {
    /// Platform defaults extended with these additions.
    pub fn settings(&self) -> TrustSettings {
        TrustSettings::platform_default()
            .with_extra_tamper_paths(self.extra_tamper_paths.iter().cloned())
            .with_extra_instrumentation_names(self.extra_instrumentation_names.iter().cloned())
    }
}

/// Deployment settings for a [`CredentialVault`](crate::vault::CredentialVault).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Access group every secret is stored under.
    ///
    /// Default: none.
    pub scope: Option<String>,

    /// Service name backends file secrets under.
    ///
    /// Default: **`com.biosecure.vault`**.
    pub service: String,

    /// Prompt copy per biometric modality.
    pub prompts: PromptText,

    pub trust: TrustOverrides,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            scope: None,
            service: DEFAULT_SERVICE.to_string(),
            prompts: PromptText::default(),
            trust: TrustOverrides::default(),
        }
    }
}

impl VaultConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML file, then apply environment overrides.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config = Self::from_toml(&content)?;
            info!(path = %path.display(), "vault configuration loaded");
            config
        } else {
            warn!(path = %path.display(), "configuration file does not exist, using defaults");
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| VaultError::Config {
            reason: format!("failed to parse TOML config: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(scope) = lookup(SCOPE_ENV) {
            let scope = scope.trim();
            self.scope = (!scope.is_empty()).then(|| scope.to_string());
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.service.trim().is_empty() {
            return Err(VaultError::Config {
                reason: "service must not be empty".into(),
            });
        }
        if self.service.contains(['/', '\\']) || self.service.starts_with('.') {
            return Err(VaultError::Config {
                reason: "service must be a single path component".into(),
            });
        }
        if self.scope.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(VaultError::Config {
                reason: "scope must not be blank".into(),
            });
        }
        Ok(())
    }

    /// Trust settings for the build target with this config's additions.
    pub fn trust_settings(&self) -> TrustSettings {
        self.trust.settings()
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    pub fn with_prompts(mut self, prompts: PromptText) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_trust_overrides(mut self, trust: TrustOverrides) -> Self {
        self.trust = trust;
        self
    }
}
