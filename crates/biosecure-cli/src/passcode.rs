//! Passcode authenticator for desktop hosts.
//!
//! Desktops have no biometric prompt the vault can drive, so `get` challenges
//! for a passcode instead. The passcode is never stored; only a PBKDF2 hash
//! and its salt are kept in `<data-dir>/passcode.json`.
//!
//! The passcode is read from `BIOSECURE_PASSCODE` when set (for scripting),
//! otherwise from stdin after printing the prompt to stderr. A replacement
//! passcode comes from `BIOSECURE_NEW_PASSCODE`, never from the variable
//! that answers the current-passcode challenge. Reading and
//! hashing run on a blocking thread so the challenge suspends the caller
//! without stalling the runtime.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use biosecure_vault::crypto::{self, SystemRandomSource};
use biosecure_vault::{AuthError, Authenticator};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::helpers::{decode, encode};

/// Environment variable holding the passcode for non-interactive use.
pub const PASSCODE_ENV: &str = "BIOSECURE_PASSCODE";

/// Environment variable holding the replacement passcode for `passcode set`.
pub const NEW_PASSCODE_ENV: &str = "BIOSECURE_NEW_PASSCODE";

const MIN_PASSCODE_LEN: usize = 4;

/// The stored passcode verifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PasscodeRecord {
    salt: String,
    hash: String,
}

/// Hash `passcode` and write the verifier to `path`.
pub fn set_passcode(path: &Path, passcode: &str) -> Result<()> {
    if passcode.chars().count() < MIN_PASSCODE_LEN {
        bail!("passcode must be at least {MIN_PASSCODE_LEN} characters");
    }

    let rng = SystemRandomSource::new();
    let (salt, hash) = crypto::derive_key_from_password(&rng, passcode.as_bytes())
        .context("failed to derive passcode hash")?;
    let record = PasscodeRecord {
        salt: encode(&salt),
        hash: encode(&hash[..]),
    };

    let json = serde_json::to_vec_pretty(&record)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!(path = %path.display(), "passcode set");
    Ok(())
}

pub fn passcode_is_set(path: &Path) -> bool {
    path.is_file()
}

/// Set or replace the passcode at `path`.
///
/// An existing passcode must first satisfy `current`. The replacement is
/// only requested once the challenge has passed.
pub async fn change_passcode<F>(
    path: &Path,
    current: &dyn Authenticator,
    new_passcode: F,
) -> Result<()>
where
    F: FnOnce() -> Result<Zeroizing<String>>,
{
    if passcode_is_set(path) {
        current
            .challenge("Enter the current passcode")
            .await
            .context("current passcode not accepted")?;
    }

    let passcode = new_passcode()?;
    set_passcode(path, &passcode)
}

/// The replacement passcode from `NEW_PASSCODE_ENV`, if provided.
pub fn new_passcode_from_env<F>(lookup: F) -> Option<Zeroizing<String>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(NEW_PASSCODE_ENV).map(Zeroizing::new)
}

/// Where the passcode comes from when challenged.
#[derive(Clone)]
enum Source {
    Env,
    #[cfg(test)]
    Fixed(Zeroizing<String>),
}

/// Challenges for the device passcode.
#[derive(Clone)]
pub struct PasscodeAuthenticator {
    path: PathBuf,
    source: Source,
}

impl PasscodeAuthenticator {
    /// Read the passcode from the environment or stdin on each challenge.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            source: Source::Env,
        }
    }

    /// Always answer challenges with `passcode`.
    #[cfg(test)]
    pub fn with_passcode(path: impl Into<PathBuf>, passcode: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: Source::Fixed(Zeroizing::new(passcode.into())),
        }
    }

    fn verify(path: &Path, source: &Source, prompt: &str) -> Result<(), AuthError> {
        let data = std::fs::read(path).map_err(|_| AuthError::Unavailable {
            reason: "no passcode set; run `biosecure passcode set`".into(),
        })?;
        let record: PasscodeRecord =
            serde_json::from_slice(&data).map_err(|e| AuthError::Unavailable {
                reason: format!("passcode file is corrupted: {e}"),
            })?;
        let (salt, hash) = match (decode(&record.salt), decode(&record.hash)) {
            (Ok(salt), Ok(hash)) => (salt, hash),
            _ => {
                return Err(AuthError::Unavailable {
                    reason: "passcode file is corrupted".into(),
                });
            }
        };

        let passcode = match source {
            #[cfg(test)]
            Source::Fixed(passcode) => passcode.clone(),
            Source::Env => read_passcode(prompt)?,
        };
        if passcode.is_empty() {
            return Err(AuthError::Cancelled);
        }

        if crypto::verify_password(passcode.as_bytes(), &salt, &hash) {
            Ok(())
        } else {
            Err(AuthError::Failed {
                reason: "passcode does not match".into(),
            })
        }
    }
}

fn read_passcode(prompt: &str) -> Result<Zeroizing<String>, AuthError> {
    if let Ok(passcode) = std::env::var(PASSCODE_ENV) {
        return Ok(Zeroizing::new(passcode));
    }

    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "{prompt}\npasscode: ");
    let _ = stderr.flush();

    let mut line = Zeroizing::new(String::new());
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| AuthError::Unavailable {
            reason: format!("failed to read passcode: {e}"),
        })?;
    Ok(Zeroizing::new(line.trim_end_matches(['\r', '\n']).to_string()))
}

#[async_trait]
impl Authenticator for PasscodeAuthenticator {
    async fn challenge(&self, prompt: &str) -> Result<(), AuthError> {
        let path = self.path.clone();
        let source = self.source.clone();
        let prompt = prompt.to_string();

        tokio::task::spawn_blocking(move || Self::verify(&path, &source, &prompt))
            .await
            .map_err(|e| AuthError::Unavailable {
                reason: format!("passcode task failed: {e}"),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn correct_passcode_passes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("passcode.json");
        set_passcode(&path, "2468").unwrap();
        assert!(passcode_is_set(&path));

        let auth = PasscodeAuthenticator::with_passcode(&path, "2468");
        assert_eq!(auth.challenge("unlock").await, Ok(()));

        let wrong = PasscodeAuthenticator::with_passcode(&path, "1357");
        assert!(matches!(
            wrong.challenge("unlock").await,
            Err(AuthError::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn missing_passcode_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let auth = PasscodeAuthenticator::with_passcode(tmp.path().join("none.json"), "2468");
        assert!(matches!(
            auth.challenge("unlock").await,
            Err(AuthError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn empty_answer_is_cancellation() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("passcode.json");
        set_passcode(&path, "2468").unwrap();

        let auth = PasscodeAuthenticator::with_passcode(&path, "");
        assert_eq!(auth.challenge("unlock").await, Err(AuthError::Cancelled));
    }

    #[test]
    fn short_passcode_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(set_passcode(&tmp.path().join("p.json"), "12").is_err());
    }

    #[test]
    fn stored_file_does_not_contain_passcode() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("passcode.json");
        set_passcode(&path, "hunter22").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("hunter22"));
    }

    #[tokio::test]
    async fn existing_passcode_can_be_replaced() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("passcode.json");
        set_passcode(&path, "1234").unwrap();

        let current = PasscodeAuthenticator::with_passcode(&path, "1234");
        change_passcode(&path, &current, || Ok(Zeroizing::new("5678".into())))
            .await
            .unwrap();

        let old = PasscodeAuthenticator::with_passcode(&path, "1234");
        assert!(matches!(
            old.challenge("unlock").await,
            Err(AuthError::Failed { .. })
        ));
        let new = PasscodeAuthenticator::with_passcode(&path, "5678");
        assert_eq!(new.challenge("unlock").await, Ok(()));
    }

    #[tokio::test]
    async fn replacement_requires_current_passcode() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("passcode.json");
        set_passcode(&path, "1234").unwrap();

        let wrong = PasscodeAuthenticator::with_passcode(&path, "0000");
        let asked = std::cell::Cell::new(false);
        let result = change_passcode(&path, &wrong, || {
            asked.set(true);
            Ok(Zeroizing::new("5678".into()))
        })
        .await;

        assert!(result.is_err());
        assert!(!asked.get());
        let current = PasscodeAuthenticator::with_passcode(&path, "1234");
        assert_eq!(current.challenge("unlock").await, Ok(()));
    }

    #[tokio::test]
    async fn first_passcode_needs_no_challenge() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("passcode.json");

        let unused = PasscodeAuthenticator::with_passcode(&path, "");
        change_passcode(&path, &unused, || Ok(Zeroizing::new("2468".into())))
            .await
            .unwrap();
        assert!(passcode_is_set(&path));
    }

    #[test]
    fn replacement_ignores_challenge_variable() {
        let lookup = |key: &str| match key {
            PASSCODE_ENV => Some("1234".to_string()),
            NEW_PASSCODE_ENV => Some("5678".to_string()),
            _ => None,
        };
        assert_eq!(new_passcode_from_env(lookup).as_deref().map(String::as_str), Some("5678"));

        let only_current = |key: &str| (key == PASSCODE_ENV).then(|| "1234".to_string());
        assert!(new_passcode_from_env(only_current).is_none());
    }
}
