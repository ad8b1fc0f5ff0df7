//! Encrypted file-based secure backend.
//!
//! Desktop hosts have no keychain with biometric access control, so the CLI
//! persists secrets through [`FileBackend`]. Each secret is one record file:
//!
//! ```text
//! <dir>/<hex(sha256(identifier))>.item
//! ```
//!
//! The record (identifier, policy, payload, timestamp) is serialized as JSON
//! and sealed into a [`CipherEnvelope`](crate::crypto::CipherEnvelope) under
//! the backend key. File names never reveal identifiers.
//!
//! # Security Notes
//!
//! - [`FileBackend::open`] derives its key from machine data (hostname,
//!   username) and an application salt. Anyone with access to the same
//!   account on the same machine can reconstruct it. Biometric enrollment
//!   is recorded but not enforced; reads are gated by the vault's
//!   authenticator.
//! - With a device probe attached ([`FileBackend::with_device_probe`]), an
//!   add whose policy requires a passcode is refused with
//!   [`Status::AUTH_FAILED_CODE`] while the device has none. Without a probe
//!   the requirement is recorded only.
//! - Record files are written through a unique temporary file (mode 0600 on
//!   Unix) and renamed into place, so concurrent writers never share a
//!   partial file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ring::digest;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::backend::{SecureBackend, Status};
use crate::crypto;
use crate::error::Result;
use crate::policy::{AccessPolicy, CapabilityProbe};

/// Application salt mixed into the device-derived key. Changing this
/// invalidates every existing record.
const APP_SALT: &[u8; crypto::SALT_LEN] = b"biosecure-vault-file-backend-v1\x00";

const RECORD_EXTENSION: &str = "item";

/// Platform code for an I/O failure (`errSecIO`).
pub const IO_ERROR_CODE: i32 = -36;

/// Platform code for a record that cannot be decoded (`errSecDecode`).
pub const DECODE_ERROR_CODE: i32 = -26275;

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    identifier: String,
    policy: AccessPolicy,
    payload: Vec<u8>,
    stored_at: DateTime<Utc>,
}

/// Secure backend storing one encrypted file per secret.
pub struct FileBackend {
    dir: PathBuf,
    key: Zeroizing<[u8; crypto::KEY_LEN]>,
    device: Option<Arc<dyn CapabilityProbe>>,
}

impl std::fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackend")
            .field("dir", &self.dir)
            .field("device_probe", &self.device.is_some())
            .finish_non_exhaustive()
    }
}

impl FileBackend {
    /// Open a backend in `dir` keyed by the device-derived key.
    ///
    /// The directory is created if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let mut key = Zeroizing::new([0u8; crypto::KEY_LEN]);
        Self::derive_device_key(&mut key);
        Self::with_key(dir, &key[..])
    }

    /// Open a backend in `dir` with an explicit 256-bit key.
    pub fn with_key(dir: impl Into<PathBuf>, key: &[u8]) -> Result<Self> {
        crypto::validate_key(key)?;
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let mut owned = Zeroizing::new([0u8; crypto::KEY_LEN]);
        owned.copy_from_slice(key);

        tracing::debug!(dir = %dir.display(), "opened file backend");
        Ok(Self {
            dir,
            key: owned,
            device: None,
        })
    }

    /// Refuse passcode-protected adds while `probe` reports no passcode.
    pub fn with_device_probe(mut self, probe: Arc<dyn CapabilityProbe>) -> Self {
        self.device = Some(probe);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record file for `identifier`.
    pub fn record_path(&self, identifier: &str) -> PathBuf {
        let hash = digest::digest(&digest::SHA256, identifier.as_bytes());
        let name: String = hash
            .as_ref()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        self.dir.join(format!("{name}.{RECORD_EXTENSION}"))
    }

    /// Combine hostname, username and the application salt into a 256-bit
    /// key that is stable per machine/user.
    fn derive_device_key(out: &mut [u8; crypto::KEY_LEN]) {
        let hostname = Self::hostname();
        let username = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown-user".into());

        let mut material = Zeroizing::new(Vec::with_capacity(
            hostname.len() + username.len() + APP_SALT.len(),
        ));
        material.extend_from_slice(hostname.as_bytes());
        material.extend_from_slice(username.as_bytes());
        material.extend_from_slice(APP_SALT);

        crypto::derive_key_with_salt(&material, APP_SALT, out);
    }

    fn hostname() -> String {
        #[cfg(unix)]
        {
            std::fs::read_to_string("/etc/hostname")
                .map(|s| s.trim().to_string())
                .or_else(|_| std::env::var("HOSTNAME"))
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown-host".into())
        }

        #[cfg(not(unix))]
        {
            std::env::var("COMPUTERNAME")
                .or_else(|_| std::env::var("HOSTNAME"))
                .unwrap_or_else(|_| "unknown-host".into())
        }
    }

    fn seal(&self, record: &Record) -> Result<Vec<u8>> {
        let plaintext = Zeroizing::new(serde_json::to_vec(record)?);
        Ok(crypto::encrypt(&plaintext, &self.key[..])?.into_bytes())
    }

    fn open_record(&self, path: &Path) -> std::result::Result<Record, Status> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(Status::NotFound),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to read record");
                return Err(Status::Failure(IO_ERROR_CODE));
            }
        };

        let plaintext = crypto::decrypt(&data, &self.key[..]).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "failed to unseal record");
            Status::Failure(DECODE_ERROR_CODE)
        })?;

        serde_json::from_slice(&plaintext).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "failed to decode record");
            Status::Failure(DECODE_ERROR_CODE)
        })
    }

    /// Write `data` to a fresh owner-only temp file in the backend directory,
    /// then rename it over `path`. The temp file is removed on any failure.
    fn write_record(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn passcode_missing(&self, policy: &AccessPolicy) -> bool {
        policy.passcode_required
            && self
                .device
                .as_ref()
                .is_some_and(|probe| !probe.can_evaluate_device_owner_auth())
    }

    fn record_files(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

impl SecureBackend for FileBackend {
    fn add(&self, identifier: &str, payload: &[u8], policy: &AccessPolicy) -> Status {
        let path = self.record_path(identifier);
        if path.exists() {
            return Status::Failure(Status::DUPLICATE_ITEM_CODE);
        }
        if self.passcode_missing(policy) {
            tracing::warn!("refusing passcode-protected add: no device passcode");
            return Status::Failure(Status::AUTH_FAILED_CODE);
        }

        let record = Record {
            identifier: identifier.to_string(),
            policy: policy.clone(),
            payload: payload.to_vec(),
            stored_at: Utc::now(),
        };
        let sealed = match self.seal(&record) {
            Ok(sealed) => sealed,
            Err(e) => {
                tracing::error!(error = %e, "failed to seal record");
                return Status::Failure(Status::INTERNAL_CODE);
            }
        };

        match self.write_record(&path, &sealed) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "record written");
                Status::Success
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to write record");
                Status::Failure(IO_ERROR_CODE)
            }
        }
    }

    fn query(&self, identifier: &str) -> (Status, Option<Vec<u8>>) {
        match self.open_record(&self.record_path(identifier)) {
            // A hash collision or a swapped file is reported as a missing item.
            Ok(record) if record.identifier != identifier => (Status::NotFound, None),
            Ok(record) => (Status::Success, Some(record.payload)),
            Err(status) => (status, None),
        }
    }

    fn delete(&self, identifier: &str) -> Status {
        let path = self.record_path(identifier);
        match std::fs::remove_file(&path) {
            Ok(()) => Status::Success,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Status::NotFound,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to delete record");
                Status::Failure(IO_ERROR_CODE)
            }
        }
    }

    fn delete_all(&self, scope: Option<&str>) -> Status {
        let files = match self.record_files() {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(dir = %self.dir.display(), error = %e, "failed to list records");
                return Status::Failure(IO_ERROR_CODE);
            }
        };

        let mut removed = 0usize;
        for path in files {
            if let Some(scope) = scope {
                match self.open_record(&path) {
                    Ok(record) if record.policy.scope.as_deref() == Some(scope) => {}
                    Ok(_) => continue,
                    Err(status) => {
                        tracing::warn!(path = %path.display(), %status, "skipping unreadable record");
                        continue;
                    }
                }
            }

            if let Err(e) = std::fs::remove_file(&path) {
                tracing::error!(path = %path.display(), error = %e, "failed to delete record");
                return Status::Failure(IO_ERROR_CODE);
            }
            removed += 1;
        }

        tracing::debug!(removed, scope = scope.unwrap_or("*"), "records cleared");
        if removed == 0 {
            Status::NotFound
        } else {
            Status::Success
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; crypto::KEY_LEN] = [7u8; crypto::KEY_LEN];

    fn backend(dir: &Path) -> FileBackend {
        FileBackend::with_key(dir.join("items"), &KEY).unwrap()
    }

    fn policy(scope: Option<&str>) -> AccessPolicy {
        AccessPolicy::for_deployment(scope.map(str::to_string))
    }

    #[test]
    fn add_query_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = backend(tmp.path());

        assert_eq!(backend.add("session_token", b"abc123", &policy(None)), Status::Success);
        let (status, payload) = backend.query("session_token");
        assert_eq!(status, Status::Success);
        assert_eq!(payload.as_deref(), Some(&b"abc123"[..]));
    }

    #[test]
    fn record_file_hides_identifier_and_payload() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = backend(tmp.path());
        backend.add("session_token", b"abc123", &policy(None));

        let path = backend.record_path("session_token");
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(!name.contains("session"));
        assert!(name.ends_with(".item"));

        let raw = std::fs::read(&path).unwrap();
        assert!(!raw.windows(6).any(|w| w == b"abc123"));
    }

    #[cfg(unix)]
    #[test]
    fn record_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let backend = backend(tmp.path());
        backend.add("k", b"v", &policy(None));

        let mode = std::fs::metadata(backend.record_path("k"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn duplicate_add_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = backend(tmp.path());
        backend.add("k", b"v1", &policy(None));

        assert_eq!(
            backend.add("k", b"v2", &policy(None)),
            Status::Failure(Status::DUPLICATE_ITEM_CODE)
        );
    }

    #[test]
    fn missing_item_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = backend(tmp.path());

        assert_eq!(backend.query("missing_key"), (Status::NotFound, None));
        assert_eq!(backend.delete("missing_key"), Status::NotFound);
        assert_eq!(backend.delete_all(None), Status::NotFound);
    }

    #[test]
    fn wrong_key_reports_decode_failure() {
        let tmp = tempfile::tempdir().unwrap();
        backend(tmp.path()).add("k", b"v", &policy(None));

        let other = FileBackend::with_key(tmp.path().join("items"), &[9u8; 32]).unwrap();
        let (status, payload) = other.query("k");
        assert!(payload.is_none());
        assert!(matches!(status, Status::Failure(_) | Status::NotFound));
        assert_ne!(status, Status::Success);
    }

    #[test]
    fn delete_all_by_scope() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = backend(tmp.path());
        backend.add("a", b"1", &policy(Some("group.one")));
        backend.add("b", b"2", &policy(Some("group.two")));

        assert_eq!(backend.delete_all(Some("group.one")), Status::Success);
        assert_eq!(backend.query("a").0, Status::NotFound);
        assert_eq!(backend.query("b").0, Status::Success);

        assert_eq!(backend.delete_all(None), Status::Success);
        assert_eq!(backend.query("b").0, Status::NotFound);
    }

    #[test]
    fn persists_across_instances() {
        let tmp = tempfile::tempdir().unwrap();
        backend(tmp.path()).add("k", b"persisted", &policy(None));

        let reopened = backend(tmp.path());
        assert_eq!(reopened.query("k").1.as_deref(), Some(&b"persisted"[..]));
    }

    #[test]
    fn rejects_short_key() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(FileBackend::with_key(tmp.path(), &[0u8; 16]).is_err());
    }

    #[test]
    fn debug_omits_key() {
        let tmp = tempfile::tempdir().unwrap();
        let rendered = format!("{:?}", backend(tmp.path()));
        assert!(rendered.contains("FileBackend"));
        assert!(!rendered.contains("7, 7"));
    }

    struct Passcode(bool);

    impl CapabilityProbe for Passcode {
        fn can_evaluate_device_owner_auth(&self) -> bool {
            self.0
        }

        fn enrolled_biometric_modality(&self) -> crate::policy::BiometricKind {
            crate::policy::BiometricKind::None
        }
    }

    #[test]
    fn add_refused_without_device_passcode() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = backend(tmp.path()).with_device_probe(Arc::new(Passcode(false)));

        assert_eq!(
            backend.add("k", b"v", &policy(None)),
            Status::Failure(Status::AUTH_FAILED_CODE)
        );
        assert_eq!(backend.query("k").0, Status::NotFound);
    }

    #[test]
    fn add_allowed_with_device_passcode() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = backend(tmp.path()).with_device_probe(Arc::new(Passcode(true)));

        assert_eq!(backend.add("k", b"v", &policy(None)), Status::Success);
    }

    #[test]
    fn concurrent_replacements_never_fail_on_io() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = Arc::new(backend(tmp.path()));

        let handles: Vec<_> = (0..4u8)
            .map(|n| {
                let backend = Arc::clone(&backend);
                std::thread::spawn(move || {
                    let value = [b'a' + n];
                    for _ in 0..50 {
                        backend.delete("shared");
                        let status = backend.add("shared", &value, &policy(None));
                        assert!(
                            matches!(
                                status,
                                Status::Success | Status::Failure(Status::DUPLICATE_ITEM_CODE)
                            ),
                            "unexpected status {status}"
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        if let (Status::Success, Some(payload)) = backend.query("shared") {
            assert_eq!(payload.len(), 1);
            assert!((b'a'..=b'd').contains(&payload[0]));
        }

        let leftovers: Vec<_> = std::fs::read_dir(backend.dir())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION))
            .collect();
        assert!(leftovers.is_empty(), "temporary files left behind: {leftovers:?}");
    }
}
