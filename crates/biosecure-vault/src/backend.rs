//! Secure storage backend capability.
//!
//! The vault never touches storage directly. It drives a [`SecureBackend`],
//! which owns at-rest protection and reports outcomes as a platform-style
//! [`Status`] rather than an error, so the vault decides which outcomes are
//! failures (a missing item is success for delete, an error for retrieve).
//!
//! [`MemoryBackend`] keeps everything in a process-local map. It is used by
//! tests and by embedders that supply their own persistence.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::policy::AccessPolicy;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Outcome of a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    NotFound,
    /// Opaque platform status code.
    Failure(i32),
}

impl Status {
    /// Platform code reported for a missing item.
    pub const NOT_FOUND_CODE: i32 = -25300;

    /// Platform code reported when adding an item that already exists.
    pub const DUPLICATE_ITEM_CODE: i32 = -25299;

    /// Platform code reported for an internal backend fault.
    pub const INTERNAL_CODE: i32 = -26276;

    /// Platform code reported when the item's access control cannot be
    /// satisfied, e.g. a passcode-only item on a device without a passcode.
    pub const AUTH_FAILED_CODE: i32 = -25293;

    pub fn code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::NotFound => Self::NOT_FOUND_CODE,
            Self::Failure(code) => *code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::NotFound => f.write_str("not_found"),
            Self::Failure(code) => write!(f, "failure({code})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// OS-provided at-rest storage for small secrets.
pub trait SecureBackend: Send + Sync {
    /// Add a new item. Reports a failure if `identifier` already exists.
    fn add(&self, identifier: &str, payload: &[u8], policy: &AccessPolicy) -> Status;

    /// Look up exactly one item.
    fn query(&self, identifier: &str) -> (Status, Option<Vec<u8>>);

    fn delete(&self, identifier: &str) -> Status;

    /// Delete every item in `scope`, or every item when `scope` is `None`.
    /// Reports [`Status::NotFound`] when nothing matched.
    fn delete_all(&self, scope: Option<&str>) -> Status;
}

// ---------------------------------------------------------------------------
// MemoryBackend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Item {
    payload: Vec<u8>,
    policy: AccessPolicy,
}

/// Process-local backend over a `RwLock<HashMap>`.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    items: RwLock<HashMap<String, Item>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The policy attached to `identifier`, if stored.
    pub fn policy_of(&self, identifier: &str) -> Option<AccessPolicy> {
        self.items
            .read()
            .ok()
            .and_then(|items| items.get(identifier).map(|item| item.policy.clone()))
    }
}

impl SecureBackend for MemoryBackend {
    fn add(&self, identifier: &str, payload: &[u8], policy: &AccessPolicy) -> Status {
        let Ok(mut items) = self.items.write() else {
            return Status::Failure(Status::INTERNAL_CODE);
        };
        if items.contains_key(identifier) {
            return Status::Failure(Status::DUPLICATE_ITEM_CODE);
        }
        items.insert(
            identifier.to_string(),
            Item {
                payload: payload.to_vec(),
                policy: policy.clone(),
            },
        );
        Status::Success
    }

    fn query(&self, identifier: &str) -> (Status, Option<Vec<u8>>) {
        let Ok(items) = self.items.read() else {
            return (Status::Failure(Status::INTERNAL_CODE), None);
        };
        match items.get(identifier) {
            Some(item) => (Status::Success, Some(item.payload.clone())),
            None => (Status::NotFound, None),
        }
    }

    fn delete(&self, identifier: &str) -> Status {
        let Ok(mut items) = self.items.write() else {
            return Status::Failure(Status::INTERNAL_CODE);
        };
        match items.remove(identifier) {
            Some(_) => Status::Success,
            None => Status::NotFound,
        }
    }

    fn delete_all(&self, scope: Option<&str>) -> Status {
        let Ok(mut items) = self.items.write() else {
            return Status::Failure(Status::INTERNAL_CODE);
        };
        let before = items.len();
        match scope {
            None => items.clear(),
            Some(scope) => items.retain(|_, item| item.policy.scope.as_deref() != Some(scope)),
        }
        if items.len() == before {
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

    fn policy(scope: Option<&str>) -> AccessPolicy {
        AccessPolicy::for_deployment(scope.map(str::to_string))
    }

    #[test]
    fn add_then_query() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.add("k", b"v", &policy(None)), Status::Success);

        let (status, payload) = backend.query("k");
        assert_eq!(status, Status::Success);
        assert_eq!(payload.as_deref(), Some(&b"v"[..]));
        assert_eq!(backend.policy_of("k"), Some(policy(None)));
    }

    #[test]
    fn duplicate_add_fails() {
        let backend = MemoryBackend::new();
        backend.add("k", b"v1", &policy(None));

        let status = backend.add("k", b"v2", &policy(None));
        assert_eq!(status, Status::Failure(Status::DUPLICATE_ITEM_CODE));
        assert_eq!(backend.query("k").1.as_deref(), Some(&b"v1"[..]));
    }

    #[test]
    fn missing_item_reports_not_found() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.query("nope"), (Status::NotFound, None));
        assert_eq!(backend.delete("nope"), Status::NotFound);
    }

    #[test]
    fn delete_all_respects_scope() {
        let backend = MemoryBackend::new();
        backend.add("a", b"1", &policy(Some("group.one")));
        backend.add("b", b"2", &policy(Some("group.two")));
        backend.add("c", b"3", &policy(None));

        assert_eq!(backend.delete_all(Some("group.one")), Status::Success);
        assert_eq!(backend.len(), 2);
        assert_eq!(backend.delete_all(Some("group.one")), Status::NotFound);

        assert_eq!(backend.delete_all(None), Status::Success);
        assert!(backend.is_empty());
        assert_eq!(backend.delete_all(None), Status::NotFound);
    }

    #[test]
    fn status_codes() {
        assert_eq!(Status::Success.code(), 0);
        assert_eq!(Status::NotFound.code(), -25300);
        assert_eq!(Status::Failure(-34018).code(), -34018);
        assert_eq!(Status::Failure(7).to_string(), "failure(7)");
        assert!(!Status::NotFound.is_success());
    }
}
