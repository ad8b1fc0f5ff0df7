//! Device trust verifier.
//!
//! Inspects the running environment for signs that the OS-level access
//! control can no longer be relied on, and produces a [`TrustVerdict`] that
//! the vault checks before every sensitive operation.
//!
//! Three independent checks run on every call and their findings are
//! unioned:
//!
//! 1. **Tamper paths**: known jailbreak/root artifacts on disk, a canary
//!    write to a location the OS should refuse, and system directories that
//!    have been replaced by symbolic links.
//! 2. **Debug attach**: the process' own traced flag, and loader variables
//!    used for library injection.
//! 3. **Reverse-engineering tools**: instrumentation libraries that can be
//!    loaded, and their names in the process name or loaded image list.
//!
//! # Limits
//!
//! Every check is a heuristic. A compromise that hides its artifacts defeats
//! all three; the verdict is a deterrent, not a proof of integrity. Verdicts
//! are never cached because a debugger can attach between two calls.
//!
//! All environment access goes through the [`Host`] trait so the checks can
//! be exercised against a scripted host in tests.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A single kind of positive finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// A known jailbreak/root artifact exists on disk.
    TamperArtifact,
    /// A write to a protected location succeeded.
    ProtectedPathWritable,
    /// A protected top-level directory is a symbolic link.
    SymlinkedSystemDirectory,
    /// The process is being traced by a debugger.
    DebuggerAttached,
    /// A dynamic-loader injection variable is set.
    LoaderInjection,
    /// A known instrumentation library could be loaded.
    InstrumentationLibrary,
    /// The process name matches an instrumentation tool.
    SuspiciousProcessName,
    /// A loaded image matches an instrumentation tool.
    SuspiciousImageLoaded,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TamperArtifact => "tamper_artifact",
            Self::ProtectedPathWritable => "protected_path_writable",
            Self::SymlinkedSystemDirectory => "symlinked_system_directory",
            Self::DebuggerAttached => "debugger_attached",
            Self::LoaderInjection => "loader_injection",
            Self::InstrumentationLibrary => "instrumentation_library",
            Self::SuspiciousProcessName => "suspicious_process_name",
            Self::SuspiciousImageLoaded => "suspicious_image_loaded",
        }
    }
}

impl std::fmt::Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A positive finding together with what triggered it.
///
/// The detail is for operator logs only and never leaves the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub kind: FindingKind,
    pub detail: String,
}

impl Finding {
    fn new(kind: FindingKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Outcome of one trust verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustVerdict {
    /// `false` as soon as any single finding is present.
    pub trusted: bool,
    pub reasons: BTreeSet<FindingKind>,
}

impl TrustVerdict {
    /// A verdict with no findings.
    pub fn trusted() -> Self {
        Self {
            trusted: true,
            reasons: BTreeSet::new(),
        }
    }

    pub fn from_reasons(reasons: BTreeSet<FindingKind>) -> Self {
        Self {
            trusted: reasons.is_empty(),
            reasons,
        }
    }
}

/// Anything that can produce a fresh trust verdict.
pub trait IntegrityCheck: Send + Sync {
    fn verify(&self) -> TrustVerdict;
}

// ---------------------------------------------------------------------------
// Host access
// ---------------------------------------------------------------------------

/// Environment primitives the checks are built from.
pub trait Host: Send + Sync {
    fn path_exists(&self, path: &Path) -> bool;

    fn is_symlink(&self, path: &Path) -> bool;

    /// Try to create `path`. Returns `true` if the write succeeded; the file
    /// is removed again before returning.
    fn canary_write(&self, path: &Path) -> bool;

    /// Whether the current process has a tracer attached.
    fn is_traced(&self) -> bool;

    fn env_var_present(&self, name: &str) -> bool;

    /// Try to load a dynamic library by name. A successful load is unloaded
    /// again before returning.
    fn can_load_library(&self, name: &str) -> bool;

    fn process_name(&self) -> Option<String>;

    /// Paths or names of every dynamic image mapped into the process.
    fn loaded_images(&self) -> Vec<String>;
}

/// The real host, backed by the filesystem, procfs/sysctl and the dynamic
/// loader.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl Host for SystemHost {
    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_symlink(&self, path: &Path) -> bool {
        std::fs::symlink_metadata(path)
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(false)
    }

    fn canary_write(&self, path: &Path) -> bool {
        match std::fs::write(path, b"test") {
            Ok(()) => {
                let _ = std::fs::remove_file(path);
                true
            }
            Err(_) => false,
        }
    }

    fn is_traced(&self) -> bool {
        platform::is_traced()
    }

    fn env_var_present(&self, name: &str) -> bool {
        std::env::var_os(name).is_some()
    }

    fn can_load_library(&self, name: &str) -> bool {
        platform::can_load_library(name)
    }

    fn process_name(&self) -> Option<String> {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.file_name().map(|n| n.to_string_lossy().into_owned()))
    }

    fn loaded_images(&self) -> Vec<String> {
        platform::loaded_images()
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
mod platform {
    use std::collections::BTreeSet;

    pub fn is_traced() -> bool {
        let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
            return false;
        };
        tracer_pid(&status).is_some_and(|pid| pid != 0)
    }

    pub(super) fn tracer_pid(status: &str) -> Option<u32> {
        status
            .lines()
            .find_map(|line| line.strip_prefix("TracerPid:"))
            .and_then(|value| value.trim().parse().ok())
    }

    pub fn loaded_images() -> Vec<String> {
        std::fs::read_to_string("/proc/self/maps")
            .map(|maps| mapped_paths(&maps))
            .unwrap_or_default()
    }

    pub(super) fn mapped_paths(maps: &str) -> Vec<String> {
        let paths: BTreeSet<String> = maps
            .lines()
            .filter_map(|line| line.split_whitespace().nth(5))
            .filter(|path| path.starts_with('/'))
            .map(str::to_string)
            .collect();
        paths.into_iter().collect()
    }

    pub fn can_load_library(name: &str) -> bool {
        super::unix_loader::can_load_library(name)
    }
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod platform {
    use std::ffi::CStr;

    /// `P_TRACED` from `<sys/proc.h>`.
    const P_TRACED: i32 = 0x0000_0800;

    pub fn is_traced() -> bool {
        // SAFETY: `info` is a plain C struct sized by `size`; sysctl writes at
        // most `size` bytes into it.
        unsafe {
            let mut info: libc::kinfo_proc = std::mem::zeroed();
            let mut size = std::mem::size_of::<libc::kinfo_proc>();
            let mut mib = [
                libc::CTL_KERN,
                libc::KERN_PROC,
                libc::KERN_PROC_PID,
                libc::getpid(),
            ];
            let rc = libc::sysctl(
                mib.as_mut_ptr(),
                mib.len() as libc::c_uint,
                (&mut info as *mut libc::kinfo_proc).cast(),
                &mut size,
                std::ptr::null_mut(),
                0,
            );
            // A process table we cannot read is treated as hostile.
            rc != 0 || (info.kp_proc.p_flag & P_TRACED) != 0
        }
    }

    pub fn loaded_images() -> Vec<String> {
        // SAFETY: dyld returns NUL-terminated names that stay valid while the
        // image is loaded; null entries are skipped.
        unsafe {
            let count = libc::_dyld_image_count();
            (0..count)
                .filter_map(|index| {
                    let name = libc::_dyld_get_image_name(index);
                    (!name.is_null()).then(|| CStr::from_ptr(name).to_string_lossy().into_owned())
                })
                .collect()
        }
    }

    pub fn can_load_library(name: &str) -> bool {
        super::unix_loader::can_load_library(name)
    }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios"
)))]
mod platform {
    pub fn is_traced() -> bool {
        false
    }

    pub fn loaded_images() -> Vec<String> {
        Vec::new()
    }

    pub fn can_load_library(_name: &str) -> bool {
        false
    }
}

#[cfg(unix)]
mod unix_loader {
    use std::ffi::CString;

    pub fn can_load_library(name: &str) -> bool {
        let Ok(c_name) = CString::new(name) else {
            return false;
        };
        // SAFETY: `c_name` is a valid NUL-terminated string; a non-null
        // handle is closed before returning.
        unsafe {
            let handle = libc::dlopen(c_name.as_ptr(), libc::RTLD_LAZY);
            if handle.is_null() {
                return false;
            }
            libc::dlclose(handle);
            true
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[cfg(target_os = "ios")]
const TAMPER_PATHS: &[&str] = &[
    "/Applications/Cydia.app",
    "/Library/MobileSubstrate/MobileSubstrate.dylib",
    "/bin/bash",
    "/usr/sbin/sshd",
    "/etc/apt",
    "/private/var/lib/apt/",
    "/private/var/lib/cydia",
    "/private/var/stash",
    "/private/var/mobile/Library/SBSettings/Themes",
    "/private/var/tmp/cydia.log",
    "/Applications/FakeCarrier.app",
    "/Applications/Icy.app",
    "/Applications/IntelliScreen.app",
    "/Applications/MxTube.app",
    "/Applications/RockApp.app",
    "/Applications/SBSettings.app",
    "/Applications/WinterBoard.app",
];

#[cfg(target_os = "android")]
const TAMPER_PATHS: &[&str] = &[
    "/system/app/Superuser.apk",
    "/sbin/su",
    "/system/bin/su",
    "/system/xbin/su",
    "/data/local/xbin/su",
    "/data/local/bin/su",
    "/system/sd/xbin/su",
    "/system/bin/failsafe/su",
    "/data/local/su",
    "/su/bin/su",
    "/data/adb/magisk",
];

// Desktop hosts ship shells and sshd legitimately; no artifact list applies.
#[cfg(not(any(target_os = "ios", target_os = "android")))]
const TAMPER_PATHS: &[&str] = &[];

#[cfg(target_os = "ios")]
const CANARY_PATH: Option<&str> = Some("/private/jailbreak.txt");

#[cfg(target_os = "android")]
const CANARY_PATH: Option<&str> = Some("/system/.biosecure_canary");

#[cfg(not(any(target_os = "ios", target_os = "android")))]
const CANARY_PATH: Option<&str> = None;

#[cfg(target_os = "ios")]
const SYMLINK_SENTINELS: &[&str] = &["/Applications"];

#[cfg(not(target_os = "ios"))]
const SYMLINK_SENTINELS: &[&str] = &[];

const LOADER_VARIABLES: &[&str] = &[
    "DYLD_INSERT_LIBRARIES",
    "DYLD_FORCE_FLAT_NAMESPACE",
    "DYLD_IMAGE_SUFFIX",
    "LD_PRELOAD",
    "LD_AUDIT",
];

const INSTRUMENTATION_NAMES: &[&str] = &[
    "FridaGadget",
    "frida",
    "cynject",
    "libcycript",
    "cycript",
    "debugserver",
];

/// The lists each check runs against.
///
/// [`TrustSettings::platform_default`] picks the lists for the build target.
/// Configuration may only add entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustSettings {
    pub tamper_paths: Vec<String>,
    pub canary_path: Option<String>,
    pub symlink_sentinels: Vec<String>,
    pub loader_variables: Vec<String>,
    pub instrumentation_names: Vec<String>,
}

impl Default for TrustSettings {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl TrustSettings {
    pub fn platform_default() -> Self {
        fn owned(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        Self {
            tamper_paths: owned(TAMPER_PATHS),
            canary_path: CANARY_PATH.map(str::to_string),
            symlink_sentinels: owned(SYMLINK_SENTINELS),
            loader_variables: owned(LOADER_VARIABLES),
            instrumentation_names: owned(INSTRUMENTATION_NAMES),
        }
    }

    /// Settings with every list empty. Used as a base in tests.
    pub fn empty() -> Self {
        Self {
            tamper_paths: Vec::new(),
            canary_path: None,
            symlink_sentinels: Vec::new(),
            loader_variables: Vec::new(),
            instrumentation_names: Vec::new(),
        }
    }

    pub fn with_extra_tamper_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        append_unique(&mut self.tamper_paths, paths);
        self
    }

    pub fn with_extra_instrumentation_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        append_unique(&mut self.instrumentation_names, names);
        self
    }
}

fn append_unique<I, S>(list: &mut Vec<String>, items: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    for item in items {
        let item = item.into();
        if !list.contains(&item) {
            list.push(item);
        }
    }
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

/// Runs the three environment checks against a [`Host`].
pub struct TrustVerifier<H: Host = SystemHost> {
    host: H,
    settings: TrustSettings,
}

impl TrustVerifier<SystemHost> {
    /// A verifier for the real host with the build target's default lists.
    pub fn system() -> Self {
        Self::new(SystemHost, TrustSettings::platform_default())
    }
}

impl<H: Host> TrustVerifier<H> {
    pub fn new(host: H, settings: TrustSettings) -> Self {
        Self { host, settings }
    }

    pub fn settings(&self) -> &TrustSettings {
        &self.settings
    }

    /// Run every check and return the full list of findings.
    pub fn findings(&self) -> Vec<Finding> {
        let mut findings = self.check_tamper_paths();
        findings.extend(self.check_debug_attach());
        findings.extend(self.check_reverse_engineering());
        findings
    }

    /// Tamper-path check: artifacts, canary write, symlinked directories.
    pub fn check_tamper_paths(&self) -> Vec<Finding> {
        let mut findings = Vec::new();

        for path in &self.settings.tamper_paths {
            if self.host.path_exists(Path::new(path)) {
                findings.push(Finding::new(FindingKind::TamperArtifact, path.clone()));
            }
        }

        if let Some(canary) = &self.settings.canary_path {
            if self.host.canary_write(Path::new(canary)) {
                findings.push(Finding::new(FindingKind::ProtectedPathWritable, canary.clone()));
            }
        }

        for dir in &self.settings.symlink_sentinels {
            if self.host.is_symlink(Path::new(dir)) {
                findings.push(Finding::new(
                    FindingKind::SymlinkedSystemDirectory,
                    dir.clone(),
                ));
            }
        }

        findings
    }

    /// Debug-attach check: traced flag and loader injection variables.
    pub fn check_debug_attach(&self) -> Vec<Finding> {
        let mut findings = Vec::new();

        if self.host.is_traced() {
            findings.push(Finding::new(FindingKind::DebuggerAttached, "tracer present"));
        }

        for var in &self.settings.loader_variables {
            if self.host.env_var_present(var) {
                findings.push(Finding::new(FindingKind::LoaderInjection, var.clone()));
            }
        }

        findings
    }

    /// Reverse-engineering check: loadable instrumentation libraries, and
    /// their names in the process name or loaded images.
    pub fn check_reverse_engineering(&self) -> Vec<Finding> {
        let mut findings = Vec::new();
        let names = &self.settings.instrumentation_names;

        for library in names {
            if self.host.can_load_library(library) {
                findings.push(Finding::new(
                    FindingKind::InstrumentationLibrary,
                    library.clone(),
                ));
            }
        }

        if let Some(process) = self.host.process_name() {
            if let Some(hit) = matching_name(&process, names) {
                findings.push(Finding::new(
                    FindingKind::SuspiciousProcessName,
                    format!("{process} matches {hit}"),
                ));
            }
        }

        for image in self.host.loaded_images() {
            if let Some(hit) = matching_name(&image, names) {
                findings.push(Finding::new(
                    FindingKind::SuspiciousImageLoaded,
                    format!("{image} matches {hit}"),
                ));
            }
        }

        findings
    }
}

impl<H: Host> IntegrityCheck for TrustVerifier<H> {
    fn verify(&self) -> TrustVerdict {
        let findings = self.findings();

        // Details are debug-only: nothing at warn or above may name the
        // check that fired.
        for finding in &findings {
            tracing::debug!(
                kind = %finding.kind,
                detail = %finding.detail,
                "trust check finding"
            );
        }

        let verdict = TrustVerdict::from_reasons(findings.into_iter().map(|f| f.kind).collect());
        tracing::debug!(trusted = verdict.trusted, "trust verification complete");
        verdict
    }
}

/// Case-insensitive substring match of `haystack` against `names`.
fn matching_name<'a>(haystack: &str, names: &'a [String]) -> Option<&'a str> {
    let haystack = haystack.to_lowercase();
    names
        .iter()
        .find(|name| haystack.contains(&name.to_lowercase()))
        .map(String::as_str)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::PathBuf;

    use super::*;

    #[derive(Default)]
    struct FakeHost {
        existing: HashSet<PathBuf>,
        symlinks: HashSet<PathBuf>,
        writable: HashSet<PathBuf>,
        traced: bool,
        env: HashSet<String>,
        loadable: HashSet<String>,
        process: Option<String>,
        images: Vec<String>,
    }

    impl Host for FakeHost {
        fn path_exists(&self, path: &Path) -> bool {
            self.existing.contains(path)
        }

        fn is_symlink(&self, path: &Path) -> bool {
            self.symlinks.contains(path)
        }

        fn canary_write(&self, path: &Path) -> bool {
            self.writable.contains(path)
        }

        fn is_traced(&self) -> bool {
            self.traced
        }

        fn env_var_present(&self, name: &str) -> bool {
            self.env.contains(name)
        }

        fn can_load_library(&self, name: &str) -> bool {
            self.loadable.contains(name)
        }

        fn process_name(&self) -> Option<String> {
            self.process.clone()
        }

        fn loaded_images(&self) -> Vec<String> {
            self.images.clone()
        }
    }

    fn settings() -> TrustSettings {
        TrustSettings {
            tamper_paths: vec!["/Applications/Cydia.app".into(), "/etc/apt".into()],
            canary_path: Some("/private/jailbreak.txt".into()),
            symlink_sentinels: vec!["/Applications".into()],
            loader_variables: vec!["DYLD_INSERT_LIBRARIES".into(), "LD_PRELOAD".into()],
            instrumentation_names: vec!["FridaGadget".into(), "frida".into(), "cycript".into()],
        }
    }

    fn kinds(findings: &[Finding]) -> Vec<FindingKind> {
        findings.iter().map(|f| f.kind).collect()
    }

    #[test]
    fn clean_host_is_trusted() {
        let verifier = TrustVerifier::new(
            FakeHost {
                process: Some("biosecure".into()),
                images: vec!["/usr/lib/libc.so.6".into()],
                ..Default::default()
            },
            settings(),
        );

        let verdict = verifier.verify();
        assert!(verdict.trusted);
        assert!(verdict.reasons.is_empty());
    }

    #[test]
    fn tamper_artifact_detected() {
        let host = FakeHost {
            existing: [PathBuf::from("/etc/apt")].into_iter().collect(),
            ..Default::default()
        };
        let verifier = TrustVerifier::new(host, settings());

        let findings = verifier.check_tamper_paths();
        assert_eq!(kinds(&findings), vec![FindingKind::TamperArtifact]);
        assert_eq!(findings[0].detail, "/etc/apt");
    }

    #[test]
    fn successful_canary_write_is_a_finding() {
        let host = FakeHost {
            writable: [PathBuf::from("/private/jailbreak.txt")].into_iter().collect(),
            ..Default::default()
        };
        let verifier = TrustVerifier::new(host, settings());

        assert_eq!(
            kinds(&verifier.check_tamper_paths()),
            vec![FindingKind::ProtectedPathWritable]
        );
    }

    #[test]
    fn symlinked_system_directory_detected() {
        let host = FakeHost {
            symlinks: [PathBuf::from("/Applications")].into_iter().collect(),
            ..Default::default()
        };
        let verifier = TrustVerifier::new(host, settings());

        assert_eq!(
            kinds(&verifier.check_tamper_paths()),
            vec![FindingKind::SymlinkedSystemDirectory]
        );
    }

    #[test]
    fn attached_debugger_untrusts_device() {
        let host = FakeHost {
            traced: true,
            ..Default::default()
        };
        let verdict = TrustVerifier::new(host, settings()).verify();

        assert!(!verdict.trusted);
        assert_eq!(
            verdict.reasons,
            [FindingKind::DebuggerAttached].into_iter().collect()
        );
    }

    #[test]
    fn loader_variable_detected() {
        let host = FakeHost {
            env: ["LD_PRELOAD".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let findings = TrustVerifier::new(host, settings()).check_debug_attach();

        assert_eq!(kinds(&findings), vec![FindingKind::LoaderInjection]);
        assert_eq!(findings[0].detail, "LD_PRELOAD");
    }

    #[test]
    fn loadable_instrumentation_library_detected() {
        let host = FakeHost {
            loadable: ["FridaGadget".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let findings = TrustVerifier::new(host, settings()).check_reverse_engineering();

        assert_eq!(kinds(&findings), vec![FindingKind::InstrumentationLibrary]);
    }

    #[test]
    fn process_and_image_names_match_case_insensitively() {
        let host = FakeHost {
            process: Some("Frida-Server".into()),
            images: vec![
                "/usr/lib/libSystem.B.dylib".into(),
                "/usr/lib/CYCRIPT-helper.dylib".into(),
            ],
            ..Default::default()
        };
        let findings = TrustVerifier::new(host, settings()).check_reverse_engineering();

        assert_eq!(
            kinds(&findings),
            vec![
                FindingKind::SuspiciousProcessName,
                FindingKind::SuspiciousImageLoaded
            ]
        );
    }

    #[test]
    fn findings_from_all_checks_are_unioned() {
        let host = FakeHost {
            existing: [PathBuf::from("/Applications/Cydia.app")].into_iter().collect(),
            traced: true,
            images: vec!["/var/FridaGadget.dylib".into()],
            ..Default::default()
        };
        let verdict = TrustVerifier::new(host, settings()).verify();

        assert!(!verdict.trusted);
        assert_eq!(verdict.reasons.len(), 3);
        assert!(verdict.reasons.contains(&FindingKind::TamperArtifact));
        assert!(verdict.reasons.contains(&FindingKind::DebuggerAttached));
        assert!(verdict.reasons.contains(&FindingKind::SuspiciousImageLoaded));
    }

    #[test]
    fn extra_entries_extend_defaults_without_duplicates() {
        let base = TrustSettings::platform_default();
        let extended = base
            .clone()
            .with_extra_tamper_paths(["/opt/rootkit"])
            .with_extra_instrumentation_names(["frida", "objection"]);

        assert!(extended.tamper_paths.contains(&"/opt/rootkit".to_string()));
        assert_eq!(
            extended.instrumentation_names.len(),
            base.instrumentation_names.len() + 1
        );
        assert!(base
            .loader_variables
            .iter()
            .all(|v| extended.loader_variables.contains(v)));
    }

    #[test]
    fn verdict_from_reasons() {
        assert!(TrustVerdict::from_reasons(BTreeSet::new()).trusted);
        let verdict =
            TrustVerdict::from_reasons([FindingKind::LoaderInjection].into_iter().collect());
        assert!(!verdict.trusted);
    }

    #[test]
    fn system_host_sees_real_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("present");
        std::fs::write(&file, b"x").unwrap();

        let host = SystemHost;
        assert!(host.path_exists(&file));
        assert!(!host.path_exists(&dir.path().join("absent")));
        assert!(!host.is_symlink(&file));
    }

    #[cfg(unix)]
    #[test]
    fn system_host_detects_symlink_and_cleans_canary() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        std::fs::create_dir(&target).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let host = SystemHost;
        assert!(host.is_symlink(&link));

        let canary = dir.path().join("canary.txt");
        assert!(host.canary_write(&canary));
        assert!(!canary.exists());
    }

    #[cfg(unix)]
    #[test]
    fn system_host_cannot_load_missing_library() {
        assert!(!SystemHost.can_load_library("libbiosecure-does-not-exist.so"));
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    #[test]
    fn procfs_parsing() {
        let status = "Name:\tbiosecure\nState:\tR (running)\nTracerPid:\t4242\nUid:\t0\n";
        assert_eq!(platform::tracer_pid(status), Some(4242));
        assert_eq!(platform::tracer_pid("Name:\tx\n"), None);

        let maps = "\
7f00-7f01 r-xp 00000000 08:01 1234 /usr/lib/libc.so.6
7f01-7f02 r--p 00001000 08:01 1234 /usr/lib/libc.so.6
7f02-7f03 rw-p 00000000 00:00 0
7ffd-7ffe rw-p 00000000 00:00 0 [stack]
7f03-7f04 r-xp 00000000 08:01 99 /tmp/frida-agent-64.so
";
        assert_eq!(
            platform::mapped_paths(maps),
            vec![
                "/tmp/frida-agent-64.so".to_string(),
                "/usr/lib/libc.so.6".to_string()
            ]
        );
    }
}
