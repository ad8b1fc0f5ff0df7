//! Shared helper functions used across CLI subcommands.
//!
//! Includes tracing initialization, data directory resolution, base64 key
//! handling, and consumer-facing error conversion.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use biosecure_vault::{VaultError, crypto};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Resolve the data directory: the flag, then `BIOSECURE_DATA_DIR`, then
/// `~/.biosecure`, then `./data`.
pub fn resolve_data_dir(flag: Option<PathBuf>) -> PathBuf {
    resolve_data_dir_with(flag, |key| std::env::var_os(key).map(PathBuf::from))
}

fn resolve_data_dir_with<F>(flag: Option<PathBuf>, lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<PathBuf>,
{
    flag.or_else(|| lookup("BIOSECURE_DATA_DIR"))
        .or_else(|| lookup("HOME").map(|home| home.join(".biosecure")))
        .unwrap_or_else(|| PathBuf::from("data"))
}

pub fn items_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("items")
}

pub fn passcode_path(data_dir: &Path) -> PathBuf {
    data_dir.join("passcode.json")
}

pub fn config_path(data_dir: &Path, flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| data_dir.join("config.toml"))
}

/// Create `dir` with owner-only permissions if it does not exist.
pub fn ensure_private_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory {}", dir.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
            .with_context(|| format!("failed to restrict {}", dir.display()))?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text.trim())
        .context("value is not valid base64")
}

/// Decode a base64 key and check that it is 256 bits.
pub fn decode_key(text: &str) -> Result<Zeroizing<Vec<u8>>> {
    let key = Zeroizing::new(decode(text).context("key is not valid base64")?);
    crypto::validate_key(&key).map_err(vault_error)?;
    Ok(key)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Convert a vault error into what the user sees: the redacted public form
/// plus its stable code. The full error goes to the debug log.
pub fn vault_error(err: VaultError) -> anyhow::Error {
    tracing::debug!(error = %err, "vault operation failed");
    let public = err.public();
    anyhow!("{public} [{}]", public.code())
}
