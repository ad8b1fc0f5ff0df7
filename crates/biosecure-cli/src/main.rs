//! CLI entry point for BioSecure.
//!
//! This binary provides the `biosecure` command, which exposes the vault's
//! consumer operations on a desktop host: records live in an encrypted file
//! backend, `get` is guarded by a device passcode, and every vault operation
//! runs the host trust checks first.

mod cli;
mod helpers;
mod passcode;
mod probe;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use biosecure_vault::trust::SystemHost;
use biosecure_vault::{
    CredentialVault, FileBackend, Status, TrustVerdict, TrustVerifier, VaultConfig, VaultError,
    crypto,
};
use clap::Parser;
use tracing::info;
use zeroize::Zeroizing;

use crate::cli::{Cli, Commands, PasscodeAction};
use crate::helpers::{decode, decode_key, encode, init_tracing, vault_error};
use crate::passcode::{
    PasscodeAuthenticator, change_passcode, new_passcode_from_env, passcode_is_set,
};
use crate::probe::HostProbe;

/// Resolved on-disk locations for one invocation.
struct Paths {
    data_dir: PathBuf,
    config: PathBuf,
}

impl Paths {
    fn passcode(&self) -> PathBuf {
        helpers::passcode_path(&self.data_dir)
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(if cli.verbose { "debug" } else { "warn" });

    let data_dir = helpers::resolve_data_dir(cli.data_dir);
    let paths = Paths {
        config: helpers::config_path(&data_dir, cli.config),
        data_dir,
    };

    match cli.command {
        Commands::Check { json } => cmd_check(&paths, json),
        Commands::Init => cmd_init(&paths),
        Commands::Store {
            identifier,
            value,
            key,
        } => cmd_store(&paths, &identifier, &value, key.as_deref()),
        Commands::Get { identifier, key } => cmd_get(&paths, &identifier, key.as_deref()).await,
        Commands::Delete { identifier } => cmd_delete(&paths, &identifier),
        Commands::Clear => cmd_clear(&paths),
        Commands::Keygen => cmd_keygen(),
        Commands::Encrypt { key, plaintext } => cmd_encrypt(&key, &plaintext),
        Commands::Decrypt { key, envelope } => cmd_decrypt(&key, &envelope),
        Commands::Passcode { action } => match action {
            PasscodeAction::Set => cmd_passcode_set(&paths).await,
            PasscodeAction::Status => cmd_passcode_status(&paths),
        },
    }
}

fn load_config(paths: &Paths) -> Result<VaultConfig> {
    VaultConfig::load(&paths.config)
        .with_context(|| format!("failed to load configuration {}", paths.config.display()))
}

fn open_vault(paths: &Paths) -> Result<CredentialVault> {
    let config = load_config(paths)?;
    helpers::ensure_private_dir(&paths.data_dir)?;

    let passcode = paths.passcode();
    let probe = Arc::new(HostProbe::new(&passcode));
    let backend = FileBackend::open(helpers::items_dir(&paths.data_dir).join(&config.service))
        .context("failed to open vault storage")?
        .with_device_probe(probe.clone());

    Ok(CredentialVault::new(
        Arc::new(backend),
        Arc::new(PasscodeAuthenticator::new(&passcode)),
        probe,
    )
    .with_config(config))
}

// ---------------------------------------------------------------------------
// Subcommand: check
// ---------------------------------------------------------------------------

fn cmd_check(paths: &Paths, json: bool) -> Result<()> {
    let config = load_config(paths)?;
    let verifier = TrustVerifier::new(SystemHost, config.trust_settings());

    let findings = verifier.findings();
    let verdict = TrustVerdict::from_reasons(findings.iter().map(|f| f.kind).collect());

    if json {
        let report = serde_json::json!({
            "trusted": verdict.trusted,
            "findings": findings
                .iter()
                .map(|f| serde_json::json!({ "kind": f.kind, "detail": f.detail }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if verdict.trusted {
        println!("trusted: no findings");
    } else {
        println!("untrusted: {} finding(s)", findings.len());
        for finding in &findings {
            println!("  {:<28} {}", finding.kind, finding.detail);
        }
    }

    if !verdict.trusted {
        bail!("device failed trust checks");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommands: vault operations
// ---------------------------------------------------------------------------

fn cmd_init(paths: &Paths) -> Result<()> {
    let vault = open_vault(paths)?;
    let capabilities = vault.initialize().map_err(vault_error)?;
    println!("{}", serde_json::to_string_pretty(&capabilities)?);
    Ok(())
}

fn cmd_store(paths: &Paths, identifier: &str, value: &str, key: Option<&str>) -> Result<()> {
    let vault = open_vault(paths)?;

    match key {
        Some(key) => {
            let key = decode_key(key)?;
            vault
                .store_sealed(identifier, value.as_bytes(), &key)
                .map_err(store_error)?;
        }
        None => vault.store(identifier, value.as_bytes()).map_err(store_error)?,
    }

    info!(identifier, sealed = key.is_some(), "stored");
    println!("stored {identifier}");
    Ok(())
}

fn store_error(err: VaultError) -> anyhow::Error {
    let passcode_missing =
        matches!(err, VaultError::BackendError { code } if code == Status::AUTH_FAILED_CODE);
    let err = vault_error(err);
    if passcode_missing {
        err.context("no device passcode; run `biosecure passcode set` first")
    } else {
        err
    }
}

async fn cmd_get(paths: &Paths, identifier: &str, key: Option<&str>) -> Result<()> {
    let vault = open_vault(paths)?;

    let value = match key {
        Some(key) => {
            let key = decode_key(key)?;
            vault
                .retrieve_sealed(identifier, &key)
                .await
                .map_err(vault_error)?
        }
        None => Zeroizing::new(vault.retrieve(identifier).await.map_err(vault_error)?),
    };

    println!("{}", String::from_utf8_lossy(&value));
    Ok(())
}

fn cmd_delete(paths: &Paths, identifier: &str) -> Result<()> {
    open_vault(paths)?.delete(identifier).map_err(vault_error)?;
    println!("deleted {identifier}");
    Ok(())
}

fn cmd_clear(paths: &Paths) -> Result<()> {
    open_vault(paths)?.clear_all().map_err(vault_error)?;
    println!("vault cleared");
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommands: cipher
// ---------------------------------------------------------------------------

fn cmd_keygen() -> Result<()> {
    let key = crypto::generate_key(crypto::KEY_LEN).map_err(vault_error)?;
    println!("{}", encode(&key));
    Ok(())
}

fn cmd_encrypt(key: &str, plaintext: &str) -> Result<()> {
    let key = decode_key(key)?;
    let envelope = crypto::encrypt(plaintext.as_bytes(), &key).map_err(vault_error)?;
    println!("{}", encode(&envelope.to_bytes()));
    Ok(())
}

fn cmd_decrypt(key: &str, envelope: &str) -> Result<()> {
    let key = decode_key(key)?;
    let envelope = decode(envelope).context("envelope is not valid base64")?;
    let plaintext = crypto::decrypt(&envelope, &key).map_err(vault_error)?;
    println!("{}", String::from_utf8_lossy(&plaintext));
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: passcode
// ---------------------------------------------------------------------------

async fn cmd_passcode_set(paths: &Paths) -> Result<()> {
    helpers::ensure_private_dir(&paths.data_dir)?;
    let path = paths.passcode();
    let current = PasscodeAuthenticator::new(&path);

    change_passcode(&path, &current, || {
        if let Some(passcode) = new_passcode_from_env(|key| std::env::var(key).ok()) {
            return Ok(passcode);
        }
        let first = prompt_line("new passcode: ")?;
        let second = prompt_line("repeat passcode: ")?;
        if first != second {
            bail!("passcodes do not match");
        }
        Ok(first)
    })
    .await?;

    println!("passcode set");
    Ok(())
}

fn cmd_passcode_status(paths: &Paths) -> Result<()> {
    if passcode_is_set(&paths.passcode()) {
        println!("passcode: set");
    } else {
        println!("passcode: not set");
    }
    Ok(())
}

fn prompt_line(prompt: &str) -> Result<Zeroizing<String>> {
    eprint!("{prompt}");
    let mut line = Zeroizing::new(String::new());
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(Zeroizing::new(line.trim_end_matches(['\r', '\n']).to_string()))
}
