//! CLI argument definitions for BioSecure.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// BioSecure -- a guarded credential vault.
#[derive(Parser)]
#[command(
    name = "biosecure",
    version,
    about = "BioSecure -- guarded credential vault",
    long_about = "Stores small secrets so that reading them back requires authenticating as \
                  the device owner, and refuses to operate on a device that looks tampered with."
)]
pub struct Cli {
    /// Directory holding the vault records, passcode and config. Defaults to
    /// `$BIOSECURE_DATA_DIR`, then `~/.biosecure`.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Configuration file. Defaults to `<data-dir>/config.toml`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the device trust checks and report the findings.
    Check {
        /// Print the verdict as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Report biometric and secure hardware capabilities.
    Init,

    /// Store a secret, replacing any previous value.
    Store {
        identifier: String,

        value: String,

        /// Encrypt the value under this base64 key before storing.
        #[arg(long)]
        key: Option<String>,
    },

    /// Authenticate and print a stored secret.
    Get {
        identifier: String,

        /// Decrypt a value stored with `store --key`.
        #[arg(long)]
        key: Option<String>,
    },

    /// Delete a stored secret. Deleting a missing secret succeeds.
    Delete { identifier: String },

    /// Delete every secret in the configured scope.
    Clear,

    /// Generate a random 256-bit key, printed as base64.
    Keygen,

    /// Encrypt text into a base64 cipher envelope.
    Encrypt {
        /// Base64 256-bit key.
        #[arg(long)]
        key: String,

        plaintext: String,
    },

    /// Decrypt a base64 cipher envelope.
    Decrypt {
        /// Base64 256-bit key.
        #[arg(long)]
        key: String,

        envelope: String,
    },

    /// Manage the device passcode.
    Passcode {
        #[command(subcommand)]
        action: PasscodeAction,
    },
}

#[derive(Subcommand)]
pub enum PasscodeAction {
    /// Set or replace the passcode that guards `get`.
    Set,

    /// Show whether a passcode is set.
    Status,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "biosecure",
            "store",
            "session_token",
            "abc123",
            "--data-dir",
            "/tmp/vault",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/vault")));
        match cli.command {
            Commands::Store {
                identifier,
                value,
                key,
            } => {
                assert_eq!(identifier, "session_token");
                assert_eq!(value, "abc123");
                assert!(key.is_none());
            }
            _ => panic!("expected store"),
        }
    }

    #[test]
    fn passcode_subcommand() {
        let cli = Cli::try_parse_from(["biosecure", "passcode", "set"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Passcode {
                action: PasscodeAction::Set
            }
        ));
    }
}
