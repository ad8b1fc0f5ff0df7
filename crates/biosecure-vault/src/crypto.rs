//! Symmetric cipher module: AES-256-CBC with PKCS#7 padding.
//!
//! This module provides the primitives used for payloads that must be
//! encrypted before they leave process memory:
//!
//! - **Encryption/decryption**: AES-256 in CBC mode with a fresh random IV per
//!   call. The output is a [`CipherEnvelope`] laid out as `iv || ciphertext`.
//! - **Key generation**: cryptographically secure random keys via a
//!   [`RandomSource`] (the `ring` system RNG by default).
//! - **Key derivation**: PBKDF2-HMAC-SHA256, used for device-derived and
//!   passcode-derived keys.
//!
//! # Security Notes
//!
//! - CBC is unauthenticated. A flipped ciphertext bit either breaks the
//!   padding or silently garbles one block, and a decrypt oracle that
//!   distinguishes padding errors from other failures is a padding oracle.
//!   The algorithm is kept for compatibility with payloads produced by the
//!   platform's existing CBC layer; new formats should use an AEAD mode.
//! - Keys and plaintexts are returned in [`Zeroizing`] buffers so they are
//!   wiped when the caller drops them.

use std::num::NonZeroU32;

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

/// Length of an AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// AES block length in bytes.
pub const BLOCK_LEN: usize = 16;

/// Length of the CBC initialization vector (one block).
pub const IV_LEN: usize = BLOCK_LEN;

/// Length of the PBKDF2 salt in bytes.
pub const SALT_LEN: usize = 32;

/// PBKDF2 iteration count: 600,000, the OWASP 2023 recommendation for
/// HMAC-SHA256.
const PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(600_000) {
    Some(n) => n,
    None => panic!("PBKDF2 iteration count must be non-zero"),
};

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

// ---------------------------------------------------------------------------
// Randomness
// ---------------------------------------------------------------------------

/// Source of cryptographically secure random bytes.
///
/// Failure is fatal to the calling operation: implementations must never fall
/// back to a weaker generator or return partially filled buffers as success.
pub trait RandomSource: Send + Sync {
    /// Fill `dest` entirely with random bytes.
    ///
    /// Returns [`VaultError::RandomnessUnavailable`] if the generator cannot
    /// be sampled.
    fn fill(&self, dest: &mut [u8]) -> Result<()>;
}

/// The operating system CSPRNG, via `ring`.
#[derive(Debug)]
pub struct SystemRandomSource {
    rng: SystemRandom,
}

impl SystemRandomSource {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for SystemRandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for SystemRandomSource {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        self.rng.fill(dest).map_err(|_| {
            tracing::error!(len = dest.len(), "system CSPRNG could not be sampled");
            VaultError::RandomnessUnavailable
        })
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// IV-prefixed ciphertext produced by [`encrypt`].
///
/// The wire layout is exactly `iv || ciphertext`, with the IV one AES block
/// long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherEnvelope {
    iv: [u8; IV_LEN],
    ciphertext: Vec<u8>,
}

impl CipherEnvelope {
    /// Split a serialized envelope into its IV and ciphertext.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::DecryptionFailed`] if the data is too short to
    /// hold an IV and at least one ciphertext block, or if the ciphertext is
    /// not block aligned.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < IV_LEN + BLOCK_LEN {
            return Err(VaultError::DecryptionFailed {
                reason: format!(
                    "envelope is {} bytes, need at least {}",
                    bytes.len(),
                    IV_LEN + BLOCK_LEN
                ),
            });
        }

        let (iv_bytes, ciphertext) = bytes.split_at(IV_LEN);
        if ciphertext.len() % BLOCK_LEN != 0 {
            return Err(VaultError::DecryptionFailed {
                reason: "ciphertext is not a whole number of blocks".into(),
            });
        }

        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(iv_bytes);

        Ok(Self {
            iv,
            ciphertext: ciphertext.to_vec(),
        })
    }

    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Total serialized length in bytes.
    pub fn len(&self) -> usize {
        IV_LEN + self.ciphertext.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Serialize to `iv || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Serialize to `iv || ciphertext`, reusing the ciphertext buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        let Self { iv, mut ciphertext } = self;
        ciphertext.splice(0..0, iv);
        ciphertext
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Generate `len` random key bytes from the system CSPRNG.
///
/// # Errors
///
/// Returns [`VaultError::RandomnessUnavailable`] if the RNG fails. Callers
/// must treat this as fatal.
pub fn generate_key(len: usize) -> Result<Zeroizing<Vec<u8>>> {
    generate_key_with(&SystemRandomSource::new(), len)
}

/// Generate `len` random key bytes from `rng`.
pub fn generate_key_with(rng: &dyn RandomSource, len: usize) -> Result<Zeroizing<Vec<u8>>> {
    let mut key = Zeroizing::new(vec![0u8; len]);
    rng.fill(&mut key)?;
    Ok(key)
}

/// Check that `key` is a 256-bit AES key.
///
/// The cipher functions reject wrong lengths on their own; this is for
/// callers that want to fail before doing any other work.
pub fn validate_key(key: &[u8]) -> Result<()> {
    if key.len() != KEY_LEN {
        return Err(VaultError::InvalidArgument {
            reason: format!("key must be {} bytes, got {}", KEY_LEN, key.len()),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Encryption
// ---------------------------------------------------------------------------

/// Encrypt `plaintext` under the 256-bit `key` with a fresh random IV.
///
/// # Errors
///
/// - [`VaultError::RandomnessUnavailable`] if no IV could be generated.
/// - [`VaultError::EncryptionFailed`] if the key length is wrong.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<CipherEnvelope> {
    encrypt_with(&SystemRandomSource::new(), plaintext, key)
}

/// [`encrypt`] with an explicit IV source.
pub fn encrypt_with(rng: &dyn RandomSource, plaintext: &[u8], key: &[u8]) -> Result<CipherEnvelope> {
    let mut iv = [0u8; IV_LEN];
    rng.fill(&mut iv)?;

    let cipher = Aes256CbcEnc::new_from_slices(key, &iv).map_err(|_| {
        VaultError::EncryptionFailed {
            reason: format!("key must be {} bytes, got {}", KEY_LEN, key.len()),
        }
    })?;

    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    tracing::trace!(
        plaintext_len = plaintext.len(),
        ciphertext_len = ciphertext.len(),
        "encrypted payload"
    );

    Ok(CipherEnvelope { iv, ciphertext })
}

/// Decrypt a serialized `iv || ciphertext` envelope with `key`.
///
/// # Errors
///
/// Returns [`VaultError::DecryptionFailed`] for a wrong key length, a
/// truncated or misaligned envelope, or invalid padding (which is what a
/// wrong key usually produces).
pub fn decrypt(envelope: &[u8], key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let envelope = CipherEnvelope::parse(envelope)?;
    decrypt_envelope(&envelope, key)
}

/// Decrypt an already-parsed envelope.
pub fn decrypt_envelope(envelope: &CipherEnvelope, key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = Aes256CbcDec::new_from_slices(key, &envelope.iv).map_err(|_| {
        VaultError::DecryptionFailed {
            reason: format!("key must be {} bytes, got {}", KEY_LEN, key.len()),
        }
    })?;

    // Padding and wrong-key failures share one message.
    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&envelope.ciphertext)
        .map_err(|_| VaultError::DecryptionFailed {
            reason: "wrong key or corrupted data".into(),
        })?;

    tracing::trace!(
        ciphertext_len = envelope.ciphertext.len(),
        plaintext_len = plaintext.len(),
        "decrypted payload"
    );

    Ok(Zeroizing::new(plaintext))
}

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

/// Derive a 256-bit key from `password` with a random salt.
///
/// Returns `(salt, key)`; the salt must be stored to re-derive the key.
pub fn derive_key_from_password(
    rng: &dyn RandomSource,
    password: &[u8],
) -> Result<([u8; SALT_LEN], Zeroizing<[u8; KEY_LEN]>)> {
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    derive_key_with_salt(password, &salt, &mut key);

    tracing::debug!("derived key from password via PBKDF2");
    Ok((salt, key))
}

/// Deterministic PBKDF2-HMAC-SHA256 derivation with a known `salt`.
pub fn derive_key_with_salt(password: &[u8], salt: &[u8], out: &mut [u8; KEY_LEN]) {
    pbkdf2::derive(PBKDF2_ALG, PBKDF2_ITERATIONS, salt, password, out);
}

/// Constant-time check that `password` re-derives `expected_key`.
pub fn verify_password(password: &[u8], salt: &[u8], expected_key: &[u8]) -> bool {
    pbkdf2::verify(PBKDF2_ALG, PBKDF2_ITERATIONS, salt, password, expected_key).is_ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
