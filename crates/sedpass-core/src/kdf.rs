//! Password derivation: salted iterative SHA-256, passphrase → password block.
//!
//! The enclosure's own key-generation tooling defines the exact byte recipe;
//! this must reproduce it bit for bit or unlock simply fails:
//!
//! 1. Clean the salt: treat it as UTF-16LE-style pairs (low byte =
//!    character, high byte zero) and stop at the first all-zero pair.
//! 2. Prepend the cleaned salt characters to the passphrase and encode the
//!    whole string as UTF-16 with a byte order mark, then drop the 2-byte
//!    BOM — leaving plain UTF-16LE code units.
//! 3. SHA-256 the result, then keep re-hashing the digest, `iterations`
//!    applications in total. The count comes from the device's handy store,
//!    never from this crate.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{SedError, SedResult};

/// A 256-bit derived password block.
///
/// Only the leading `pwblen` bytes for the active cipher are ever
/// transmitted. Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct PasswordBlock {
    bytes: [u8; 32],
}

impl PasswordBlock {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// The `pwblen`-byte prefix that goes on the wire.
    pub fn transmitted(&self, pwblen: usize) -> &[u8] {
        &self.bytes[..pwblen]
    }
}

impl Drop for PasswordBlock {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for PasswordBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordBlock")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Decode the raw salt into its character sequence.
///
/// Pairs are (low, high); the first all-zero pair terminates. The high byte
/// is discarded even when nonzero, matching the vendor tooling.
pub fn clean_salt(salt: &[u8]) -> String {
    let mut cleaned = String::new();
    for pair in salt.chunks_exact(2) {
        if pair[0] == 0x00 && pair[1] == 0x00 {
            break;
        }
        cleaned.push(char::from(pair[0]));
    }
    cleaned
}

/// Derive the password block for `passphrase` under the device-supplied
/// salt and iteration count.
///
/// Deterministic: identical inputs always yield the identical block. An
/// iteration count of zero would transmit unhashed key material and is
/// rejected instead.
pub fn derive(passphrase: &SecretString, salt: &[u8], iterations: u32) -> SedResult<PasswordBlock> {
    if iterations == 0 {
        return Err(SedError::InvalidArgument("iteration count must be nonzero"));
    }

    let mut salted = clean_salt(salt);
    salted.push_str(passphrase.expose_secret());

    // UTF-16 with BOM, BOM stripped: byte-identical to plain UTF-16LE of
    // the full string, which is what ends up hashed.
    let mut material: Vec<u8> = salted
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect();
    salted.zeroize();

    let mut digest = [0u8; 32];
    for round in 0..iterations {
        let out = if round == 0 {
            Sha256::digest(&material)
        } else {
            Sha256::digest(digest)
        };
        digest.copy_from_slice(&out);
    }
    material.zeroize();

    Ok(PasswordBlock::from_bytes(digest))
}
