//! Platform keychain persistence of derived password blocks.
//!
//! Uses the `keyring` crate for cross-platform access (Secret Service on
//! Linux, Keychain Services on macOS, Credential Manager on Windows).
//! Blocks are stored base64-encoded, keyed by the device label — the label
//! is opaque here, the protocol core never sees this layer at all.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sedpass_core::PasswordBlock;
use zeroize::Zeroize;

const SERVICE_NAME: &str = "sedpass";

/// Store a derived password block under the device label.
pub fn store_block(label: &str, block: &PasswordBlock) -> Result<()> {
    let entry = keyring::Entry::new(SERVICE_NAME, label)
        .with_context(|| format!("keychain entry creation for '{label}'"))?;
    let mut encoded = BASE64.encode(block.as_bytes());
    let result = entry
        .set_password(&encoded)
        .with_context(|| format!("keychain store for '{label}'"));
    encoded.zeroize();
    result?;
    tracing::debug!(label, "stored password block in platform keychain");
    Ok(())
}

/// Retrieve a previously stored password block, if any.
pub fn load_block(label: &str) -> Result<Option<PasswordBlock>> {
    let entry = keyring::Entry::new(SERVICE_NAME, label)
        .with_context(|| format!("keychain entry creation for '{label}'"))?;
    let mut encoded = match entry.get_password() {
        Ok(encoded) => encoded,
        Err(keyring::Error::NoEntry) => return Ok(None),
        Err(e) => return Err(anyhow::anyhow!("keychain get for '{label}': {e}")),
    };
    let decoded = BASE64.decode(&encoded);
    encoded.zeroize();
    let mut decoded = decoded.with_context(|| format!("decoding stored block for '{label}'"))?;

    let bytes: [u8; 32] = decoded
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("stored block for '{label}' has wrong length"))?;
    decoded.zeroize();
    Ok(Some(PasswordBlock::from_bytes(bytes)))
}

/// Delete a stored password block. Missing entries are not an error.
pub fn delete_block(label: &str) -> Result<()> {
    let entry = keyring::Entry::new(SERVICE_NAME, label)
        .with_context(|| format!("keychain entry creation for '{label}'"))?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(anyhow::anyhow!("keychain delete for '{label}': {e}")),
    }
}
