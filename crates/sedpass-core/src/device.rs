//! Lock/unlock/re-key/erase orchestration.
//!
//! `SedDevice` owns a raw channel and validates preconditions on the
//! current security status before composing the codec, handy-store reader,
//! and password derivation into single synchronous operations. There are no
//! retries and no caching: every operation re-fetches the status it needs,
//! and a failing channel call is terminal for that invocation.

use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};

use crate::cdb;
use crate::channel::RawChannel;
use crate::error::{SedError, SedResult};
use crate::handy_store::{self, HandyStoreBlock1};
use crate::kdf::{self, PasswordBlock};
use crate::status::{CipherAlgorithm, EncryptionStatus, SecurityStatus};

/// Result of an unlock attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// The unlock command was sent and accepted.
    Unlocked,
    /// The device was already accessible; no command was sent.
    AlreadyUnlocked,
}

/// A self-encrypting enclosure reached through an injected raw channel.
///
/// The channel is an exclusive resource: construct one `SedDevice` per
/// device and keep a single logical owner issuing commands at a time.
pub struct SedDevice<C: RawChannel> {
    channel: C,
}

impl<C: RawChannel> SedDevice<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    pub fn into_inner(self) -> C {
        self.channel
    }

    /// Fetch the current encryption status. Never cached; the key-reset
    /// token in the result rotates on every call.
    pub fn encryption_status(&mut self) -> SedResult<EncryptionStatus> {
        let cmd = cdb::status_query();
        let data = self.channel.execute(&cmd.cdb, None, cmd.data_in_len)?;
        let status = cdb::parse_status(&data)?;
        tracing::debug!(
            security_status = %status.security_status,
            cipher = %status.cipher,
            "status query"
        );
        Ok(status)
    }

    /// Read the KDF parameters (iteration count and salt) from the handy
    /// store.
    pub fn kdf_params(&mut self) -> SedResult<HandyStoreBlock1> {
        handy_store::read_block1(&mut self.channel)
    }

    /// Derive the password block for `passphrase` under this device's
    /// handy-store parameters. Used both by unlock and by callers that
    /// persist the block externally.
    pub fn derive_password(&mut self, passphrase: &SecretString) -> SedResult<PasswordBlock> {
        let params = self.kdf_params()?;
        kdf::derive(passphrase, &params.salt, params.iteration)
    }

    /// Unlock with a passphrase.
    ///
    /// Legal only from `Locked`; `NoLock`/`Unlocked` short-circuit to
    /// [`UnlockOutcome::AlreadyUnlocked`] without touching the device
    /// further. A rejected unlock write surfaces as `OperationFailed` —
    /// the protocol cannot distinguish a wrong passphrase from other write
    /// failures.
    pub fn unlock(&mut self, passphrase: &SecretString) -> SedResult<UnlockOutcome> {
        let Some(pwblen) = self.unlock_gate()? else {
            return Ok(UnlockOutcome::AlreadyUnlocked);
        };
        let block = self.derive_password(passphrase)?;
        self.send_unlock(pwblen, &block)
    }

    /// Unlock with an already-derived password block (e.g. one restored
    /// from a credential store).
    pub fn unlock_with_block(&mut self, block: &PasswordBlock) -> SedResult<UnlockOutcome> {
        let Some(pwblen) = self.unlock_gate()? else {
            return Ok(UnlockOutcome::AlreadyUnlocked);
        };
        self.send_unlock(pwblen, block)
    }

    /// Set, replace, or clear the device password.
    ///
    /// Legal only from `Unlocked` or `NoLock`. An empty new passphrase
    /// disables encryption; a non-empty new passphrase on an unencrypted
    /// device enables it. Both sides empty is rejected before any command
    /// is sent.
    pub fn change_password(&mut self, old: &SecretString, new: &SecretString) -> SedResult<()> {
        let old_set = !old.expose_secret().is_empty();
        let new_set = !new.expose_secret().is_empty();
        if !old_set && !new_set {
            return Err(SedError::InvalidArgument(
                "old and new passphrase must not both be empty",
            ));
        }

        let status = self.encryption_status()?;
        match status.security_status {
            SecurityStatus::Unlocked | SecurityStatus::NoLock => {}
            other => return Err(SedError::InvalidState(other)),
        }
        let pwblen = status.cipher.password_block_len()?;
        let params = self.kdf_params()?;

        let zeros = PasswordBlock::from_bytes([0u8; 32]);
        let old_block = if old_set {
            kdf::derive(old, &params.salt, params.iteration)?
        } else {
            zeros.clone()
        };
        let new_block = if new_set {
            kdf::derive(new, &params.salt, params.iteration)?
        } else {
            zeros
        };

        let mut flags = 0u8;
        if old_set {
            flags |= 0x10;
        }
        if new_set {
            flags |= 0x01;
        }
        // Firmware-mandated exception: when both sides are present the two
        // bits are cleared again rather than transmitted together.
        if flags & 0x11 == 0x11 {
            flags &= 0xEE;
        }

        let cmd = cdb::change_password(
            pwblen,
            flags,
            old_block.transmitted(pwblen),
            new_block.transmitted(pwblen),
        );
        self.channel
            .execute(&cmd.cdb, Some(&cmd.data_out), cmd.data_in_len)
            .map_err(SedError::OperationFailed)?;
        tracing::debug!(flags, "password change accepted");
        Ok(())
    }

    /// Regenerate the internal media key. Destroys access to all existing
    /// data irrecoverably and executes unconditionally once invoked —
    /// confirmation gating belongs to the caller.
    ///
    /// The payload carries `pwblen` bytes of OS randomness; the device, not
    /// the caller, derives the new key. Cipher selection defaults to the
    /// currently active cipher unless overridden.
    pub fn secure_erase(&mut self, cipher: Option<CipherAlgorithm>) -> SedResult<()> {
        let current = self.encryption_status()?;
        let cipher = cipher.unwrap_or(current.cipher);
        let pwblen = cipher.password_block_len()?;
        let flags = match cipher {
            CipherAlgorithm::FullDiskEncryption => 0x00,
            _ => 0x01,
        };

        let mut random = vec![0u8; pwblen];
        OsRng.fill_bytes(&mut random);

        // The key-reset token rotates on every status read; fetch it
        // immediately before encoding, with no intervening read.
        let token = self.encryption_status()?.key_reset_token;
        let cmd = cdb::secure_erase(pwblen, flags, token, &random);
        self.channel
            .execute(&cmd.cdb, Some(&cmd.data_out), cmd.data_in_len)
            .map_err(SedError::OperationFailed)?;
        tracing::warn!(cipher = %cipher, "secure erase accepted; media key regenerated");
        Ok(())
    }

    /// Precondition check for triggering an OS rescan of the unlocked
    /// device. The rescan mechanics themselves live with the transport.
    pub fn ensure_mountable(&mut self) -> SedResult<()> {
        let status = self.encryption_status()?;
        match status.security_status {
            SecurityStatus::NoLock | SecurityStatus::Unlocked => Ok(()),
            other => Err(SedError::InvalidState(other)),
        }
    }

    /// Shared unlock gating: `Ok(Some(pwblen))` means proceed, `Ok(None)`
    /// means already unlocked.
    fn unlock_gate(&mut self) -> SedResult<Option<usize>> {
        let status = self.encryption_status()?;
        match status.security_status {
            SecurityStatus::NoLock | SecurityStatus::Unlocked => {
                tracing::debug!("device already unlocked; nothing to do");
                Ok(None)
            }
            SecurityStatus::Locked => Ok(Some(status.cipher.password_block_len()?)),
            other => Err(SedError::InvalidState(other)),
        }
    }

    fn send_unlock(&mut self, pwblen: usize, block: &PasswordBlock) -> SedResult<UnlockOutcome> {
        let cmd = cdb::unlock(pwblen, block.transmitted(pwblen));
        self.channel
            .execute(&cmd.cdb, Some(&cmd.data_out), cmd.data_in_len)
            .map_err(SedError::OperationFailed)?;
        tracing::debug!(pwblen, "unlock accepted");
        Ok(UnlockOutcome::Unlocked)
    }
}
