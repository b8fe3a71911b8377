//! Security status and cipher decoding.
//!
//! Pure lookup tables from raw firmware codes to semantic enums. Unknown
//! codes decode to an `Unknown(code)` variant instead of failing, so newer
//! firmware values pass through undisturbed.

use std::fmt;

use crate::error::{SedError, SedResult};

/// Lock state reported by a status query.
///
/// A read-only snapshot; it is re-fetched on demand and never cached across
/// operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityStatus {
    NoLock,
    Locked,
    Unlocked,
    LockedUnlockBlocked,
    NoKeys,
    Unknown(u8),
}

impl SecurityStatus {
    pub fn from_raw(code: u8) -> Self {
        match code {
            0x00 => SecurityStatus::NoLock,
            0x01 => SecurityStatus::Locked,
            0x02 => SecurityStatus::Unlocked,
            0x06 => SecurityStatus::LockedUnlockBlocked,
            0x07 => SecurityStatus::NoKeys,
            other => SecurityStatus::Unknown(other),
        }
    }
}

impl fmt::Display for SecurityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityStatus::NoLock => write!(f, "no lock"),
            SecurityStatus::Locked => write!(f, "locked"),
            SecurityStatus::Unlocked => write!(f, "unlocked"),
            SecurityStatus::LockedUnlockBlocked => write!(f, "locked, unlock blocked"),
            SecurityStatus::NoKeys => write!(f, "no keys"),
            SecurityStatus::Unknown(code) => write!(f, "unknown ({code:#04x})"),
        }
    }
}

/// Cipher the enclosure is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherAlgorithm {
    Aes128Ecb,
    Aes128Cbc,
    Aes128Xts,
    Aes256Ecb,
    Aes256Cbc,
    Aes256Xts,
    FullDiskEncryption,
    Unknown(u8),
}

impl CipherAlgorithm {
    pub fn from_raw(code: u8) -> Self {
        match code {
            0x10 => CipherAlgorithm::Aes128Ecb,
            0x12 => CipherAlgorithm::Aes128Cbc,
            0x18 => CipherAlgorithm::Aes128Xts,
            0x20 => CipherAlgorithm::Aes256Ecb,
            0x22 => CipherAlgorithm::Aes256Cbc,
            0x28 => CipherAlgorithm::Aes256Xts,
            0x30 => CipherAlgorithm::FullDiskEncryption,
            other => CipherAlgorithm::Unknown(other),
        }
    }

    pub fn raw(&self) -> u8 {
        match self {
            CipherAlgorithm::Aes128Ecb => 0x10,
            CipherAlgorithm::Aes128Cbc => 0x12,
            CipherAlgorithm::Aes128Xts => 0x18,
            CipherAlgorithm::Aes256Ecb => 0x20,
            CipherAlgorithm::Aes256Cbc => 0x22,
            CipherAlgorithm::Aes256Xts => 0x28,
            CipherAlgorithm::FullDiskEncryption => 0x30,
            CipherAlgorithm::Unknown(code) => *code,
        }
    }

    /// Byte length of a transmitted password block for this cipher.
    ///
    /// Determined solely by the cipher's key size; the caller never chooses
    /// it. Unknown ciphers are rejected before any payload is built.
    pub fn password_block_len(&self) -> SedResult<usize> {
        match self {
            CipherAlgorithm::Aes128Ecb
            | CipherAlgorithm::Aes128Cbc
            | CipherAlgorithm::Aes128Xts => Ok(16),
            CipherAlgorithm::Aes256Ecb
            | CipherAlgorithm::Aes256Cbc
            | CipherAlgorithm::Aes256Xts
            | CipherAlgorithm::FullDiskEncryption => Ok(32),
            CipherAlgorithm::Unknown(code) => Err(SedError::UnsupportedCipher(*code)),
        }
    }
}

impl fmt::Display for CipherAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherAlgorithm::Aes128Ecb => write!(f, "AES-128-ECB"),
            CipherAlgorithm::Aes128Cbc => write!(f, "AES-128-CBC"),
            CipherAlgorithm::Aes128Xts => write!(f, "AES-128-XTS"),
            CipherAlgorithm::Aes256Ecb => write!(f, "AES-256-ECB"),
            CipherAlgorithm::Aes256Cbc => write!(f, "AES-256-CBC"),
            CipherAlgorithm::Aes256Xts => write!(f, "AES-256-XTS"),
            CipherAlgorithm::FullDiskEncryption => write!(f, "full disk encryption"),
            CipherAlgorithm::Unknown(code) => write!(f, "unknown ({code:#04x})"),
        }
    }
}

/// One decoded status query response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionStatus {
    pub security_status: SecurityStatus,
    pub cipher: CipherAlgorithm,
    /// Rotates on every status read; valid only for the command sent
    /// immediately after the read that produced it.
    pub key_reset_token: [u8; 4],
}
