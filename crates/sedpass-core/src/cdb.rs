//! Vendor command codec.
//!
//! Builds the five fixed-layout 10-byte command descriptor blocks and their
//! payload structures, and parses the status query response. Every command
//! is constructed fresh per call; nothing here is reused or cached.
//!
//! Wire layouts (must match the enclosure firmware byte for byte):
//! ```text
//! StatusQuery     C0 45 00 00 00 00 00 00 30 00              → 512 bytes, byte0=0x45
//! HandyStoreRead  D8 00 {page:u32 BE} 00 00 01 00            → 512 bytes
//! Unlock          C1 E1 00 00 00 00 00 00 {8+n} 00           ← 45 00 00 00 00 00 {n:u16 BE} + hash(n)
//! ChangePassword  C1 E2 00 00 00 00 00 00 {8+2n} 00          ← 45 00 00 {flags} 00 00 {n:u16 BE} + old(n) + new(n)
//! SecureErase     C1 E3 {token:4} 00 00 {8+n} 00             ← 45 00 00 {flags} 30 00 00 00 + random(n)
//! ```
//! where `n` is the password block length for the active cipher.

use crate::channel::CDB_LEN;
use crate::error::ProtocolError;
use crate::status::{CipherAlgorithm, EncryptionStatus, SecurityStatus};

/// Every vendor response and handy-store page is one 512-byte block.
pub const BLOCK_SIZE: usize = 512;

/// Fixed offsets within the status query response.
const STATUS_SIGNATURE: u8 = 0x45;
const STATUS_OFFSET: usize = 3;
const CIPHER_OFFSET: usize = 4;
const TOKEN_OFFSET: usize = 8;

/// A fully encoded command, ready for one channel round trip.
#[derive(Debug, Clone)]
pub struct RawCommand {
    pub cdb: [u8; CDB_LEN],
    pub data_out: Vec<u8>,
    pub data_in_len: usize,
}

/// Encryption status query.
pub fn status_query() -> RawCommand {
    RawCommand {
        cdb: [0xC0, 0x45, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x30, 0x00],
        data_out: Vec::new(),
        data_in_len: BLOCK_SIZE,
    }
}

/// Read one page of the firmware's handy store area.
pub fn handy_store_read(page: u32) -> RawCommand {
    let mut cdb = [0xD8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00];
    cdb[2..6].copy_from_slice(&page.to_be_bytes());
    RawCommand {
        cdb,
        data_out: Vec::new(),
        data_in_len: BLOCK_SIZE,
    }
}

/// Unlock with `pwblen` leading bytes of a derived password block.
pub fn unlock(pwblen: usize, password_hash: &[u8]) -> RawCommand {
    debug_assert!(password_hash.len() >= pwblen);
    let mut cdb = [0xC1, 0xE1, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    cdb[8] = (8 + pwblen) as u8;

    let mut payload = password_payload_header(0x00, pwblen);
    payload.extend_from_slice(&password_hash[..pwblen]);
    RawCommand {
        cdb,
        data_out: payload,
        data_in_len: 0,
    }
}

/// Change (set, replace, or clear) the device password.
///
/// `old_hash`/`new_hash` each carry `pwblen` bytes; an empty passphrase side
/// is `pwblen` zero bytes. The flags byte is computed by the state machine.
pub fn change_password(
    pwblen: usize,
    flags: u8,
    old_hash: &[u8],
    new_hash: &[u8],
) -> RawCommand {
    debug_assert!(old_hash.len() >= pwblen && new_hash.len() >= pwblen);
    let mut cdb = [0xC1, 0xE2, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    cdb[8] = (8 + 2 * pwblen) as u8;

    let mut payload = password_payload_header(flags, pwblen);
    payload.extend_from_slice(&old_hash[..pwblen]);
    payload.extend_from_slice(&new_hash[..pwblen]);
    RawCommand {
        cdb,
        data_out: payload,
        data_in_len: 0,
    }
}

/// Regenerate the internal media key, destroying all data access.
///
/// `key_reset_token` must come from the status read immediately preceding
/// this command — it rotates on every read and a stale value risks the
/// device rejecting or ignoring the erase.
/// `flags` is 0x01 for every AES cipher; full disk encryption leaves it
/// clear. The state machine makes that call from the cipher in effect.
pub fn secure_erase(
    pwblen: usize,
    flags: u8,
    key_reset_token: [u8; 4],
    random: &[u8],
) -> RawCommand {
    debug_assert_eq!(random.len(), pwblen);
    let mut cdb = [0xC1, 0xE3, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    cdb[2..6].copy_from_slice(&key_reset_token);
    cdb[8] = (8 + pwblen) as u8;

    let mut payload = vec![0x45, 0x00, 0x00, flags, 0x30, 0x00, 0x00, 0x00];
    payload.extend_from_slice(random);
    RawCommand {
        cdb,
        data_out: payload,
        data_in_len: 0,
    }
}

/// `45 00 00 {flags} 00 00 {pwblen:u16 BE}` — the common 8-byte prefix of
/// unlock and change-password payloads.
fn password_payload_header(flags: u8, pwblen: usize) -> Vec<u8> {
    let mut header = vec![0x45, 0x00, 0x00, flags, 0x00, 0x00];
    header.extend_from_slice(&(pwblen as u16).to_be_bytes());
    header
}

/// Decode a status query response.
pub fn parse_status(data: &[u8]) -> Result<EncryptionStatus, ProtocolError> {
    if data.len() < TOKEN_OFFSET + 4 {
        return Err(ProtocolError::ShortResponse {
            got: data.len(),
            expected: TOKEN_OFFSET + 4,
        });
    }
    if data[0] != STATUS_SIGNATURE {
        return Err(ProtocolError::UnexpectedSignature(data[0]));
    }
    let mut key_reset_token = [0u8; 4];
    key_reset_token.copy_from_slice(&data[TOKEN_OFFSET..TOKEN_OFFSET + 4]);
    Ok(EncryptionStatus {
        security_status: SecurityStatus::from_raw(data[STATUS_OFFSET]),
        cipher: CipherAlgorithm::from_raw(data[CIPHER_OFFSET]),
        key_reset_token,
    })
}
