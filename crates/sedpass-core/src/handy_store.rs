//! Handy store block 1: the firmware page carrying the KDF parameters.
//!
//! Block layout (512 bytes):
//! ```text
//! [0..4]    signature 00 01 44 57
//! [8..12]   iteration count (u32 LE)
//! [12..20]  salt (UTF-16LE-style code units, zero padded)
//! [24..226] password hint (UTF-16LE-style, unused by this crate)
//! [511]     checksum
//! ```
//! Values are only trusted after both the signature and the checksum pass;
//! an invalid block never reaches password derivation.

use crate::cdb::{self, BLOCK_SIZE};
use crate::channel::RawChannel;
use crate::error::{ProtocolError, SedResult};

const SIGNATURE: [u8; 4] = [0x00, 0x01, 0x44, 0x57];

const ITERATION_OFFSET: usize = 8;
const SALT_OFFSET: usize = 12;
const SALT_LEN: usize = 8;
const HINT_OFFSET: usize = 24;
const HINT_LEN: usize = 202;

/// Parsed and validated contents of handy store block 1.
#[derive(Clone, PartialEq, Eq)]
pub struct HandyStoreBlock1 {
    /// Number of hash applications in password derivation.
    pub iteration: u32,
    /// Raw salt code units; cleaned during derivation.
    pub salt: [u8; SALT_LEN],
    /// Raw password hint bytes. Kept for callers that want to display it.
    pub hint: [u8; HINT_LEN],
}

impl std::fmt::Debug for HandyStoreBlock1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandyStoreBlock1")
            .field("iteration", &self.iteration)
            .field("salt", &self.salt)
            .field("hint", &"[..]")
            .finish()
    }
}

/// Compute the block checksum.
///
/// Sum of bytes 0..=509 with byte 0 counted an extra time, negated modulo
/// 256. The double count of byte 0 matches the vendor's own utilities and
/// must not be "corrected" — byte 510 is not covered at all.
pub fn checksum(data: &[u8]) -> u8 {
    let mut sum: u8 = 0;
    for &b in &data[..510] {
        sum = sum.wrapping_add(b);
    }
    sum = sum.wrapping_add(data[0]);
    sum.wrapping_neg()
}

/// Validate a raw 512-byte block and extract the KDF parameters.
pub fn parse_block1(data: &[u8]) -> Result<HandyStoreBlock1, ProtocolError> {
    if data.len() < BLOCK_SIZE {
        return Err(ProtocolError::ShortResponse {
            got: data.len(),
            expected: BLOCK_SIZE,
        });
    }
    if data[..4] != SIGNATURE {
        return Err(ProtocolError::BadSignature);
    }
    let computed = checksum(data);
    let stored = data[511];
    if computed != stored {
        return Err(ProtocolError::BadChecksum { stored, computed });
    }

    let iteration = u32::from_le_bytes(
        data[ITERATION_OFFSET..ITERATION_OFFSET + 4]
            .try_into()
            .expect("fixed 4-byte slice"),
    );
    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&data[SALT_OFFSET..SALT_OFFSET + SALT_LEN]);
    let mut hint = [0u8; HINT_LEN];
    hint.copy_from_slice(&data[HINT_OFFSET..HINT_OFFSET + HINT_LEN]);

    Ok(HandyStoreBlock1 {
        iteration,
        salt,
        hint,
    })
}

/// Read and validate handy store block 1 over the raw channel.
pub fn read_block1<C: RawChannel>(channel: &mut C) -> SedResult<HandyStoreBlock1> {
    let cmd = cdb::handy_store_read(1);
    let data = channel.execute(&cmd.cdb, None, cmd.data_in_len)?;
    let block = parse_block1(&data)?;
    tracing::debug!(iteration = block.iteration, "read handy store block 1");
    Ok(block)
}
