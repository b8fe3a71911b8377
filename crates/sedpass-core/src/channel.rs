//! The raw-channel boundary to the block-device command transport.

use crate::error::TransportError;

/// Length of a vendor command descriptor block.
pub const CDB_LEN: usize = 10;

/// A single round trip to the device: one fixed-size descriptor, an optional
/// outbound payload, and an expected inbound length.
///
/// This is the only seam to the hardware; the whole core is testable against
/// a scripted implementation. At most one logical owner may issue commands to
/// a given device at a time — the channel is an exclusive resource and no
/// arbitration happens here.
pub trait RawChannel {
    /// Execute one command. `data_out` is written to the device before the
    /// response phase; `data_in_len` bytes are read back (may be zero).
    fn execute(
        &mut self,
        cdb: &[u8; CDB_LEN],
        data_out: Option<&[u8]>,
        data_in_len: usize,
    ) -> Result<Vec<u8>, TransportError>;
}

impl<C: RawChannel + ?Sized> RawChannel for &mut C {
    fn execute(
        &mut self,
        cdb: &[u8; CDB_LEN],
        data_out: Option<&[u8]>,
        data_in_len: usize,
    ) -> Result<Vec<u8>, TransportError> {
        (**self).execute(cdb, data_out, data_in_len)
    }
}
