use thiserror::Error;

use crate::status::SecurityStatus;

pub type SedResult<T> = Result<T, SedError>;

/// Failure of the underlying command transport (SG_IO, mock, ...).
#[derive(Debug, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

impl From<std::io::Error> for TransportError {
    fn from(value: std::io::Error) -> Self {
        TransportError(value.to_string())
    }
}

/// A response that does not match the expected wire format.
///
/// No device state is assumed mutated when one of these is raised.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("wrong encryption status signature {0:#04x} (expected 0x45)")]
    UnexpectedSignature(u8),

    #[error("wrong handy store block signature")]
    BadSignature,

    #[error("wrong handy store checksum: stored {stored:#04x}, computed {computed:#04x}")]
    BadChecksum { stored: u8, computed: u8 },

    #[error("short response: got {got} bytes, expected {expected}")]
    ShortResponse { got: usize, expected: usize },
}

#[derive(Debug, Error)]
pub enum SedError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Precondition on the current security status failed; no command was sent.
    #[error("invalid device state for this operation: {0}")]
    InvalidState(SecurityStatus),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The device rejected the write. The protocol gives no finer-grained
    /// error; for unlock/change-password this is most commonly a wrong
    /// passphrase, and the caller may retry with corrected input.
    #[error("device rejected the command (wrong passphrase?): {0}")]
    OperationFailed(#[source] TransportError),

    #[error("unsupported cipher id {0:#04x}")]
    UnsupportedCipher(u8),
}
