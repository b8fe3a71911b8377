//! sedpass-core: vendor command set for WD Passport-class self-encrypting
//! USB enclosures.
//!
//! Pipeline: status query → precondition check → handy store (KDF
//! parameters) → salted iterative SHA-256 → vendor command over an
//! injected raw channel.
//!
//! The hardware transport is a seam ([`RawChannel`]): everything here is
//! synchronous, single-attempt, and fully testable against a scripted
//! channel. Nothing in this crate touches device discovery, credential
//! stores, or user interaction.

pub mod cdb;
pub mod channel;
pub mod device;
pub mod error;
pub mod handy_store;
pub mod kdf;
pub mod status;

pub use channel::{RawChannel, CDB_LEN};
pub use device::{SedDevice, UnlockOutcome};
pub use error::{ProtocolError, SedError, SedResult, TransportError};
pub use handy_store::HandyStoreBlock1;
pub use kdf::PasswordBlock;
pub use status::{CipherAlgorithm, EncryptionStatus, SecurityStatus};

/// Size of every vendor response and handy-store page.
pub use cdb::BLOCK_SIZE;
