//! sedpass-scsi: Linux glue around the sedpass protocol core.
//!
//! Two concerns live here, both deliberately outside `sedpass-core`:
//! the SG_IO pass-through channel that actually reaches the block device,
//! and sysfs-based discovery/rescan of Passport-family enclosures.

pub mod discover;
pub mod sgio;

pub use discover::{discover, find_one, rescan, DiscoveredDevice};
pub use sgio::SgChannel;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScsiError {
    #[error("opening {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    #[error("sysfs: {0}")]
    Sysfs(String),

    #[error("no Passport-family device found; pass --device")]
    NoDevice,

    #[error("multiple Passport-family devices found ({0:?}); pass --device")]
    MultipleDevices(Vec<String>),
}
