//! SG_IO pass-through channel.
//!
//! Issues the vendor CDBs through the Linux generic SCSI driver
//! (`ioctl(SG_IO)` on the block device node). One `SgChannel` wraps one
//! open device node; every [`RawChannel::execute`] call is one blocking
//! round trip.

use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::path::Path;

use sedpass_core::{RawChannel, TransportError, CDB_LEN};

use crate::ScsiError;

const SG_IO: libc::c_ulong = 0x2285;
const SG_DXFER_NONE: libc::c_int = -1;
const SG_DXFER_TO_DEV: libc::c_int = -2;
const SG_DXFER_FROM_DEV: libc::c_int = -3;

const SENSE_LEN: usize = 32;
const TIMEOUT_MS: u32 = 20_000;

/// `struct sg_io_hdr` from `<scsi/sg.h>`.
#[repr(C)]
struct SgIoHdr {
    interface_id: libc::c_int,
    dxfer_direction: libc::c_int,
    cmd_len: u8,
    mx_sb_len: u8,
    iovec_count: u16,
    dxfer_len: u32,
    dxferp: *mut libc::c_void,
    cmdp: *mut u8,
    sbp: *mut u8,
    timeout: u32,
    flags: u32,
    pack_id: libc::c_int,
    usr_ptr: *mut libc::c_void,
    status: u8,
    masked_status: u8,
    msg_status: u8,
    sb_len_wr: u8,
    host_status: u16,
    driver_status: u16,
    resid: libc::c_int,
    duration: u32,
    info: u32,
}

/// An exclusive handle on one enclosure's device node.
pub struct SgChannel {
    file: File,
    path: String,
}

impl SgChannel {
    /// Open a block device node (e.g. `/dev/sdb`) for pass-through access.
    /// Requires read/write permission on the node, typically root.
    pub fn open(path: &Path) -> Result<Self, ScsiError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| ScsiError::Open {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            file,
            path: path.display().to_string(),
        })
    }

    fn run(
        &mut self,
        cdb: &[u8; CDB_LEN],
        direction: libc::c_int,
        buffer: &mut [u8],
    ) -> Result<(), TransportError> {
        let mut cmd = *cdb;
        let mut sense = [0u8; SENSE_LEN];
        let mut hdr = SgIoHdr {
            interface_id: 'S' as libc::c_int,
            dxfer_direction: direction,
            cmd_len: CDB_LEN as u8,
            mx_sb_len: SENSE_LEN as u8,
            iovec_count: 0,
            dxfer_len: buffer.len() as u32,
            dxferp: if buffer.is_empty() {
                std::ptr::null_mut()
            } else {
                buffer.as_mut_ptr().cast()
            },
            cmdp: cmd.as_mut_ptr(),
            sbp: sense.as_mut_ptr(),
            timeout: TIMEOUT_MS,
            flags: 0,
            pack_id: 0,
            usr_ptr: std::ptr::null_mut(),
            status: 0,
            masked_status: 0,
            msg_status: 0,
            sb_len_wr: 0,
            host_status: 0,
            driver_status: 0,
            resid: 0,
            duration: 0,
            info: 0,
        };

        // SAFETY: hdr points at live stack buffers for the duration of the
        // blocking ioctl; the kernel does not retain them afterwards.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), SG_IO, &mut hdr) };
        if rc < 0 {
            return Err(TransportError(format!(
                "SG_IO ioctl on {}: {}",
                self.path,
                std::io::Error::last_os_error()
            )));
        }
        if hdr.status != 0 || hdr.host_status != 0 || hdr.driver_status != 0 {
            let sense_wr = &sense[..hdr.sb_len_wr as usize];
            tracing::debug!(
                status = hdr.status,
                host_status = hdr.host_status,
                driver_status = hdr.driver_status,
                ?sense_wr,
                "SG_IO command failed"
            );
            return Err(TransportError(format!(
                "SCSI command {:#04x} failed on {} (status {:#04x}, host {:#06x}, driver {:#06x})",
                cdb[0], self.path, hdr.status, hdr.host_status, hdr.driver_status
            )));
        }
        Ok(())
    }
}

impl RawChannel for SgChannel {
    fn execute(
        &mut self,
        cdb: &[u8; CDB_LEN],
        data_out: Option<&[u8]>,
        data_in_len: usize,
    ) -> Result<Vec<u8>, TransportError> {
        match (data_out, data_in_len) {
            (Some(_), n) if n > 0 => Err(TransportError(
                "bidirectional transfers are not part of this command set".into(),
            )),
            (Some(out), _) => {
                let mut buffer = out.to_vec();
                self.run(cdb, SG_DXFER_TO_DEV, &mut buffer)?;
                Ok(Vec::new())
            }
            (None, 0) => {
                self.run(cdb, SG_DXFER_NONE, &mut [])?;
                Ok(Vec::new())
            }
            (None, n) => {
                let mut buffer = vec![0u8; n];
                self.run(cdb, SG_DXFER_FROM_DEV, &mut buffer)?;
                Ok(buffer)
            }
        }
    }
}
