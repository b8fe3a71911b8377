//! Sysfs discovery of Passport-family enclosures, and the post-unlock
//! rescan that makes the OS re-read the (now readable) partition table.
//!
//! Equivalent to what `lsscsi` would show, read straight from
//! `/sys/block/*/device/{vendor,model}`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::ScsiError;

const SYS_BLOCK: &str = "/sys/block";
const MODEL_MATCH: &str = "Passport";

/// One discovered enclosure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Device node, e.g. `/dev/sdb`.
    pub node: PathBuf,
    /// Kernel block name, e.g. `sdb`.
    pub block: String,
    /// SCSI host number, e.g. `23` for address `23:0:0:0`.
    pub host: Option<String>,
    /// Vendor + model label, e.g. `WD My Passport 0820`. Opaque to the
    /// protocol core; used as the credential-store key by callers.
    pub label: String,
}

/// Scan sysfs for Passport-family devices.
pub fn discover() -> Result<Vec<DiscoveredDevice>, ScsiError> {
    discover_in(Path::new(SYS_BLOCK))
}

fn discover_in(sys_block: &Path) -> Result<Vec<DiscoveredDevice>, ScsiError> {
    let entries = fs::read_dir(sys_block)
        .map_err(|e| ScsiError::Sysfs(format!("reading {}: {e}", sys_block.display())))?;

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ScsiError::Sysfs(e.to_string()))?;
        let block = entry.file_name().to_string_lossy().into_owned();
        let device_dir = entry.path().join("device");
        let Ok(model) = fs::read_to_string(device_dir.join("model")) else {
            continue;
        };
        if !model.contains(MODEL_MATCH) {
            continue;
        }
        let vendor = fs::read_to_string(device_dir.join("vendor")).unwrap_or_default();
        found.push(DiscoveredDevice {
            node: PathBuf::from("/dev").join(&block),
            host: scsi_host(&device_dir),
            label: make_label(&vendor, &model),
            block,
        });
    }
    found.sort_by(|a, b| a.block.cmp(&b.block));
    Ok(found)
}

/// Resolve the device to operate on: an explicit `--device` path wins,
/// otherwise discovery must yield exactly one enclosure.
pub fn find_one(device: Option<&Path>) -> Result<DiscoveredDevice, ScsiError> {
    if let Some(node) = device {
        return describe(node);
    }
    let mut found = discover()?;
    match found.len() {
        0 => Err(ScsiError::NoDevice),
        1 => Ok(found.remove(0)),
        _ => Err(ScsiError::MultipleDevices(
            found.into_iter().map(|d| d.block).collect(),
        )),
    }
}

/// Describe an explicitly named device node from sysfs, without requiring
/// the model to match the Passport family.
fn describe(node: &Path) -> Result<DiscoveredDevice, ScsiError> {
    let block = node
        .file_name()
        .ok_or_else(|| ScsiError::Sysfs(format!("bad device path {}", node.display())))?
        .to_string_lossy()
        .into_owned();
    let device_dir = Path::new(SYS_BLOCK).join(&block).join("device");
    let vendor = fs::read_to_string(device_dir.join("vendor")).unwrap_or_default();
    let model = fs::read_to_string(device_dir.join("model")).unwrap_or_default();
    let label = if vendor.trim().is_empty() && model.trim().is_empty() {
        block.clone()
    } else {
        make_label(&vendor, &model)
    };
    Ok(DiscoveredDevice {
        node: node.to_path_buf(),
        host: scsi_host(&device_dir),
        label,
        block,
    })
}

/// Drop the SCSI target and rescan its host so the kernel re-reads the
/// partition table of the freshly unlocked device.
pub fn rescan(device: &DiscoveredDevice) -> Result<(), ScsiError> {
    let host = device
        .host
        .as_deref()
        .ok_or_else(|| ScsiError::Sysfs(format!("no SCSI host known for {}", device.block)))?;

    let delete = PathBuf::from(SYS_BLOCK)
        .join(&device.block)
        .join("device/delete");
    fs::write(&delete, "1")
        .map_err(|e| ScsiError::Sysfs(format!("writing {}: {e}", delete.display())))?;

    let scan = PathBuf::from(format!("/sys/class/scsi_host/host{host}/scan"));
    fs::write(&scan, "- - -")
        .map_err(|e| ScsiError::Sysfs(format!("writing {}: {e}", scan.display())))?;

    tracing::debug!(block = %device.block, host, "dropped target and rescanned host");
    Ok(())
}

/// `/sys/block/sdX/device` is a symlink to the SCSI address directory
/// (`.../23:0:0:0`); the host number is the first colon-separated field.
fn scsi_host(device_dir: &Path) -> Option<String> {
    let target = fs::read_link(device_dir).ok()?;
    let address = target.file_name()?.to_string_lossy().into_owned();
    host_from_scsi_address(&address)
}

fn host_from_scsi_address(address: &str) -> Option<String> {
    let (host, rest) = address.split_once(':')?;
    if host.is_empty() || !rest.contains(':') {
        return None;
    }
    host.chars()
        .all(|c| c.is_ascii_digit())
        .then(|| host.to_string())
}

fn make_label(vendor: &str, model: &str) -> String {
    let vendor = vendor.trim();
    let model = model.trim();
    if vendor.is_empty() {
        model.to_string()
    } else {
        format!("{vendor} {model}")
    }
}
