use crate::device::Device;
use anyhow::{Result, bail};

/// Device discovery is only implemented for Linux.
pub fn get_removable_devices() -> Result<Vec<Device>> {
    bail!("Device discovery is not supported on this platform.");
}

pub fn unmount(device: &Device) -> Result<()> {
    bail!(
        "Unmounting {} is not supported on this platform.",
        device.path.display()
    );
}
