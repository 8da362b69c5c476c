use std::fmt;
use std::path::{Path, PathBuf};

/// Represents a block device discovered on the system.
///
/// This struct holds cross-platform information about a device, such as its
/// system path, size, and mount point. It is populated by the platform-specific
/// discovery functions in the [`crate::platform`] module. The `path` doubles as
/// the device's identifier when a front-end resolves a user's selection.
#[derive(Clone, Debug, PartialEq)]
pub struct Device {
    /// The system path to the device (e.g., `/dev/sda`).
    pub path: PathBuf,
    /// The kernel-provided name of the device (e.g., "sda").
    pub name: String,
    /// The total size of the device in gigabytes (GB).
    pub size_gb: f64,
    /// The primary mount point of the device, if any.
    pub mount_point: String,
}

impl Device {
    /// Returns `true` if `id` names this device.
    pub fn has_id(&self, id: &str) -> bool {
        self.path == Path::new(id)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mount_info = if !self.mount_point.is_empty() {
            format!("[Mounted at {}]", self.mount_point)
        } else {
            "[Not mounted]".to_string()
        };

        write!(
            f,
            "{:<15} {:.1} GB {}",
            self.path.display(),
            self.size_gb,
            mount_info
        )
    }
}
