use crate::device::Device;
use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const SYS_BLOCK: &str = "/sys/block";
const SECTOR_BYTES: u64 = 512;

/// A mounted filesystem as reported by `sysinfo`: the kernel name of the
/// disk or partition, and where it is mounted.
struct Mount {
    name: String,
    mount_point: PathBuf,
}

fn mounts(disks: &sysinfo::Disks) -> Vec<Mount> {
    disks
        .iter()
        .map(|disk| Mount {
            name: Path::new(disk.name())
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            mount_point: disk.mount_point().to_path_buf(),
        })
        .collect()
}

/// Helper to read a specific attribute file of a block device.
fn read_sys_file(block_dir: &Path, device_name: &str, file: &str) -> io::Result<String> {
    let path = block_dir.join(device_name).join(file);
    fs::read_to_string(path).map(|s| s.trim().to_string())
}

/// Helper to find the parent device of a partition (e.g., /dev/sda1 -> /dev/sda).
/// This is used to find the system drive's parent for exclusion.
fn get_parent_device_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if path_str.starts_with("/dev/sd") {
        if let Some(index) = path_str.rfind(|c: char| c.is_alphabetic()) {
            return PathBuf::from(&path_str[..=index]);
        }
    } else if path_str.starts_with("/dev/mmcblk") || path_str.starts_with("/dev/nvme") {
        if let Some(index) = path_str.rfind('p') {
            return PathBuf::from(&path_str[..index]);
        }
    }

    path.to_path_buf()
}

fn is_partition_of(mount: &Mount, device_name: &str) -> bool {
    mount.name.starts_with(device_name)
}

/// Walks a `/sys/block`-shaped directory and keeps the removable, non-empty
/// devices other than the system disk.
fn scan_block_dir(block_dir: &Path, system_disk: &Path, mounts: &[Mount]) -> Result<Vec<Device>> {
    let mut devices = Vec::new();
    let entries = fs::read_dir(block_dir)
        .with_context(|| format!("Could not read {}", block_dir.display()))?;

    for entry in entries.filter_map(Result::ok) {
        let device_name = entry.file_name().to_string_lossy().to_string();
        let device_path = PathBuf::from("/dev/").join(&device_name);

        if device_name.starts_with("loop") || device_path == system_disk {
            continue;
        }

        let is_removable = read_sys_file(block_dir, &device_name, "removable")
            .map(|s| s == "1")
            .unwrap_or(false);

        if !is_removable {
            continue;
        }

        let size_sectors = read_sys_file(block_dir, &device_name, "size")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        // Empty card readers report a size of zero.
        if size_sectors == 0 {
            continue;
        }

        let size_gb = (size_sectors * SECTOR_BYTES) as f64 / (1024.0 * 1024.0 * 1024.0);

        let mount_point = mounts
            .iter()
            .filter(|m| is_partition_of(m, &device_name))
            .map(|m| m.mount_point.to_string_lossy().to_string())
            .find(|mp| !mp.is_empty())
            .unwrap_or_default();

        debug!("Found removable device {} ({size_gb:.1} GB)", device_path.display());
        devices.push(Device {
            path: device_path,
            name: device_name,
            size_gb,
            mount_point,
        });
    }

    devices.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(devices)
}

/// Scans for all removable block devices on a Linux system.
///
/// Devices are discovered by iterating through the `/sys/block` directory.
/// The device holding `/` is always excluded, as are loop devices, devices
/// whose `removable` flag is not set and devices that report a size of zero.
///
/// # Returns
///
/// The discovered [`Device`]s sorted by path, or an error if the system drive
/// cannot be determined or `/sys/block` cannot be read.
pub fn get_removable_devices() -> Result<Vec<Device>> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    let mounts = mounts(&disks);

    let system_disk = mounts
        .iter()
        .find(|m| m.mount_point == Path::new("/"))
        .map(|m| get_parent_device_path(&PathBuf::from("/dev/").join(&m.name)))
        .ok_or_else(|| anyhow!("Could not determine system drive."))?;

    scan_block_dir(Path::new(SYS_BLOCK), &system_disk, &mounts)
}

/// Unmounts every mounted filesystem that lives on `device`.
///
/// # Errors
///
/// Returns an error naming the mount point if the kernel refuses to unmount it
/// (e.g. it is busy or the process lacks the privilege).
pub fn unmount(device: &Device) -> Result<()> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    for mount in mounts(&disks)
        .iter()
        .filter(|m| is_partition_of(m, &device.name))
    {
        info!("Unmounting {}", mount.mount_point.display());
        nix::mount::umount(mount.mount_point.as_path())
            .with_context(|| format!("Could not unmount {}", mount.mount_point.display()))?;
    }
    Ok(())
}
