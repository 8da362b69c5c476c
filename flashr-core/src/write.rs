//! Contains the flash engine: the logic for writing an image file to a device.
//!
//! A flash goes through these stages:
//! 1.  Decompressing the image file if it is compressed (`.gz`, `.xz`, `.zst`).
//! 2.  Checking that the image fits on the target device.
//! 3.  Writing the whole image, or only the ranges a block map marks as mapped.
//! 4.  Optionally reading the written data back and comparing digests.
//! 5.  Optionally unmounting the device's partitions.
use crate::bmap::BlockMap;
use crate::device::Device;
use crate::platform;
use crate::progress::{Phase, ProgressEvent, ProgressMeter};
use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use log::{debug, info};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};
use xz2::read::XzDecoder;
use zstd::stream::read::Decoder as ZstdDecoder;

const BUFFER_SIZE: usize = 1024 * 1024; // 1 MiB

// O_DIRECT transfers must be aligned to the logical sector size.
const SECTOR_SIZE: usize = 512;

#[cfg(target_os = "linux")]
nix::ioctl_read!(blkgetsize64, 0x12, 114, u64);

/// Options that shape a single flash.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Unmount the device's partitions once the flash has finished.
    pub unmount_on_success: bool,
    /// Read the written data back and compare it with the source.
    pub validate_write_on_success: bool,
    /// XML text of a block map; only the mapped ranges are written.
    pub bmap_contents: Option<String>,
}

/// The outcome of a flash that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashResult {
    /// `false` if the read-back did not match. Always `true` when validation
    /// was not requested.
    pub passed_validation: bool,
    /// Lower-case hex SHA-256 of the bytes taken from the (decompressed) image.
    pub source_checksum: String,
}

/// Manages the lifetime of a decompressed image file.
/// If the image was decompressed to a temp file, this struct holds the handle
/// and will delete the file on drop.
struct DecompressedImage {
    path: PathBuf,
    _temp_handle: Option<TempPath>,
}

impl AsRef<Path> for DecompressedImage {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// Decompresses an image to a temporary file if necessary.
fn decompress_image(input_path: &Path) -> io::Result<DecompressedImage> {
    let ext = input_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let input_file = File::open(input_path)?;

    // Create a reader based on the file extension.
    let mut reader: Box<dyn Read> = match ext.as_str() {
        "gz" | "gzip" => Box::new(GzDecoder::new(BufReader::new(input_file))),
        "xz" => Box::new(XzDecoder::new(BufReader::new(input_file))),
        "zst" | "zstd" => Box::new(ZstdDecoder::new(BufReader::new(input_file))?),
        // Not a compressed file, return a path to the original.
        _ => {
            return Ok(DecompressedImage {
                path: input_path.to_path_buf(),
                _temp_handle: None,
            });
        }
    };

    info!("Decompressing {} ({ext})", input_path.display());
    let mut temp_file = NamedTempFile::new()?;
    {
        let mut writer = BufWriter::new(&mut temp_file);
        let total = io::copy(&mut reader, &mut writer)?;
        writer.flush()?;
        debug!("Decompressed {total} bytes");
    }

    // Hand over ownership of the temp file to the DecompressedImage struct.
    let temp_path = temp_file.into_temp_path();
    Ok(DecompressedImage {
        path: temp_path.to_path_buf(),
        _temp_handle: Some(temp_path),
    })
}

/// Returns the size of `path` in bytes if it is a block device.
#[cfg(target_os = "linux")]
fn device_capacity(path: &Path) -> Result<Option<u64>> {
    use std::os::unix::fs::FileTypeExt;
    use std::os::unix::io::AsRawFd;

    let file = File::open(path)?;
    if !file.metadata()?.file_type().is_block_device() {
        return Ok(None);
    }

    let mut size_bytes: u64 = 0;
    // SAFETY: the descriptor stays open for the duration of the call and
    // BLKGETSIZE64 writes exactly one u64.
    unsafe {
        blkgetsize64(file.as_raw_fd(), &mut size_bytes)?;
    }
    Ok(Some(size_bytes))
}

#[cfg(not(target_os = "linux"))]
fn device_capacity(_path: &Path) -> Result<Option<u64>> {
    Ok(None)
}

/// Opens the target for writing, bypassing the page cache where the kernel
/// allows it. Returns whether direct I/O is in effect.
fn open_target(path: &Path) -> io::Result<(File, bool)> {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::fs::OpenOptionsExt;

        match OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_DIRECT)
            .open(path)
        {
            Ok(file) => return Ok((file, true)),
            // Some filesystems (tmpfs, overlayfs) refuse O_DIRECT.
            Err(e) if e.raw_os_error() == Some(libc::EINVAL) => {
                debug!(
                    "{} does not support O_DIRECT, using buffered writes",
                    path.display()
                );
            }
            Err(e) => return Err(e),
        }
    }

    Ok((OpenOptions::new().write(true).open(path)?, false))
}

struct Written {
    checksum: String,
    range_checksums: Vec<String>,
}

fn write_ranges<F>(
    source: &mut File,
    target: &mut File,
    direct: bool,
    ranges: &[Range<u64>],
    on_progress: &mut F,
) -> Result<Written>
where
    F: FnMut(ProgressEvent),
{
    let total = ranges.iter().map(|r| r.end - r.start).sum();
    let meter = ProgressMeter::start(Phase::Write, total);

    // Align buffer to the sector size for O_DIRECT compatibility.
    let mut buf = vec![0u8; BUFFER_SIZE + SECTOR_SIZE];
    let offset = buf.as_ptr().align_offset(SECTOR_SIZE);
    let buffer = &mut buf[offset..offset + BUFFER_SIZE];

    let mut image_hasher = Sha256::new();
    let mut range_checksums = Vec::with_capacity(ranges.len());
    let mut written: u64 = 0;

    for range in ranges {
        source.seek(SeekFrom::Start(range.start))?;
        target.seek(SeekFrom::Start(range.start))?;

        let mut range_hasher = Sha256::new();
        let mut position = range.start;
        while position < range.end {
            let to_read = std::cmp::min(BUFFER_SIZE as u64, range.end - position) as usize;
            source.read_exact(&mut buffer[..to_read])?;
            image_hasher.update(&buffer[..to_read]);
            range_hasher.update(&buffer[..to_read]);

            // The last chunk of data may not be a multiple of the sector size.
            // We need to pad it with zeros to satisfy O_DIRECT requirements.
            let padded_size = if direct && to_read % SECTOR_SIZE != 0 {
                let pad = to_read.div_ceil(SECTOR_SIZE) * SECTOR_SIZE;
                buffer[to_read..pad].fill(0);
                pad
            } else {
                to_read
            };

            target
                .write_all(&buffer[..padded_size])
                .with_context(|| format!("Failed to write to the device at offset {position}"))?;

            position += to_read as u64;
            written += to_read as u64;
            on_progress(meter.event(written));
        }

        range_checksums.push(format!("{:x}", range_hasher.finalize()));
    }

    target.flush()?;
    target.sync_all().context("Failed to flush the device")?;

    Ok(Written {
        checksum: format!("{:x}", image_hasher.finalize()),
        range_checksums,
    })
}

fn verify_ranges<F>(
    device_path: &Path,
    ranges: &[Range<u64>],
    expected: &[String],
    on_progress: &mut F,
) -> Result<bool>
where
    F: FnMut(ProgressEvent),
{
    let mut device_file = File::open(device_path)
        .with_context(|| format!("Failed to open {} for validation", device_path.display()))?;

    let total = ranges.iter().map(|r| r.end - r.start).sum();
    let meter = ProgressMeter::start(Phase::Check, total);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut verified: u64 = 0;
    let mut passed = true;

    for (range, expected) in ranges.iter().zip(expected) {
        device_file.seek(SeekFrom::Start(range.start))?;

        let mut device_hasher = Sha256::new();
        let mut remaining = range.end - range.start;
        while remaining > 0 {
            let chunk = std::cmp::min(BUFFER_SIZE as u64, remaining) as usize;
            device_file.read_exact(&mut buffer[..chunk])?;
            device_hasher.update(&buffer[..chunk]);

            remaining -= chunk as u64;
            verified += chunk as u64;
            on_progress(meter.event(verified));
        }

        let actual = format!("{:x}", device_hasher.finalize());
        if actual != *expected {
            info!(
                "Bytes {}..{} do not match: expected {expected}, read {actual}",
                range.start, range.end
            );
            passed = false;
        }
    }

    Ok(passed)
}

/// Writes an image file to a block device, with optional validation.
///
/// This is the main entry point of the flash engine. It runs the decompression,
/// write and validation stages, reporting progress for the write and
/// validation stages via `on_progress`.
///
/// # Arguments
///
/// * `image_path` - Path to the source image file. Can be compressed.
/// * `device` - The target device.
/// * `options` - Validation, unmount and block-map settings.
/// * `on_progress` - Closure called with a [`ProgressEvent`] after every chunk.
///
/// # Errors
///
/// This function will return an error if:
/// - The block map cannot be parsed or does not describe this image.
/// - The image does not fit on the device.
/// - The image file or device cannot be accessed.
/// - An I/O error occurs during any stage.
/// - The device cannot be unmounted afterwards.
///
/// A read-back that does not match is not an error; it is reported through
/// [`FlashResult::passed_validation`].
pub fn run<F>(
    image_path: &Path,
    device: &Device,
    options: &WriteOptions,
    mut on_progress: F,
) -> Result<FlashResult>
where
    F: FnMut(ProgressEvent),
{
    let block_map = options
        .bmap_contents
        .as_deref()
        .map(BlockMap::parse)
        .transpose()
        .context("Failed to parse the block map")?;

    let image = decompress_image(image_path)
        .with_context(|| format!("Failed to open image {}", image_path.display()))?;
    let mut image_file = File::open(&image)?;
    let image_len = image_file.metadata()?.len();

    let ranges: Vec<Range<u64>> = match &block_map {
        Some(map) => {
            if map.image_size > image_len {
                bail!(
                    "The block map describes a {} byte image, but {} is only {} bytes",
                    map.image_size,
                    image_path.display(),
                    image_len
                );
            }
            info!(
                "Using block map: {} of {} bytes mapped",
                map.mapped_bytes(),
                map.image_size
            );
            map.ranges.iter().map(|r| map.byte_range(r)).collect()
        }
        None => vec![0..image_len],
    };

    let required = ranges.iter().map(|r| r.end).max().unwrap_or(0);
    if let Some(capacity) = device_capacity(&device.path)? {
        debug!("{} holds {capacity} bytes", device.path.display());
        if capacity < required {
            bail!(
                "The image needs {required} bytes, but {} only holds {capacity}",
                device.path.display()
            );
        }
    }

    let (mut device_file, direct) = open_target(&device.path)
        .with_context(|| format!("Failed to open {} for writing", device.path.display()))?;

    info!(
        "Writing {} to {}",
        image_path.display(),
        device.path.display()
    );
    let written = write_ranges(
        &mut image_file,
        &mut device_file,
        direct,
        &ranges,
        &mut on_progress,
    )?;
    drop(device_file);

    let passed_validation = if options.validate_write_on_success {
        let expected: Vec<String> = match &block_map {
            Some(map) => map
                .ranges
                .iter()
                .zip(&written.range_checksums)
                .map(|(range, source)| range.checksum.clone().unwrap_or_else(|| source.clone()))
                .collect(),
            None => written.range_checksums.clone(),
        };
        let passed = verify_ranges(&device.path, &ranges, &expected, &mut on_progress)?;
        info!("Validation {}", if passed { "passed" } else { "failed" });
        passed
    } else {
        true
    };

    if options.unmount_on_success {
        platform::unmount(device)
            .with_context(|| format!("Failed to unmount {}", device.path.display()))?;
    }

    Ok(FlashResult {
        passed_validation,
        source_checksum: written.checksum,
    })
}
