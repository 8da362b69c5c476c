//! The core, UI-agnostic library for the `flashr` disk imaging utility.
//!
//! `flashr-core` is designed to be used as a library by any front-end, whether it's
//! a command-line interface (like `flashr`) or a graphical user interface. It
//! handles device discovery, image decompression, block-map aware writes,
//! high-speed I/O, and validation.
//!
//! The library is structured into several key modules:
//! - [`device`]: Contains the cross-platform `Device` struct.
//! - [`platform`]: Provides platform-specific logic for discovering removable
//!   block devices and unmounting them.
//! - [`mod@write`]: The flash engine, which writes an image file to a device.
//! - [`bmap`]: Parses bmaptool block maps so sparse images can be written partially.
//! - [`progress`]: The progress events the engine emits while it runs.
//! - [`error`]: The [`FlashError`] value front-ends report when a flash fails.
//!
//! The primary entry point is [`write::run`]. It blocks until the flash has
//! finished and reports its progress via a callback, allowing the calling
//! application to display progress in any way it chooses.
//!
//! ## Example: Writing an Image with Progress Reporting
//!
//! ```rust,no_run
//! use flashr_core::{platform, write::{self, WriteOptions}};
//! use std::path::Path;
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let image_path = Path::new("path/to/image.img.xz");
//!     let devices = platform::get_removable_devices()?;
//!     let device = devices.first().expect("No removable devices found.");
//!
//!     let options = WriteOptions {
//!         validate_write_on_success: true,
//!         ..WriteOptions::default()
//!     };
//!
//!     let result = write::run(image_path, device, &options, |event| {
//!         println!("{}: {}%", event.phase.as_str(), event.percentage());
//!     })?;
//!
//!     println!("Checksum: {}", result.source_checksum);
//!     Ok(())
//! }
//! ```

pub mod bmap;
pub mod device;
pub mod error;
pub mod platform;
pub mod progress;
pub mod write;

pub use device::Device;
pub use error::FlashError;
pub use progress::{Phase, ProgressEvent};
pub use write::{FlashResult, WriteOptions};
