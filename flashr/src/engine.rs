//! The device catalog and flash engine the orchestrator drives.
//!
//! Both are traits so a run can be exercised without real hardware. The
//! system implementations run the blocking work of `flashr-core` on tokio's
//! blocking pool.
use anyhow::Result;
use flashr_core::write::{self, WriteOptions};
use flashr_core::{Device, FlashError, FlashResult, ProgressEvent, platform};
use std::path::Path;
use tokio::sync::mpsc::UnboundedSender;

#[allow(async_fn_in_trait)]
pub trait DeviceCatalog {
    async fn list(&self) -> Result<Vec<Device>>;
}

#[allow(async_fn_in_trait)]
pub trait FlashEngine {
    /// Flashes `source` onto `device`, sending progress on `progress` as it
    /// goes. The sender is dropped when the flash is over.
    async fn write(
        &self,
        source: &Path,
        device: &Device,
        options: WriteOptions,
        progress: UnboundedSender<ProgressEvent>,
    ) -> Result<FlashResult, FlashError>;
}

/// The removable devices attached to this machine.
pub struct SystemCatalog;

impl DeviceCatalog for SystemCatalog {
    async fn list(&self) -> Result<Vec<Device>> {
        tokio::task::spawn_blocking(platform::get_removable_devices).await?
    }
}

/// Writes images with [`flashr_core::write::run`].
pub struct ImageWriter;

impl FlashEngine for ImageWriter {
    async fn write(
        &self,
        source: &Path,
        device: &Device,
        options: WriteOptions,
        progress: UnboundedSender<ProgressEvent>,
    ) -> Result<FlashResult, FlashError> {
        let source = source.to_path_buf();
        let device = device.clone();

        let task = tokio::task::spawn_blocking(move || {
            write::run(&source, &device, &options, |event| {
                // An unbounded send never blocks the writer; it only fails
                // once nobody is listening anymore.
                progress.send(event).ok();
            })
        });

        match task.await {
            Ok(result) => result.map_err(FlashError::from),
            Err(e) => Err(FlashError::new("The flash stopped unexpectedly").with_description(e.to_string())),
        }
    }
}
