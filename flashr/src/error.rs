use flashr_core::FlashError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a run stopped before producing a result.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Aborted")]
    UserAborted,

    #[error("Drive not found: {drive}")]
    DeviceNotFound { drive: String },

    #[error("Could not read block map {}", .path.display())]
    BlockMapRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not list devices: {0}")]
    Enumeration(anyhow::Error),

    #[error("Could not ask for confirmation: {0}")]
    Prompt(anyhow::Error),

    #[error(transparent)]
    Engine(#[from] FlashError),
}

impl From<RunError> for FlashError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Engine(error) => error,
            RunError::Enumeration(source) => FlashError::from(source.context("Could not list devices")),
            RunError::Prompt(source) => {
                FlashError::from(source.context("Could not ask for confirmation"))
            }
            other => FlashError::from(anyhow::Error::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_and_missing_drive_carry_only_a_message() {
        let aborted = FlashError::from(RunError::UserAborted);
        assert_eq!(aborted, FlashError::new("Aborted"));

        let missing = FlashError::from(RunError::DeviceNotFound {
            drive: "/dev/missing".to_string(),
        });
        assert_eq!(missing.message, "Drive not found: /dev/missing");
        assert_eq!(missing.code, None);
    }

    #[test]
    fn block_map_read_keeps_the_os_error() {
        let error = FlashError::from(RunError::BlockMapRead {
            path: PathBuf::from("disk.bmap"),
            source: io::Error::from(io::ErrorKind::NotFound),
        });
        assert_eq!(error.message, "Could not read block map disk.bmap");
        assert!(error.description.is_some());
    }

    #[test]
    fn engine_errors_pass_through_unchanged() {
        let original = FlashError::new("write failed").with_code("EIO");
        assert_eq!(FlashError::from(RunError::Engine(original.clone())), original);
    }

    #[test]
    fn collaborator_failures_keep_their_cause() {
        let error = FlashError::from(RunError::Enumeration(anyhow::anyhow!("no /sys/block")));
        assert_eq!(error.message, "Could not list devices");
        assert_eq!(error.description.as_deref(), Some("no /sys/block"));
    }
}
