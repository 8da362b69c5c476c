//! The error value handed back to front-ends when a flash fails.
use std::io;
use thiserror::Error;

/// A terminal failure of a flash run.
///
/// Carries a one-line `message`, an optional longer `description` (usually the
/// chain of underlying causes) and an optional machine-readable `code` such as
/// `EACCES` when an OS error is at the root of the failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FlashError {
    pub message: String,
    pub description: Option<String>,
    pub code: Option<String>,
}

impl FlashError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            description: None,
            code: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl From<anyhow::Error> for FlashError {
    fn from(err: anyhow::Error) -> Self {
        let code = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<io::Error>())
            .and_then(io_error_code);
        let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();

        Self {
            message: err.to_string(),
            description: (!causes.is_empty()).then(|| causes.join(": ")),
            code,
        }
    }
}

/// Returns the errno name (e.g. `ENOSPC`) of an I/O error that wraps an OS error.
pub fn io_error_code(err: &io::Error) -> Option<String> {
    #[cfg(unix)]
    {
        err.raw_os_error()
            .map(|raw| format!("{:?}", nix::errno::Errno::from_raw(raw)))
    }
    #[cfg(not(unix))]
    {
        let _ = err;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[cfg(unix)]
    #[test]
    fn keeps_outer_message_and_cause_chain() {
        let err = Err::<(), _>(io::Error::from_raw_os_error(libc::EACCES))
            .context("Failed to open /dev/sdz for writing")
            .unwrap_err();

        let flash_error = FlashError::from(err);
        assert_eq!(flash_error.message, "Failed to open /dev/sdz for writing");
        assert!(flash_error.description.is_some());
        assert_eq!(flash_error.code.as_deref(), Some("EACCES"));
    }

    #[test]
    fn plain_errors_have_no_code() {
        let flash_error = FlashError::from(anyhow::anyhow!("Block map is not valid XML"));
        assert_eq!(flash_error.message, "Block map is not valid XML");
        assert_eq!(flash_error.description, None);
        assert_eq!(flash_error.code, None);
    }
}
