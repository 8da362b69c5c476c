//! Run configuration, resolved once from the command line.
use crate::gate::Overrides;
use crate::output::Mode;
use flashr_core::WriteOptions;
use std::path::PathBuf;

/// A pre-set answer to "are you sure?".
///
/// `Declined` is kept apart from `Unset` so that the caller's intent is not
/// lost, but the two behave the same: neither suppresses the prompt. Only an
/// affirmative answer is allowed to skip it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Confirmation {
    #[default]
    Unset,
    Declined,
    Affirmed,
}

impl Confirmation {
    /// The value handed to the confirmation gate.
    pub fn as_override(self) -> Option<bool> {
        match self {
            Confirmation::Affirmed => Some(true),
            Confirmation::Unset | Confirmation::Declined => None,
        }
    }
}

impl From<Option<bool>> for Confirmation {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Confirmation::Unset,
            Some(false) => Confirmation::Declined,
            Some(true) => Confirmation::Affirmed,
        }
    }
}

/// Everything a run needs to know before it starts.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Image file to write.
    pub source: PathBuf,
    /// Block map describing the image's mapped ranges.
    pub bmap: Option<PathBuf>,
    /// Unmount the device once the flash succeeds.
    pub unmount: bool,
    /// Read the device back after writing.
    pub check: bool,
    /// Emit JSON lines instead of human-oriented output.
    pub robot: bool,
    /// Pre-selected device identifier.
    pub drive: Option<String>,
    pub yes: Confirmation,
}

impl RunOptions {
    pub fn mode(&self) -> Mode {
        if self.robot {
            Mode::Robot
        } else {
            Mode::Interactive
        }
    }

    /// The answers the gate must not ask for. Robot runs are never asked to confirm.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            drive: self.drive.clone(),
            yes: if self.robot {
                Some(true)
            } else {
                self.yes.as_override()
            },
        }
    }

    pub fn write_options(&self, bmap_contents: Option<String>) -> WriteOptions {
        WriteOptions {
            unmount_on_success: self.unmount,
            validate_write_on_success: self.check,
            bmap_contents,
        }
    }
}
