//! Final reporting of a run and the exit code that goes with it.
use crate::output::{Mode, Output};
use crate::robot::RobotMessage;
use console::style;
use flashr_core::{FlashError, FlashResult};
use std::io::Write;

/// How the process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    GeneralError,
    ValidationError,
}

impl ExitCode {
    pub const fn code(self) -> u8 {
        match self {
            ExitCode::Success => 0,
            ExitCode::GeneralError => 1,
            ExitCode::ValidationError => 2,
        }
    }

    pub fn for_outcome(outcome: &Result<FlashResult, FlashError>) -> Self {
        match outcome {
            Ok(result) if result.passed_validation => ExitCode::Success,
            Ok(_) => ExitCode::ValidationError,
            Err(_) => ExitCode::GeneralError,
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.code())
    }
}

/// Emits the one report of a run and returns the code to exit with.
///
/// A write whose read-back did not match is reported as a result, not an
/// error: the checksum is still known, only the exit code differs.
pub fn report<O: Write, E: Write>(
    outcome: Result<FlashResult, FlashError>,
    output: &mut Output<O, E>,
) -> ExitCode {
    match (&outcome, output.mode()) {
        (Ok(result), Mode::Robot) => output.robot(&RobotMessage::done(result)),
        (Err(error), Mode::Robot) => output.robot(&RobotMessage::error(error)),
        (Ok(result), Mode::Interactive) if result.passed_validation => {
            output.say(format!("\n✨ {}", style("Your flash is complete!").green().bold()));
            output.say(format!("Checksum: {}", style(&result.source_checksum).cyan()));
        }
        (Ok(_), Mode::Interactive) => {
            output.complain(style("Validation failed!").red().bold().for_stderr());
        }
        (Err(error), Mode::Interactive) => print_error(error, output),
    }

    ExitCode::for_outcome(&outcome)
}

fn print_error<O: Write, E: Write>(error: &FlashError, output: &mut Output<O, E>) {
    output.complain(format!(
        "{} {}",
        style("Error:").red().bold().for_stderr(),
        error.message
    ));
    if let Some(description) = &error.description {
        output.complain(format!("  {description}"));
    }
    if let Some(code) = &error.code {
        output.complain(format!("  Code: {code}"));
    }
}
