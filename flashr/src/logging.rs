use crate::output::Mode;
use env_logger::{Builder, Target};
use log::{LevelFilter, warn};
use std::fs::OpenOptions;
use std::path::Path;

/// Sets up the global logger.
///
/// Logs go to `log_file` when one is given and can be opened, to stderr
/// otherwise. Only warnings are shown unless `RUST_LOG` asks for more. In
/// robot mode stderr carries JSON lines, so nothing is logged there unless
/// `RUST_LOG` says otherwise.
pub fn init(mode: Mode, log_file: Option<&Path>) {
    let mut open_error = None;
    let target = match log_file {
        Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Target::Pipe(Box::new(file)),
            Err(e) => {
                open_error = Some((path, e));
                Target::Stderr
            }
        },
        None => Target::Stderr,
    };
    let to_file = matches!(target, Target::Pipe(_));

    builder(mode, to_file).parse_default_env().target(target).init();

    if let Some((path, e)) = open_error {
        warn!("Could not open log file {}: {e}", path.display());
    }
}

fn builder(mode: Mode, to_file: bool) -> Builder {
    let mut builder = Builder::new();
    builder.filter_level(default_level(mode, to_file));
    builder
}

fn default_level(mode: Mode, to_file: bool) -> LevelFilter {
    match (mode, to_file) {
        (Mode::Robot, false) => LevelFilter::Off,
        _ => LevelFilter::Warn,
    }
}
