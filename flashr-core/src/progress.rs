//! Progress events emitted while a flash is running.
use std::time::Instant;

const BYTES_PER_MEGABYTE: f64 = 1_000_000.0;

/// The stage of a flash a [`ProgressEvent`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Image data is being written to the device.
    Write,
    /// Written data is being read back and compared.
    Check,
}

impl Phase {
    /// The tag used for this phase in machine-readable output.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Write => "write",
            Phase::Check => "check",
        }
    }
}

/// A snapshot of a running phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    pub phase: Phase,
    /// Completed share of the phase, in `[0, 1]`.
    pub fraction: f64,
    /// Estimated seconds until the phase completes.
    pub eta: u64,
    /// Throughput in megabytes per second.
    pub speed: f64,
}

impl ProgressEvent {
    /// The completed share as a whole percentage, rounded down and kept within `0..=100`.
    pub fn percentage(&self) -> u8 {
        (self.fraction * 100.0).floor().clamp(0.0, 100.0) as u8
    }
}

/// Turns a running byte count into [`ProgressEvent`]s for one phase.
pub(crate) struct ProgressMeter {
    phase: Phase,
    total: u64,
    started: Instant,
}

impl ProgressMeter {
    pub(crate) fn start(phase: Phase, total: u64) -> Self {
        Self {
            phase,
            total,
            started: Instant::now(),
        }
    }

    pub(crate) fn event(&self, done: u64) -> ProgressEvent {
        let fraction = if self.total == 0 {
            1.0
        } else {
            done.min(self.total) as f64 / self.total as f64
        };

        let elapsed = self.started.elapsed().as_secs_f64();
        let bytes_per_sec = if elapsed > 0.0 {
            done as f64 / elapsed
        } else {
            0.0
        };
        let eta = if bytes_per_sec > 0.0 {
            (self.total.saturating_sub(done) as f64 / bytes_per_sec).ceil() as u64
        } else {
            0
        };

        ProgressEvent {
            phase: self.phase,
            fraction,
            eta,
            speed: bytes_per_sec / BYTES_PER_MEGABYTE,
        }
    }
}
