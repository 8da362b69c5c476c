//! Turns the engine's progress events into something a user or a program can follow.
use crate::output::{Mode, Output};
use crate::robot::RobotMessage;
use flashr_core::{Phase, ProgressEvent};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::io::Write;

pub struct ProgressTranslator<'a, O: Write, E: Write> {
    output: &'a mut Output<O, E>,
    bars: HashMap<Phase, ProgressBar>,
    updates: usize,
}

impl<'a, O: Write, E: Write> ProgressTranslator<'a, O, E> {
    pub fn new(output: &'a mut Output<O, E>) -> Self {
        Self {
            output,
            bars: HashMap::new(),
            updates: 0,
        }
    }

    /// Reports one event. Every call results in exactly one bar update or one
    /// robot line.
    pub fn on_progress(&mut self, event: &ProgressEvent) {
        self.updates += 1;

        match self.output.mode() {
            Mode::Robot => self.output.robot(&RobotMessage::progress(event)),
            Mode::Interactive => {
                if !self.bars.contains_key(&event.phase) {
                    // A new phase starts once the previous one is done.
                    for bar in self.bars.values() {
                        if !bar.is_finished() {
                            bar.finish();
                        }
                    }
                    let bar = new_bar(event.phase, self.output.bar_target());
                    self.bars.insert(event.phase, bar);
                }

                let bar = &self.bars[&event.phase];
                bar.set_position(u64::from(event.percentage()));
                bar.set_message(format!("{:.1} MB/s, ETA {}s", event.speed, event.eta));
            }
        }
    }

    /// Number of events reported so far.
    pub fn updates(&self) -> usize {
        self.updates
    }

    /// Settles every bar so the terminal is left clean for the final report.
    pub fn finish(self, succeeded: bool) {
        for bar in self.bars.values() {
            if succeeded {
                bar.finish();
            } else {
                bar.finish_and_clear();
            }
        }
    }
}

fn new_bar(phase: Phase, target: ProgressDrawTarget) -> ProgressBar {
    let (label, color) = match phase {
        Phase::Write => ("Flashing", "green"),
        Phase::Check => ("Validating", "magenta"),
    };

    let bar = ProgressBar::with_draw_target(Some(100), target);
    bar.set_prefix(label);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{prefix:12}} [{{elapsed_precise}}] [{{bar:40.{color}/black}}] {{pos:>3}}% ({{msg}})"
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("■ "),
    );
    bar
}
