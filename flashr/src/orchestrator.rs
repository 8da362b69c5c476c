//! Sequences a run: confirm, resolve the device, flash, report.
//!
//! ```text
//! Start → Confirming → {Aborted | Resolving} → {DeviceMissing | Flashing}
//!       → {Flashed(Result) | Flashed(Error)} → Reporting → Exited
//! ```
//!
//! Every step that fails short-circuits to reporting; nothing is retried.
use crate::engine::{DeviceCatalog, FlashEngine};
use crate::error::RunError;
use crate::gate::ConfirmationGate;
use crate::options::RunOptions;
use crate::output::Output;
use crate::progress::ProgressTranslator;
use crate::report::{self, ExitCode};
use flashr_core::{FlashError, FlashResult};
use log::{debug, info};
use std::io::Write;
use std::path::Path;
use tokio::sync::mpsc;

pub struct Orchestrator<G, C, F> {
    gate: G,
    catalog: C,
    engine: F,
}

impl<G, C, F> Orchestrator<G, C, F>
where
    G: ConfirmationGate,
    C: DeviceCatalog,
    F: FlashEngine,
{
    pub fn new(gate: G, catalog: C, engine: F) -> Self {
        Self {
            gate,
            catalog,
            engine,
        }
    }

    /// Runs one flash to completion and reports it exactly once.
    ///
    /// Returns the code the process should exit with. The caller is expected
    /// to close `output` before exiting.
    pub async fn run<O: Write, E: Write>(
        &self,
        options: &RunOptions,
        output: &mut Output<O, E>,
    ) -> ExitCode {
        let outcome = self.flash(options, output).await.map_err(FlashError::from);
        let code = report::report(outcome, output);
        debug!("Exiting with {code:?}");
        code
    }

    async fn flash<O: Write, E: Write>(
        &self,
        options: &RunOptions,
        output: &mut Output<O, E>,
    ) -> Result<FlashResult, RunError> {
        let answers = self
            .gate
            .prompt(&options.overrides())
            .map_err(RunError::Prompt)?;
        if !answers.yes {
            return Err(RunError::UserAborted);
        }

        // Both inputs are needed before the drive can be resolved.
        let (devices, bmap_contents) = tokio::try_join!(
            async { self.catalog.list().await.map_err(RunError::Enumeration) },
            read_block_map(options.bmap.as_deref()),
        )?;

        let device = devices
            .into_iter()
            .find(|d| d.has_id(&answers.drive))
            .ok_or_else(|| RunError::DeviceNotFound {
                drive: answers.drive.clone(),
            })?;

        info!(
            "Flashing {} to {}",
            options.source.display(),
            device.path.display()
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut translator = ProgressTranslator::new(output);

        let write = self.engine.write(
            &options.source,
            &device,
            options.write_options(bmap_contents),
            tx,
        );
        let drain = async {
            while let Some(event) = rx.recv().await {
                translator.on_progress(&event);
            }
        };
        let (result, ()) = tokio::join!(write, drain);

        debug!("Reported {} progress events", translator.updates());
        translator.finish(result.is_ok());

        result.map_err(RunError::Engine)
    }
}

async fn read_block_map(path: Option<&Path>) -> Result<Option<String>, RunError> {
    let Some(path) = path else {
        return Ok(None);
    };

    tokio::fs::read_to_string(path)
        .await
        .map(Some)
        .map_err(|source| RunError::BlockMapRead {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{Answers, Overrides};
    use crate::options::Confirmation;
    use crate::output::{Captured, captured};
    use anyhow::{Result, anyhow};
    use flashr_core::{Device, Phase, ProgressEvent, WriteOptions};
    use std::cell::{Cell, RefCell};
    use std::path::PathBuf;
    use tokio::sync::mpsc::UnboundedSender;

    struct FakeGate {
        answers: Answers,
        seen: RefCell<Option<Overrides>>,
    }

    impl ConfirmationGate for FakeGate {
        fn prompt(&self, overrides: &Overrides) -> Result<Answers> {
            *self.seen.borrow_mut() = Some(overrides.clone());
            Ok(self.answers.clone())
        }
    }

    struct FakeCatalog {
        devices: Result<Vec<Device>, String>,
        calls: Cell<usize>,
    }

    impl DeviceCatalog for FakeCatalog {
        async fn list(&self) -> Result<Vec<Device>> {
            self.calls.set(self.calls.get() + 1);
            self.devices.clone().map_err(|e| anyhow!(e))
        }
    }

    struct FakeEngine {
        events: Vec<ProgressEvent>,
        outcome: Result<FlashResult, FlashError>,
        calls: Cell<usize>,
        options: RefCell<Option<WriteOptions>>,
    }

    impl FlashEngine for FakeEngine {
        async fn write(
            &self,
            _source: &Path,
            device: &Device,
            options: WriteOptions,
            progress: UnboundedSender<ProgressEvent>,
        ) -> Result<FlashResult, FlashError> {
            assert_eq!(device.path, PathBuf::from("/dev/sdz"));
            self.calls.set(self.calls.get() + 1);
            *self.options.borrow_mut() = Some(options);
            for event in &self.events {
                progress.send(*event).unwrap();
            }
            self.outcome.clone()
        }
    }

    type Harness = Orchestrator<FakeGate, FakeCatalog, FakeEngine>;

    fn sdz() -> Device {
        Device {
            path: PathBuf::from("/dev/sdz"),
            name: "sdz".to_string(),
            size_gb: 7.5,
            mount_point: String::new(),
        }
    }

    fn harness(drive: &str, yes: bool, outcome: Result<FlashResult, FlashError>) -> Harness {
        Orchestrator::new(
            FakeGate {
                answers: Answers {
                    drive: drive.to_string(),
                    yes,
                },
                seen: RefCell::new(None),
            },
            FakeCatalog {
                devices: Ok(vec![sdz()]),
                calls: Cell::new(0),
            },
            FakeEngine {
                events: Vec::new(),
                outcome,
                calls: Cell::new(0),
                options: RefCell::new(None),
            },
        )
    }

    fn flashed(passed_validation: bool) -> Result<FlashResult, FlashError> {
        Ok(FlashResult {
            passed_validation,
            source_checksum: "abc123".to_string(),
        })
    }

    fn options(drive: &str, yes: bool) -> RunOptions {
        RunOptions {
            source: PathBuf::from("disk.img"),
            drive: Some(drive.to_string()),
            yes: Some(yes).into(),
            ..RunOptions::default()
        }
    }

    async fn run(harness: &Harness, options: &RunOptions) -> (ExitCode, Captured) {
        let mut output = captured(options.mode());
        let code = harness.run(options, &mut output).await;
        (code, output)
    }

    #[tokio::test]
    async fn confirmed_flash_succeeds() {
        let harness = harness("/dev/sdz", true, flashed(true));
        let (code, output) = run(&harness, &options("/dev/sdz", true)).await;

        assert_eq!(code, ExitCode::Success);
        assert!(output.out().contains("Your flash is complete!"));
        assert!(output.out().contains("abc123"));
        assert!(output.err().is_empty());
        assert_eq!(harness.engine.calls.get(), 1);
        assert_eq!(
            *harness.gate.seen.borrow(),
            Some(Overrides {
                drive: Some("/dev/sdz".to_string()),
                yes: Some(true),
            })
        );
    }

    #[tokio::test]
    async fn failed_validation_has_its_own_exit_code() {
        let harness = harness("/dev/sdz", true, flashed(false));
        let (code, output) = run(&harness, &options("/dev/sdz", true)).await;

        assert_eq!(code, ExitCode::ValidationError);
        assert!(output.err().contains("Validation failed!"));
        assert!(!output.out().contains("complete"));
    }

    #[tokio::test]
    async fn declined_confirmation_touches_nothing() {
        let harness = harness("/dev/sdz", false, flashed(true));
        let (code, output) = run(&harness, &options("/dev/sdz", false)).await;

        assert_eq!(code, ExitCode::GeneralError);
        assert!(output.err().contains("Aborted"));
        assert_eq!(harness.catalog.calls.get(), 0);
        assert_eq!(harness.engine.calls.get(), 0);
        // An explicit `false` must not be passed on as an answer.
        assert_eq!(harness.gate.seen.borrow().as_ref().unwrap().yes, None);
    }

    #[tokio::test]
    async fn unknown_drive_is_named_in_the_error() {
        let harness = harness("/dev/missing", true, flashed(true));
        let (code, output) = run(&harness, &options("/dev/missing", true)).await;

        assert_eq!(code, ExitCode::GeneralError);
        assert!(output.err().contains("/dev/missing"));
        assert_eq!(harness.engine.calls.get(), 0);
    }

    #[tokio::test]
    async fn catalog_failure_is_reported() {
        let mut harness = harness("/dev/sdz", true, flashed(true));
        harness.catalog.devices = Err("no /sys/block".to_string());
        let (code, output) = run(&harness, &options("/dev/sdz", true)).await;

        assert_eq!(code, ExitCode::GeneralError);
        assert!(output.err().contains("Could not list devices"));
        assert_eq!(harness.engine.calls.get(), 0);
    }

    #[tokio::test]
    async fn robot_run_streams_progress_then_done() {
        let mut harness = harness("/dev/sdz", true, flashed(true));
        harness.engine.events = vec![
            ProgressEvent {
                phase: Phase::Write,
                fraction: 0.4567,
                eta: 30,
                speed: 12.9,
            },
            ProgressEvent {
                phase: Phase::Write,
                fraction: 1.0,
                eta: 0,
                speed: 13.2,
            },
            ProgressEvent {
                phase: Phase::Check,
                fraction: 1.0,
                eta: 0,
                speed: 40.0,
            },
        ];
        let options = RunOptions {
            robot: true,
            yes: Confirmation::Unset,
            ..options("/dev/sdz", false)
        };
        let (code, output) = run(&harness, &options).await;

        assert_eq!(code, ExitCode::Success);
        let out = output.out();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"command":"progress","data":{"type":"write","percentage":45,"eta":30,"speed":12}}"#,
                r#"{"command":"progress","data":{"type":"write","percentage":100,"eta":0,"speed":13}}"#,
                r#"{"command":"progress","data":{"type":"check","percentage":100,"eta":0,"speed":40}}"#,
                r#"{"command":"done","data":{"passedValidation":true,"sourceChecksum":"abc123"}}"#,
            ]
        );
        assert!(output.err().is_empty());
    }

    #[tokio::test]
    async fn robot_engine_failure_is_one_error_line() {
        let error = FlashError::new("Failed to open /dev/sdz for writing").with_code("EACCES");
        let harness = harness("/dev/sdz", true, Err(error));
        let options = RunOptions {
            robot: true,
            ..options("/dev/sdz", true)
        };
        let (code, output) = run(&harness, &options).await;

        assert_eq!(code, ExitCode::GeneralError);
        assert!(output.out().is_empty());
        assert_eq!(
            output.err(),
            "{\"command\":\"error\",\"data\":{\"message\":\"Failed to open /dev/sdz for writing\",\"description\":null,\"code\":\"EACCES\"}}\n"
        );
    }

    #[tokio::test]
    async fn block_map_contents_reach_the_engine() {
        let dir = tempfile::tempdir().unwrap();
        let bmap = dir.path().join("disk.bmap");
        std::fs::write(&bmap, "<bmap version=\"2.0\"/>").unwrap();

        let harness = harness("/dev/sdz", true, flashed(true));
        let options = RunOptions {
            bmap: Some(bmap),
            check: true,
            ..options("/dev/sdz", true)
        };
        let (code, _) = run(&harness, &options).await;

        assert_eq!(code, ExitCode::Success);
        let seen = harness.engine.options.borrow().clone().unwrap();
        assert_eq!(seen.bmap_contents.as_deref(), Some("<bmap version=\"2.0\"/>"));
        assert!(seen.validate_write_on_success);
        assert!(!seen.unmount_on_success);
    }

    #[tokio::test]
    async fn unreadable_block_map_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let harness = harness("/dev/sdz", true, flashed(true));
        let options = RunOptions {
            bmap: Some(dir.path().join("missing.bmap")),
            robot: true,
            ..options("/dev/sdz", true)
        };
        let (code, output) = run(&harness, &options).await;

        assert_eq!(code, ExitCode::GeneralError);
        assert_eq!(harness.engine.calls.get(), 0);
        let line: serde_json::Value = serde_json::from_str(output.err().trim()).unwrap();
        assert!(line["data"]["message"].as_str().unwrap().contains("missing.bmap"));
        assert_eq!(line["data"]["code"], "ENOENT");
    }
}
