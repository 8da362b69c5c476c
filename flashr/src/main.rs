mod cli;
mod engine;
mod error;
mod gate;
mod logging;
mod options;
mod orchestrator;
mod output;
mod progress;
mod report;
mod robot;

use clap::Parser;
use cli::Cli;
use engine::{ImageWriter, SystemCatalog};
use flashr_core::platform;
use gate::DialoguerGate;
use orchestrator::Orchestrator;
use output::Output;
use report::ExitCode;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            e.print().ok();
            // `--help` and `--version` also end up here.
            let code = if e.use_stderr() {
                ExitCode::GeneralError
            } else {
                ExitCode::Success
            };
            return code.into();
        }
    };

    let options = cli.run_options();
    logging::init(options.mode(), cli.log_file.as_deref());

    let code = {
        // Dropping the output flushes it, after the report and before exit.
        let mut output = Output::stdio(options.mode());
        let orchestrator = Orchestrator::new(
            DialoguerGate::new(platform::get_removable_devices),
            SystemCatalog,
            ImageWriter,
        );
        orchestrator.run(&options, &mut output).await
    };

    code.into()
}
