use crate::options::RunOptions;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "flashr")]
#[command(about = "A safe, scriptable disk imaging tool", version)]
pub struct Cli {
    /// Image file to write
    #[arg(required = true)]
    pub image: PathBuf,

    /// Target device (e.g. /dev/sdb); prompts for one when omitted
    #[arg(short, long)]
    pub drive: Option<String>,

    /// Skip the confirmation prompt (`--yes=false` still asks)
    #[arg(
        short,
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_name = "BOOL"
    )]
    pub yes: Option<bool>,

    /// Print JSON lines for other programs instead of progress bars
    #[arg(long)]
    pub robot: bool,

    /// Unmount the device once flashing succeeds
    #[arg(short, long)]
    pub unmount: bool,

    /// Validate the write by reading the device back
    #[arg(short, long)]
    pub check: bool,

    /// Block map file; only the blocks it maps are written
    #[arg(long, value_name = "PATH")]
    pub bmap: Option<PathBuf>,

    /// Append logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            source: self.image.clone(),
            bmap: self.bmap.clone(),
            unmount: self.unmount,
            check: self.check,
            robot: self.robot,
            drive: self.drive.clone(),
            yes: self.yes.into(),
        }
    }
}
