use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;

pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bind the endpoints named in a connection file and serve them.
    Run(RunArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the kernel connection file (JSON).
    pub connection_file: PathBuf,
    /// Upper bound on each poll, in microseconds.
    #[arg(long, value_name = "MICROS", default_value_t = 100, env = "KERNELMUX_POLL_INTERVAL_US")]
    pub poll_interval_us: u64,
    /// Largest accepted frame payload, in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = kernelmux_frame::DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
