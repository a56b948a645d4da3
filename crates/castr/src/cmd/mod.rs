use clap::{Args, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod inspect;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one recording session, controlled over stdin/stdout.
    Serve(ServeArgs),
    /// Verify and summarize recorded container files.
    Inspect(InspectArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Inspect(args) => inspect::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// JSON configuration file.
    #[arg(long, value_name = "FILE", env = "CASTR_CONFIG")]
    pub config: Option<PathBuf>,
    /// Directory the recording artifacts are written to.
    #[arg(long, value_name = "DIR", env = "CASTR_RECORDING_DIR")]
    pub recording_dir: Option<PathBuf>,
    /// Address to listen on.
    #[arg(long, value_name = "ADDR", env = "CASTR_BIND")]
    pub bind: Option<IpAddr>,
    /// First port of the listening range.
    #[arg(long, env = "CASTR_PORT_START")]
    pub port_start: Option<u16>,
    /// Number of ports in the listening range.
    #[arg(long, env = "CASTR_PORT_LEN")]
    pub port_len: Option<u16>,
    /// Random ports tried before giving up.
    #[arg(long)]
    pub bind_attempts: Option<u32>,
    /// Time a socket has to log in (e.g. 10s, 500ms).
    #[arg(long)]
    pub login_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Container files, read back to back (e.g. header1 header2 data).
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show build details and session defaults.
    #[arg(long)]
    pub extended: bool,
}
