use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use rtlink_frame::CommandSelector;
use rtlink_peer::{LinkConfig, SignalKind};

use crate::exit::{peer_error, CliResult};
use crate::output::OutputFormat;

pub mod monitor;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one command to the coprocessor.
    Send(SendArgs),
    /// Receive and print signal arrays.
    Monitor(MonitorArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Options shared by every command that opens the link.
#[derive(Debug, Clone)]
pub struct LinkArgs {
    pub device: PathBuf,
    pub config: Option<PathBuf>,
}

impl LinkArgs {
    pub fn load_config(&self) -> CliResult<LinkConfig> {
        match &self.config {
            Some(path) => LinkConfig::from_json_file(path).map_err(|err| {
                peer_error(&format!("failed loading {}", path.display()), err)
            }),
            None => Ok(LinkConfig::default()),
        }
    }
}

pub fn run(command: Command, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, link, format),
        Command::Monitor(args) => monitor::run(args, link, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Command name (e.g. start-excitation, set-param) or selector number 0-8.
    pub selector: CommandSelector,
    /// Parameter id for set-param (1 = step size, 2 = frequency).
    #[arg(long, default_value = "0")]
    pub param_id: u16,
    /// Parameter value for set-param.
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    pub value: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum SignalFilter {
    Ref,
    Err,
    Both,
}

impl SignalFilter {
    pub fn kinds(self) -> &'static [SignalKind] {
        match self {
            Self::Ref => &[SignalKind::Reference],
            Self::Err => &[SignalKind::Error],
            Self::Both => &SignalKind::ALL,
        }
    }
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Exit after printing N arrays.
    #[arg(long)]
    pub count: Option<usize>,
    /// Which signal to print.
    #[arg(long, default_value = "both")]
    pub signal: SignalFilter,
    /// Send start-excitation first and stop-excitation on exit.
    #[arg(long)]
    pub start: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
