//! Command line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use hatline_core::{
    PinSample,
    constants::{IDLE_SAMPLE, LITE_SIGNATURE, PRO_SIGNATURE},
};

#[derive(Parser)]
#[command(name = "hatline")]
#[command(version)]
#[command(about = "Detect GPIO hats and react to their events")]
#[command(long_about = "Detect GPIO hats and react to their events

EXAMPLES:
    hatline detect                     Print the attached hat variant
    hatline battery-status             Exit 1 if the Pro hat battery is low
    hatline watch -v                   Log hat events until Ctrl-C
    hatline --simulate=lite watch      Run against a simulated Lite hat

EXIT CODES (battery-status):
    0    Pro hat attached, battery safe
    1    Pro hat attached, battery low
    2    Initialisation failed
    3    Pro hat not connected

ENVIRONMENT VARIABLES:
    RUST_LOG=debug         Override the log filter")]
#[command(propagate_version = true)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Use a simulated GPIO bank showing this hat instead of real hardware
    #[arg(
        long,
        global = true,
        value_enum,
        num_args = 0..=1,
        default_missing_value = "pro",
        require_equals = true
    )]
    pub simulate: Option<Simulation>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check whether the Pro hat battery is low
    BatteryStatus,

    /// Print the attached hat variant, or `none`
    Detect,

    /// Log attach, detach, power and battery events until interrupted
    Watch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Simulation {
    Lite,
    Pro,
    /// Bare header with no hat
    #[value(name = "none")]
    Empty,
}

impl Simulation {
    /// Detection pattern preloaded on the simulated header.
    pub fn sample(self) -> PinSample {
        match self {
            Simulation::Lite => LITE_SIGNATURE,
            Simulation::Pro => PRO_SIGNATURE,
            Simulation::Empty => IDLE_SAMPLE,
        }
    }
}

impl Cli {
    /// Default log filter for the requested verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
