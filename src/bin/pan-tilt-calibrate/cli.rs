use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pan_tilt_calibrate::Resolution;

/// Pan/tilt camera calibration
#[derive(Parser)]
#[clap(version)]
pub struct Cli {
    /// Calibration file instead of the one from the config
    #[clap(short, long, global = true)]
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Com,
}

#[derive(Subcommand)]
pub enum Com {
    /// Calibrate the emulated rig and store the result
    #[clap(alias = "cal")]
    Calibrate {
        /// Frame size, WxH. Default: from the config
        #[clap(short, long)]
        resolution: Option<Resolution>,

        /// Servo settle time override, ms
        #[clap(long)]
        settle_ms: Option<u64>,
    },

    /// Recalculate accepted values and fill the gaps in the stored table
    Interpolate,

    /// Print the stored table
    Show {
        /// Only this resolution
        #[clap(short, long)]
        resolution: Option<Resolution>,

        /// Print every deviation
        #[clap(short, long)]
        verbose: bool,
    },

    /// Write the stored table to an .xlsx file, strftime patterns allowed
    Export {
        #[clap(default_value = "calibration_%Y-%m-%d.xlsx")]
        path: PathBuf,
    },

    /// Bring a target seen at (x, y) to the frame center
    Pursuit {
        x: f64,
        y: f64,

        /// Frame size, WxH. Default: from the config
        #[clap(short, long)]
        resolution: Option<Resolution>,

        /// Movement duration override, ms
        #[clap(short, long)]
        duration_ms: Option<u64>,

        /// Drive the servos on this port, print positions if none is given
        #[clap(short, long)]
        port: Option<String>,
    },

    /// Center the servos
    Center {
        /// Serial port. Default: from the config
        #[clap(short, long)]
        port: Option<String>,
    },
}
