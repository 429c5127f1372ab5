use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::emulation::EmulationConfig;
use crate::Error;

pub(crate) const APP_DIR: &str = "pan-tilt-calibrate";

#[derive(Deserialize, Clone, Serialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "ServoPort")]
    pub servo_port: Option<String>,

    #[serde(rename = "ServoBaudRate")]
    pub servo_baud_rate: u32,

    #[serde(rename = "PortTimeoutMs")]
    pub port_timeout_ms: u64,

    #[serde(rename = "ServoSettleTimeMs")]
    pub servo_settle_time_ms: u64,

    #[serde(rename = "CaptureBufferBurn")]
    pub capture_buffer_burn: usize,

    #[serde(rename = "SaccadeIncrementPercent")]
    pub saccade_increment_percent: f64,

    #[serde(rename = "MaxSaccadePercent")]
    pub max_saccade_percent: f64,

    #[serde(rename = "CalibrationFile")]
    pub calibration_file: Option<PathBuf>,

    #[serde(rename = "PursuitDurationMs")]
    pub pursuit_duration_ms: u64,

    #[serde(rename = "PursuitTickMs")]
    pub pursuit_tick_ms: u64,

    #[serde(rename = "Emulation")]
    pub emulation: EmulationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            servo_port: None,
            servo_baud_rate: 115200,
            port_timeout_ms: 500,
            servo_settle_time_ms: 750,
            capture_buffer_burn: 2,
            saccade_increment_percent: 0.3,
            max_saccade_percent: 60.0,
            calibration_file: None,
            pursuit_duration_ms: 1000,
            pursuit_tick_ms: 20,
            emulation: EmulationConfig::default(),
        }
    }
}

impl Config {
    /// `<config dir>/pan-tilt-calibrate/config.json`
    pub fn default_path() -> Result<PathBuf, Error> {
        use std::path;

        directories::BaseDirs::new()
            .map(|base_dirs| {
                base_dirs
                    .config_dir()
                    .join(path::Path::new(APP_DIR))
                    .join(path::Path::new("config.json"))
            })
            .ok_or_else(|| Error::Config("Failed to get config directory!".to_owned()))
    }

    /// Load the config file, built-in defaults if there is none
    pub fn load() -> Result<(Self, PathBuf), Error> {
        let path = Self::default_path()?;
        Self::load_from(path)
    }

    pub fn load_from(path: PathBuf) -> Result<(Self, PathBuf), Error> {
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let config = serde_json::from_str::<Config>(&contents)
                    .map_err(|e| Error::Config(format!("Failed to parse {:?}: {}", path, e)))?;
                config.validate()?;
                Ok((config, path))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("{:?} not found, using defaults", path);
                Ok((Self::default(), path))
            }
            Err(e) => Err(Error::Config(format!("Failed to read {:?}: {}", path, e))),
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if !(self.saccade_increment_percent > 0.0) {
            return Err(Error::Config(format!(
                "SaccadeIncrementPercent must be positive, got {}",
                self.saccade_increment_percent
            )));
        }
        if !(self.max_saccade_percent > 0.0) {
            return Err(Error::Config(format!(
                "MaxSaccadePercent must be positive, got {}",
                self.max_saccade_percent
            )));
        }
        if self.pursuit_duration_ms == 0 {
            return Err(Error::Config("PursuitDurationMs must not be 0".to_owned()));
        }
        Ok(())
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ServoPort: {:?}", self.servo_port)?;
        writeln!(f, "ServoBaudRate: {}", self.servo_baud_rate)?;
        writeln!(f, "PortTimeoutMs: {}", self.port_timeout_ms)?;
        writeln!(f, "ServoSettleTimeMs: {}", self.servo_settle_time_ms)?;
        writeln!(f, "CaptureBufferBurn: {}", self.capture_buffer_burn)?;
        writeln!(f, "SaccadeIncrementPercent: {}", self.saccade_increment_percent)?;
        writeln!(f, "MaxSaccadePercent: {}", self.max_saccade_percent)?;
        writeln!(f, "CalibrationFile: {:?}", self.calibration_file)?;
        writeln!(f, "PursuitDurationMs: {}", self.pursuit_duration_ms)?;
        writeln!(f, "PursuitTickMs: {}", self.pursuit_tick_ms)?;

        writeln!(f, "Emulation:")?;
        writeln!(f, "  Frame: {}", self.emulation.resolution())?;
        writeln!(
            f,
            "  PixelsPerPercent: X{} Y{}",
            self.emulation.pixels_per_percent_x, self.emulation.pixels_per_percent_y
        )?;
        writeln!(f, "  Target: {}", self.emulation.target)?;
        writeln!(f, "  JitterPx: {}", self.emulation.jitter_px)?;
        writeln!(f, "  Seed: {}", self.emulation.seed)?;
        Ok(())
    }
}
