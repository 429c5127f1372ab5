use std::io::Error as IoError;
use std::time::Duration;

#[derive(Debug)]
pub enum Error {
    /// Servo mechanism failed to accept or confirm a command
    Mechanism(IoError),
    /// Camera frame could not be captured
    Capture(String),
    /// Calibration table could not be read or written
    Store(IoError),
    /// Report generation failed
    Report(String),
    /// Configuration is missing or malformed
    Config(String),
    /// Axis selector outside of {Horizontal, Vertical}
    UnknownAxis(String),
    /// Trajectory duration must be strictly positive
    InvalidDuration(Duration),
    /// Malformed resolution string, expected `<width>x<height>`
    InvalidResolution(String),
    /// Calibration run was cancelled from outside
    Cancelled,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Mechanism(e) => write!(f, "Mechanism error: {}", e),
            Error::Capture(e) => write!(f, "Capture error: {}", e),
            Error::Store(e) => write!(f, "Calibration store error: {}", e),
            Error::Report(e) => write!(f, "Report error: {}", e),
            Error::Config(e) => write!(f, "Config error: {}", e),
            Error::UnknownAxis(axis) => write!(f, "Unknown axis selector: {:?}", axis),
            Error::InvalidDuration(d) => write!(f, "Invalid trajectory duration: {:?}", d),
            Error::InvalidResolution(r) => write!(f, "Invalid resolution: {:?}", r),
            Error::Cancelled => write!(f, "Calibration cancelled"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Mechanism(e) | Error::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Store(IoError::new(std::io::ErrorKind::InvalidData, e))
    }
}
