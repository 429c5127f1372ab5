use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    /// Calibration order: every axis is sampled in turn
    pub const ALL: [Axis; 2] = [Axis::Horizontal, Axis::Vertical];
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Horizontal => write!(f, "Horizontal"),
            Axis::Vertical => write!(f, "Vertical"),
        }
    }
}

impl std::str::FromStr for Axis {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "h" | "horizontal" | "pan" => Ok(Axis::Horizontal),
            "v" | "vertical" | "tilt" => Ok(Axis::Vertical),
            _ => Err(Error::UnknownAxis(s.to_owned())),
        }
    }
}

/// Numeric tags as used in exported tables: 1 - horizontal, 2 - vertical
impl TryFrom<u8> for Axis {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(Axis::Horizontal),
            2 => Ok(Axis::Vertical),
            _ => Err(Error::UnknownAxis(tag.to_string())),
        }
    }
}

/// Pan/tilt position in percent of the servo range.
///
/// Also used as a relative movement (delta), in that case the components may be negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Setting {
    #[serde(rename = "Pan")]
    pub pan_percent: f64,

    #[serde(rename = "Tilt")]
    pub tilt_percent: f64,
}

impl Setting {
    pub const CENTER: Setting = Setting::new(50.0, 50.0);

    pub const fn new(pan_percent: f64, tilt_percent: f64) -> Self {
        Self {
            pan_percent,
            tilt_percent,
        }
    }

    /// Movement along a single axis, the other one stays untouched
    pub fn on_axis(axis: Axis, value: f64) -> Self {
        Self::default().with_axis(axis, value)
    }

    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Horizontal => self.pan_percent,
            Axis::Vertical => self.tilt_percent,
        }
    }

    pub fn with_axis(mut self, axis: Axis, value: f64) -> Self {
        match axis {
            Axis::Horizontal => self.pan_percent = value,
            Axis::Vertical => self.tilt_percent = value,
        }
        self
    }

    /// Limit both components to the servo range
    pub fn clamped(self) -> Self {
        Self {
            pan_percent: self.pan_percent.clamp(0.0, 100.0),
            tilt_percent: self.tilt_percent.clamp(0.0, 100.0),
        }
    }
}

impl std::ops::Add for Setting {
    type Output = Setting;

    fn add(self, rhs: Self) -> Self::Output {
        Setting::new(
            self.pan_percent + rhs.pan_percent,
            self.tilt_percent + rhs.tilt_percent,
        )
    }
}

impl std::ops::Sub for Setting {
    type Output = Setting;

    fn sub(self, rhs: Self) -> Self::Output {
        Setting::new(
            self.pan_percent - rhs.pan_percent,
            self.tilt_percent - rhs.tilt_percent,
        )
    }
}

impl std::fmt::Display for Setting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Pan={:.2}%, Tilt={:.2}%", self.pan_percent, self.tilt_percent)
    }
}
