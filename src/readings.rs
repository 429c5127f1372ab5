use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::regression::LinearRegressor;
use crate::{Axis, DataPoint, Error};

/// All servo movements (in percent) observed for one pixel deviation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingSet {
    #[serde(rename = "AllReadings")]
    all_readings: Vec<f64>,

    #[serde(rename = "Accepted")]
    accepted: Option<f64>,

    #[serde(rename = "IsInterpolated")]
    is_interpolated: bool,
}

impl ReadingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reading(first_reading: f64) -> Self {
        Self {
            all_readings: vec![first_reading],
            ..Default::default()
        }
    }

    /// Entry computed from the regression line, it has no raw readings
    pub fn interpolated(accepted: f64) -> Self {
        Self {
            all_readings: vec![],
            accepted: Some(accepted),
            is_interpolated: true,
        }
    }

    pub fn push(&mut self, reading: f64) {
        self.all_readings.push(reading);
    }

    pub fn readings(&self) -> &[f64] {
        &self.all_readings
    }

    pub fn accepted(&self) -> Option<f64> {
        self.accepted
    }

    pub fn is_interpolated(&self) -> bool {
        self.is_interpolated
    }

    /// Accept the mean of all raw readings. Interpolated sets are left as is.
    pub fn calculate_accepted(&mut self) -> Option<f64> {
        if !self.all_readings.is_empty() {
            let mean = self.all_readings.iter().sum::<f64>() / self.all_readings.len() as f64;
            self.accepted.replace(mean);
        }
        self.accepted
    }
}

impl std::fmt::Display for ReadingSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.accepted {
            Some(a) => write!(f, "Accepted={:.3}", a)?,
            None => write!(f, "Accepted=-")?,
        }
        write!(f, ", AllReadings.Count={}", self.all_readings.len())?;
        if self.is_interpolated {
            write!(f, " (interpolated)")?;
        }
        Ok(())
    }
}

/// pixel deviation -> servo movement that produced it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AxisCalibrationReadings(BTreeMap<i32, ReadingSet>);

impl AxisCalibrationReadings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a movement to the set of `pixel_deviation`, creating it if needed.
    ///
    /// A measurement replaces an interpolated set.
    pub fn record(&mut self, pixel_deviation: i32, movement: f64) {
        let set = self
            .0
            .entry(pixel_deviation)
            .or_insert_with(ReadingSet::new);
        if set.is_interpolated() {
            *set = ReadingSet::new();
        }
        set.push(movement);
    }

    pub fn get(&self, pixel_deviation: i32) -> Option<&ReadingSet> {
        self.0.get(&pixel_deviation)
    }

    /// Accepted servo movement for the deviation, if calibrated
    pub fn movement_for(&self, pixel_deviation: i32) -> Option<f64> {
        self.0.get(&pixel_deviation).and_then(ReadingSet::accepted)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &ReadingSet)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Smallest and largest known pixel deviation
    pub fn range(&self) -> Option<(i32, i32)> {
        match (self.0.first_key_value(), self.0.last_key_value()) {
            (Some((lo, _)), Some((hi, _))) => Some((*lo, *hi)),
            _ => None,
        }
    }

    pub fn calculate_accepted(&mut self) {
        self.0.values_mut().for_each(|set| {
            set.calculate_accepted();
        });
    }

    /// Line through the measured (not interpolated) accepted readings
    pub fn regressor(&self) -> Option<LinearRegressor> {
        let points = self
            .0
            .iter()
            .filter(|(_, set)| !set.is_interpolated())
            .filter_map(|(k, set)| set.accepted().map(|a| DataPoint::new(*k as f64, a)))
            .collect::<Vec<_>>();

        LinearRegressor::fit(&points)
    }

    /// Fill every missing deviation between the smallest and the largest known one.
    ///
    /// Returns the regressor used, `None` if there was not enough data and nothing was done.
    pub fn interpolate(&mut self) -> Option<LinearRegressor> {
        let regressor = self.regressor()?;
        let (lo, hi) = self.range()?;

        let mut added = 0usize;
        for i in lo..=hi {
            self.0.entry(i).or_insert_with(|| {
                added += 1;
                ReadingSet::interpolated(regressor.evaluate(i as f64))
            });
        }
        tracing::debug!("Interpolated {} deviations in [{}, {}]", added, lo, hi);

        Some(regressor)
    }
}

impl std::fmt::Display for AxisCalibrationReadings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} pixel readings", self.0.len())
    }
}

/// Calibration of both axes for a single camera resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AxesCalibrationReadings {
    #[serde(rename = "Horizontal")]
    horizontal: AxisCalibrationReadings,

    #[serde(rename = "Vertical")]
    vertical: AxisCalibrationReadings,
}

impl AxesCalibrationReadings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn axis(&self, axis: Axis) -> &AxisCalibrationReadings {
        match axis {
            Axis::Horizontal => &self.horizontal,
            Axis::Vertical => &self.vertical,
        }
    }

    pub fn axis_mut(&mut self, axis: Axis) -> &mut AxisCalibrationReadings {
        match axis {
            Axis::Horizontal => &mut self.horizontal,
            Axis::Vertical => &mut self.vertical,
        }
    }

    pub fn calculate_accepted_readings(&mut self) {
        self.horizontal.calculate_accepted();
        self.vertical.calculate_accepted();
    }

    /// Interpolate each axis on its own, an axis without a usable fit is skipped
    pub fn interpolate(&mut self) {
        for axis in Axis::ALL {
            if self.axis_mut(axis).interpolate().is_none() {
                tracing::warn!("{} axis: not enough readings to interpolate", axis);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.horizontal.is_empty() && self.vertical.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Frame centre in pixels
    pub fn center(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for Resolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidResolution(s.to_owned());

        let (w, h) = s.split_once(|c| c == 'x' || c == 'X').ok_or_else(invalid)?;
        let width = w.trim().parse::<u32>().map_err(|_| invalid())?;
        let height = h.trim().parse::<u32>().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

// Serialized as "WxH" so it can be used as a JSON object key
impl Serialize for Resolution {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Resolution {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Calibrations of all known camera resolutions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalibrationTable(BTreeMap<Resolution, AxesCalibrationReadings>);

impl CalibrationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, resolution: &Resolution) -> Option<&AxesCalibrationReadings> {
        self.0.get(resolution)
    }

    /// Store a new calibration, the previous one for this resolution is discarded
    pub fn replace(
        &mut self,
        resolution: Resolution,
        readings: AxesCalibrationReadings,
    ) -> Option<AxesCalibrationReadings> {
        self.0.insert(resolution, readings)
    }

    pub fn remove(&mut self, resolution: &Resolution) -> Option<AxesCalibrationReadings> {
        self.0.remove(resolution)
    }

    pub fn calculate_accepted_readings(&mut self) {
        self.0
            .values_mut()
            .for_each(AxesCalibrationReadings::calculate_accepted_readings);
    }

    pub fn interpolate(&mut self) {
        for (resolution, readings) in self.0.iter_mut() {
            tracing::debug!("Interpolating {}", resolution);
            readings.interpolate();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Resolution, &AxesCalibrationReadings)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
