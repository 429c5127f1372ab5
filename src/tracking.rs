use std::time::Duration;

use crate::rig::Detection;
use crate::trajectory::{Clock, TimeTarget};
use crate::{AxesCalibrationReadings, Axis, CalibrationTable, Error, Resolution, Setting};

/// Turns a detected target into the servo setting that brings it to the frame center
pub struct TrackingController {
    resolution: Resolution,
    readings: AxesCalibrationReadings,
    pursuit_duration: Duration,
}

impl TrackingController {
    pub fn new(
        resolution: Resolution,
        readings: AxesCalibrationReadings,
        pursuit_duration: Duration,
    ) -> Self {
        Self {
            resolution,
            readings,
            pursuit_duration,
        }
    }

    /// `None` if the resolution was never calibrated
    pub fn from_table(
        table: &CalibrationTable,
        resolution: Resolution,
        pursuit_duration: Duration,
    ) -> Option<Self> {
        table
            .get(&resolution)
            .cloned()
            .map(|readings| Self::new(resolution, readings, pursuit_duration))
    }

    /// Servo movement shifting the image by `(center - point)`.
    ///
    /// An axis with no calibrated entry for the deviation does not move.
    pub fn movement_to_center(&self, point: (f64, f64)) -> Setting {
        let (cx, cy) = self.resolution.center();
        let required = Detection::found(cx - point.0, cy - point.1);

        Axis::ALL.into_iter().fold(Setting::default(), |movement, axis| {
            let deviation = required.axis(axis).round() as i32;
            match self.readings.axis(axis).movement_for(deviation) {
                Some(m) => movement.with_axis(axis, m),
                None => {
                    tracing::trace!("{} deviation {} is not calibrated", axis, deviation);
                    movement
                }
            }
        })
    }

    /// New absolute setting for a detection, `None` if the target was not found
    pub fn react_to_target(&self, current: Setting, detection: &Detection) -> Option<Setting> {
        if !detection.found {
            return None;
        }
        Some((current + self.movement_to_center(detection.point)).clamped())
    }

    /// Smooth movement towards the target, `clock` must start now
    pub fn pursue<C: Clock>(
        &self,
        current: Setting,
        detection: &Detection,
        clock: C,
    ) -> Result<Option<TimeTarget<C>>, Error> {
        match self.react_to_target(current, detection) {
            Some(destination) => {
                TimeTarget::new(current, destination, self.pursuit_duration, clock).map(Some)
            }
            None => Ok(None),
        }
    }
}
