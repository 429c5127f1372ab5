//! Software pan/tilt rig: a camera on two servos looking at a fixed target.
//!
//! The target is a point in servo space. Its pixel position is the offset
//! between the target and the current setting times `pixels_per_percent`,
//! counted from the frame center, plus optional random jitter.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::rig::{Detection, Detector, FrameSource, PanTiltMechanism};
use crate::{Error, Resolution, Setting};

#[derive(Deserialize, Clone, Copy, Serialize, Debug)]
#[serde(default)]
pub struct EmulationConfig {
    #[serde(rename = "Width")]
    pub width: u32,

    #[serde(rename = "Height")]
    pub height: u32,

    #[serde(rename = "PixelsPerPercentX")]
    pub pixels_per_percent_x: f64,

    #[serde(rename = "PixelsPerPercentY")]
    pub pixels_per_percent_y: f64,

    #[serde(rename = "Target")]
    pub target: Setting,

    #[serde(rename = "JitterPx")]
    pub jitter_px: f64,

    #[serde(rename = "Seed")]
    pub seed: u64,
}

impl Default for EmulationConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            pixels_per_percent_x: 8.0,
            pixels_per_percent_y: 8.0,
            target: Setting::CENTER,
            jitter_px: 0.0,
            seed: 0,
        }
    }
}

impl EmulationConfig {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// What the emulated camera saw: target position, if it is inside the frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmulatedFrame {
    pub target: Option<(f64, f64)>,
}

pub struct EmulatedMechanism {
    tx: watch::Sender<Setting>,
}

impl PanTiltMechanism for EmulatedMechanism {
    async fn move_absolute(&mut self, setting: Setting) -> Result<(), Error> {
        // servo end stops
        self.tx.send_replace(setting.clamped());
        Ok(())
    }

    async fn move_relative(&mut self, delta: Setting) -> Result<(), Error> {
        let new = *self.tx.borrow() + delta;
        self.move_absolute(new).await
    }

    fn current_setting(&self) -> Setting {
        *self.tx.borrow()
    }
}

pub struct EmulatedCamera {
    rx: watch::Receiver<Setting>,
    config: EmulationConfig,
    rng: StdRng,
}

impl EmulatedCamera {
    fn project(&mut self, setting: Setting) -> Option<(f64, f64)> {
        let (cx, cy) = self.config.resolution().center();
        let mut x =
            cx + (self.config.target.pan_percent - setting.pan_percent) * self.config.pixels_per_percent_x;
        let mut y = cy
            + (self.config.target.tilt_percent - setting.tilt_percent)
                * self.config.pixels_per_percent_y;

        if self.config.jitter_px > 0.0 {
            let j = self.config.jitter_px;
            x += self.rng.gen_range(-j..=j);
            y += self.rng.gen_range(-j..=j);
        }

        let inside = (0.0..self.config.width as f64).contains(&x)
            && (0.0..self.config.height as f64).contains(&y);
        inside.then_some((x, y))
    }
}

impl FrameSource for EmulatedCamera {
    type Frame = EmulatedFrame;

    async fn capture(&mut self) -> Result<Self::Frame, Error> {
        let setting = *self.rx.borrow();
        Ok(EmulatedFrame {
            target: self.project(setting),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmulatedDetector;

impl Detector<EmulatedFrame> for EmulatedDetector {
    fn detect(&mut self, frame: &EmulatedFrame) -> Detection {
        frame
            .target
            .map(|(x, y)| Detection::found(x, y))
            .unwrap_or_else(Detection::missed)
    }
}

/// Emulated rig, starts centered
pub fn rig(config: EmulationConfig) -> (EmulatedMechanism, EmulatedCamera, EmulatedDetector) {
    let (tx, rx) = watch::channel(Setting::CENTER);
    (
        EmulatedMechanism { tx },
        EmulatedCamera {
            rx,
            config,
            rng: StdRng::seed_from_u64(config.seed),
        },
        EmulatedDetector,
    )
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;
    use crate::calibration::{CalibrationParams, Calibrator};
    use crate::rig::NoSettle;
    use crate::{Axis, CalibrationTable};

    fn params() -> CalibrationParams {
        CalibrationParams {
            settle_time: Duration::ZERO,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn camera_follows_mechanism() {
        let (mut mechanism, mut camera, mut detector) = rig(EmulationConfig::default());

        let frame = camera.capture().await.unwrap();
        assert_eq!(detector.detect(&frame), Detection::found(320.0, 240.0));

        mechanism.move_relative(Setting::new(1.0, -2.0)).await.unwrap();
        let frame = camera.capture().await.unwrap();
        assert_eq!(detector.detect(&frame), Detection::found(312.0, 256.0));

        mechanism.move_absolute(Setting::new(100.0, 50.0)).await.unwrap();
        let frame = camera.capture().await.unwrap();
        assert!(!detector.detect(&frame).found);
    }

    #[tokio::test]
    async fn calibrate_emulated_rig() {
        let config = EmulationConfig::default();
        let (mechanism, camera, detector) = rig(config);
        let mut calibrator = Calibrator::new(mechanism, camera, detector, NoSettle, params());

        let mut table = CalibrationTable::new();
        calibrator
            .calibrate_resolution(&mut table, config.resolution())
            .await
            .unwrap();

        let readings = table.get(&config.resolution()).unwrap();
        let h = readings.axis(Axis::Horizontal);
        let v = readings.axis(Axis::Vertical);

        // target leaves the 640 px frame after 40% of pan, 480 px after 30% of tilt
        let (h_lo, h_hi) = h.range().unwrap();
        assert!(h_lo >= -320 && h_hi <= 320);
        assert!(h_hi - h_lo > 600);
        let (v_lo, v_hi) = v.range().unwrap();
        assert!(v_hi - v_lo > 450);

        // every deviation in range is known and pan moves the image the other way
        for i in h_lo..=h_hi {
            let m = h.movement_for(i).unwrap();
            assert!((m + i as f64 / 8.0).abs() < 0.2, "deviation {} -> {}", i, m);
        }

        let (mechanism, _, _) = calibrator.into_parts();
        assert_eq!(mechanism.current_setting(), Setting::CENTER);
    }

    #[tokio::test]
    async fn target_never_leaves_frame() {
        let config = EmulationConfig {
            pixels_per_percent_x: 0.5,
            pixels_per_percent_y: 0.5,
            ..Default::default()
        };
        let (mechanism, camera, detector) = rig(config);
        let mut calibrator = Calibrator::new(mechanism, camera, detector, NoSettle, params());

        let readings = calibrator.calibrate().await.unwrap();
        for axis in Axis::ALL {
            for (_, set) in readings.axis(axis).iter() {
                assert!(set.readings().iter().all(|m| m.abs() <= 60.0));
            }
        }
        // end stops cut the travel at 50% from center, 25 px at 0.5 px per percent
        assert_eq!(readings.axis(Axis::Horizontal).range(), Some((-25, 25)));
    }

    #[tokio::test]
    async fn jitter_is_reproducible() {
        let config = EmulationConfig {
            jitter_px: 1.5,
            seed: 42,
            ..Default::default()
        };

        let mut results = vec![];
        for _ in 0..2 {
            let (mechanism, camera, detector) = rig(config);
            let mut calibrator = Calibrator::new(mechanism, camera, detector, NoSettle, params());
            results.push(calibrator.calibrate().await.unwrap());
        }
        assert_eq!(results[0], results[1]);
    }
}
