//! Collaborators driven by the calibration and pursuit logic: the servo
//! mechanism, the camera and the target detector.
#![allow(async_fn_in_trait)]

use std::time::Duration;

use serde::Serialize;

use crate::{Axis, Error, Setting};

/// Result of running a detector over a captured frame.
///
/// `point` is meaningless when `found == false`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Detection {
    pub found: bool,
    pub point: (f64, f64),
}

impl Detection {
    pub fn found(x: f64, y: f64) -> Self {
        Self {
            found: true,
            point: (x, y),
        }
    }

    pub fn missed() -> Self {
        Self::default()
    }

    /// Pixel coordinate of the detected point along the axis
    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Horizontal => self.point.0,
            Axis::Vertical => self.point.1,
        }
    }
}

impl std::fmt::Display for Detection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.found {
            write!(f, "({:.1}, {:.1})", self.point.0, self.point.1)
        } else {
            write!(f, "not found")
        }
    }
}

/// Two-axis servo mount
pub trait PanTiltMechanism {
    async fn move_absolute(&mut self, setting: Setting) -> Result<(), Error>;

    /// Move by `delta` from the current setting
    async fn move_relative(&mut self, delta: Setting) -> Result<(), Error>;

    fn current_setting(&self) -> Setting;
}

pub trait FrameSource {
    type Frame;

    async fn capture(&mut self) -> Result<Self::Frame, Error>;
}

pub trait Detector<F> {
    fn detect(&mut self, frame: &F) -> Detection;
}

/// Pause letting the servos reach the commanded position
pub trait Settle {
    async fn settle(&mut self, time: Duration);
}

/// Real-time settle using the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSettle;

impl Settle for TokioSettle {
    async fn settle(&mut self, time: Duration) {
        if !time.is_zero() {
            tokio::time::sleep(time).await;
        }
    }
}

/// Returns immediately, for emulated rigs and tests
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSettle;

impl Settle for NoSettle {
    async fn settle(&mut self, _time: Duration) {}
}
