mod config;
mod error;
mod readings;
mod regression;
mod setting;
mod store;

pub mod calibration;
pub mod emulation;
pub mod report;
pub mod rig;
pub mod tracking;
pub mod trajectory;

pub(crate) mod servo_codec;
pub(crate) mod servo_ctrl;
mod servo_controller;

use num_traits::Float;

pub use calibration::{CalibrationParams, CalibrationProgress, Calibrator};
pub use config::Config;
pub use error::Error;
pub use readings::{
    AxesCalibrationReadings, AxisCalibrationReadings, CalibrationTable, ReadingSet, Resolution,
};
pub use regression::LinearRegressor;
pub use rig::{Detection, Detector, FrameSource, PanTiltMechanism, Settle, TokioSettle};
pub use servo_controller::{SerialServoController, ServoController};
pub use setting::{Axis, Setting};
pub use store::CalibrationStore;
pub use tracking::TrackingController;
pub use trajectory::{Clock, MonotonicClock, TimeTarget};

pub trait IDataPoint<T> {
    fn x(&self) -> T;
    fn y(&self) -> T;
}

#[derive(Clone, Copy, Default, Debug, serde::Serialize, serde::Deserialize)]
pub struct DataPoint<T: Float + serde::Serialize> {
    x: T,
    y: T,
}

impl<T: Float + serde::Serialize> DataPoint<T> {
    pub fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl<T: Float + serde::Serialize> IDataPoint<T> for DataPoint<T> {
    fn x(&self) -> T {
        self.x
    }

    fn y(&self) -> T {
        self.y
    }
}
