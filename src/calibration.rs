use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use crate::rig::{Detection, Detector, FrameSource, PanTiltMechanism, Settle};
use crate::{AxesCalibrationReadings, Axis, CalibrationTable, Config, Error, Resolution, Setting};

#[derive(Debug, Clone, Copy)]
pub struct CalibrationParams {
    /// Position every sample starts from
    pub center: Setting,

    /// Growth of the movement between two consecutive samples, %
    pub saccade_increment: f64,

    /// Largest movement from the center, %
    pub max_saccade: f64,

    /// Frames captured per detection, only the last one is used
    pub capture_buffer_burn: usize,

    pub settle_time: Duration,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            center: Setting::CENTER,
            saccade_increment: 0.3,
            max_saccade: 60.0,
            capture_buffer_burn: 2,
            settle_time: Duration::from_millis(750),
        }
    }
}

impl From<&Config> for CalibrationParams {
    fn from(config: &Config) -> Self {
        Self {
            center: Setting::CENTER,
            saccade_increment: config.saccade_increment_percent,
            max_saccade: config.max_saccade_percent,
            capture_buffer_burn: config.capture_buffer_burn,
            settle_time: Duration::from_millis(config.servo_settle_time_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub enum CalibrationProgress {
    Idle,

    /// One first/new detection pair has been taken
    Sampling {
        axis: Axis,
        sign: i8,
        saccade: f64,
        first: Detection,
        new: Detection,
        deviation: Option<i32>,
    },

    Done,
}

impl std::fmt::Display for CalibrationProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationProgress::Idle => write!(f, "Idle"),
            CalibrationProgress::Sampling {
                axis,
                sign,
                saccade,
                first,
                new,
                deviation,
            } => {
                write!(
                    f,
                    "Axis={axis} Sign={sign} Saccade={saccade:.2} First={first} New={new}"
                )?;
                if let Some(d) = deviation {
                    write!(f, " Deviation={d}")?;
                }
                Ok(())
            }
            CalibrationProgress::Done => write!(f, "Done"),
        }
    }
}

/// Discovers how many servo percent move the target by how many pixels.
///
/// Every sample starts from the center position: first detection at center,
/// relative move along one axis, new detection. The movement grows by
/// `saccade_increment` until the target is lost or `max_saccade` is reached.
pub struct Calibrator<M, C, D, S> {
    mechanism: M,
    camera: C,
    detector: D,
    settle: S,
    params: CalibrationParams,

    progress_tx: watch::Sender<CalibrationProgress>,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl<M, C, D, S> Calibrator<M, C, D, S>
where
    M: PanTiltMechanism,
    C: FrameSource,
    D: Detector<C::Frame>,
    S: Settle,
{
    pub fn new(mechanism: M, camera: C, detector: D, settle: S, params: CalibrationParams) -> Self {
        let (progress_tx, _) = watch::channel(CalibrationProgress::Idle);
        Self {
            mechanism,
            camera,
            detector,
            settle,
            params,
            progress_tx,
            cancel_rx: None,
        }
    }

    /// Stop the run as soon as `true` is published to the channel
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx.replace(cancel_rx);
        self
    }

    /// Per-sample diagnostics
    pub fn subscribe(&self) -> watch::Receiver<CalibrationProgress> {
        self.progress_tx.subscribe()
    }

    pub fn params(&self) -> &CalibrationParams {
        &self.params
    }

    pub fn into_parts(self) -> (M, C, D) {
        (self.mechanism, self.camera, self.detector)
    }

    /// Sample both directions of both axes and average the readings.
    ///
    /// Not finding the target is not an error: the affected direction simply
    /// gets no readings.
    pub async fn calibrate(&mut self) -> Result<AxesCalibrationReadings, Error> {
        if self.params.saccade_increment <= 0.0 || self.params.saccade_increment.is_nan() {
            return Err(Error::Config(format!(
                "Saccade increment must be positive, got {}",
                self.params.saccade_increment
            )));
        }
        if !(self.params.max_saccade > 0.0) {
            return Err(Error::Config(format!(
                "Max saccade must be positive, got {}",
                self.params.max_saccade
            )));
        }

        let mut readings = AxesCalibrationReadings::new();

        for axis in Axis::ALL {
            for sign in [1, -1] {
                let samples = self.calibrate_half_axis(sign, axis, &mut readings).await?;
                tracing::info!("{} axis, sign {}: {} samples", axis, sign, samples);
            }
        }

        readings.calculate_accepted_readings();

        self.reset_to_center().await?;
        self.progress_tx.send_replace(CalibrationProgress::Done);

        Ok(readings)
    }

    /// Calibrate, fill the gaps and store the result as the only calibration of `resolution`.
    ///
    /// The table is not touched if the run fails.
    pub async fn calibrate_resolution(
        &mut self,
        table: &mut CalibrationTable,
        resolution: Resolution,
    ) -> Result<(), Error> {
        tracing::info!("Calibrating {}...", resolution);

        let mut readings = self.calibrate().await?;
        readings.interpolate();

        if table.replace(resolution, readings).is_some() {
            tracing::info!("Previous calibration of {} discarded", resolution);
        }
        Ok(())
    }

    /// Returns the number of iterations made
    async fn calibrate_half_axis(
        &mut self,
        sign: i8,
        axis: Axis,
        readings: &mut AxesCalibrationReadings,
    ) -> Result<usize, Error> {
        let max_saccade = self.params.max_saccade.abs();
        let mut iterations = 0usize;

        loop {
            self.check_cancelled()?;

            self.reset_to_center().await?;
            self.wait_servo().await;
            let first_detection = self.locate_target().await?;

            iterations += 1;
            // computed from the step count so rounding never pushes it past the limit
            let saccade = (sign as f64 * self.params.saccade_increment * iterations as f64)
                .clamp(-max_saccade, max_saccade);

            self.mechanism
                .move_relative(Setting::on_axis(axis, saccade))
                .await?;
            self.wait_servo().await;
            let new_detection = self.locate_target().await?;

            let deviation = if first_detection.found && new_detection.found {
                let deviation =
                    (new_detection.axis(axis) - first_detection.axis(axis)).round() as i32;
                readings.axis_mut(axis).record(deviation, saccade);
                Some(deviation)
            } else {
                None
            };

            tracing::debug!(
                "{} sign={} saccade={:.2}: first {}, new {}, deviation {:?}",
                axis,
                sign,
                saccade,
                first_detection,
                new_detection,
                deviation
            );
            self.progress_tx.send_replace(CalibrationProgress::Sampling {
                axis,
                sign,
                saccade,
                first: first_detection,
                new: new_detection,
                deviation,
            });

            if !new_detection.found || saccade.abs() >= max_saccade {
                break;
            }
        }

        Ok(iterations)
    }

    async fn reset_to_center(&mut self) -> Result<(), Error> {
        tracing::trace!("Relocating to center {}", self.params.center);
        self.mechanism.move_absolute(self.params.center).await
    }

    async fn wait_servo(&mut self) {
        self.settle.settle(self.params.settle_time).await
    }

    async fn locate_target(&mut self) -> Result<Detection, Error> {
        // first frames may be stale ones from the capture buffer
        let mut frame = self.camera.capture().await?;
        for _ in 1..self.params.capture_buffer_burn {
            frame = self.camera.capture().await?;
        }

        Ok(self.detector.detect(&frame))
    }

    fn check_cancelled(&self) -> Result<(), Error> {
        match &self.cancel_rx {
            Some(rx) if *rx.borrow() => {
                tracing::warn!("Calibration cancelled");
                Err(Error::Cancelled)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::VecDeque;

    use super::*;
    use crate::rig::NoSettle;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Cmd {
        Absolute(Setting),
        Relative(Setting),
    }

    #[derive(Default)]
    struct RecordingMechanism {
        current: Setting,
        commands: Vec<Cmd>,
    }

    impl PanTiltMechanism for RecordingMechanism {
        async fn move_absolute(&mut self, setting: Setting) -> Result<(), Error> {
            self.commands.push(Cmd::Absolute(setting));
            self.current = setting;
            Ok(())
        }

        async fn move_relative(&mut self, delta: Setting) -> Result<(), Error> {
            self.commands.push(Cmd::Relative(delta));
            self.current = self.current + delta;
            Ok(())
        }

        fn current_setting(&self) -> Setting {
            self.current
        }
    }

    /// Frames are the detections themselves; misses once the script is over
    struct ScriptedCamera {
        script: VecDeque<Detection>,
        captures: usize,
    }

    impl ScriptedCamera {
        fn new(script: impl IntoIterator<Item = Detection>) -> Self {
            Self {
                script: script.into_iter().collect(),
                captures: 0,
            }
        }
    }

    impl FrameSource for ScriptedCamera {
        type Frame = Detection;

        async fn capture(&mut self) -> Result<Self::Frame, Error> {
            self.captures += 1;
            Ok(self.script.pop_front().unwrap_or_else(Detection::missed))
        }
    }

    struct PassThrough;

    impl Detector<Detection> for PassThrough {
        fn detect(&mut self, frame: &Detection) -> Detection {
            *frame
        }
    }

    fn params() -> CalibrationParams {
        CalibrationParams {
            capture_buffer_burn: 1,
            settle_time: Duration::ZERO,
            ..Default::default()
        }
    }

    fn calibrator(
        script: impl IntoIterator<Item = Detection>,
        params: CalibrationParams,
    ) -> Calibrator<RecordingMechanism, ScriptedCamera, PassThrough, NoSettle> {
        Calibrator::new(
            RecordingMechanism::default(),
            ScriptedCamera::new(script),
            PassThrough,
            NoSettle,
            params,
        )
    }

    #[tokio::test]
    async fn target_lost_after_first_detection() {
        // every pass: found at center, lost after the move
        let script = (0..4).flat_map(|_| [Detection::found(320.0, 240.0), Detection::missed()]);
        let mut c = calibrator(script, params());

        let readings = c.calibrate().await.unwrap();
        assert!(readings.axis(Axis::Horizontal).is_empty());
        assert!(readings.axis(Axis::Vertical).is_empty());

        let (mechanism, camera, _) = c.into_parts();
        // one iteration per direction: center + relative, then the final return to center
        assert_eq!(mechanism.commands.len(), 4 * 2 + 1);
        assert_eq!(camera.captures, 4 * 2);
        assert_eq!(
            mechanism.commands[1],
            Cmd::Relative(Setting::on_axis(Axis::Horizontal, 0.3))
        );
        assert_eq!(
            mechanism.commands[3],
            Cmd::Relative(Setting::on_axis(Axis::Horizontal, -0.3))
        );
        assert_eq!(
            mechanism.commands[5],
            Cmd::Relative(Setting::on_axis(Axis::Vertical, 0.3))
        );
        assert_eq!(mechanism.commands.last(), Some(&Cmd::Absolute(Setting::CENTER)));
    }

    #[tokio::test]
    async fn never_found() {
        let mut c = calibrator([], params());

        let readings = c.calibrate().await.unwrap();
        assert!(readings.is_empty());
    }

    #[tokio::test]
    async fn records_rounded_deviation_and_averages() {
        let script = [
            // H+: two samples, both 2 px, then lost
            Detection::found(100.0, 50.0),
            Detection::found(101.6, 50.0),
            Detection::found(100.0, 50.0),
            Detection::found(102.2, 50.0),
            Detection::found(100.0, 50.0),
            Detection::missed(),
            // H-: first detection is missed, new one is found - not recorded
            Detection::missed(),
            Detection::found(90.0, 50.0),
            Detection::found(100.0, 50.0),
            Detection::missed(),
            // V+ and V-: lost immediately
            Detection::found(100.0, 50.0),
            Detection::missed(),
            Detection::found(100.0, 50.0),
            Detection::missed(),
        ];
        let mut c = calibrator(script, params());

        let readings = c.calibrate().await.unwrap();
        let h = readings.axis(Axis::Horizontal);
        assert_eq!(h.len(), 1);

        let set = h.get(2).unwrap();
        assert_eq!(set.readings().len(), 2);
        assert!((set.readings()[0] - 0.3).abs() < 1e-12);
        assert!((set.readings()[1] - 0.6).abs() < 1e-12);
        assert!((set.accepted().unwrap() - 0.45).abs() < 1e-12);
        assert!(readings.axis(Axis::Vertical).is_empty());
    }

    #[tokio::test]
    async fn saccade_never_exceeds_limit() {
        let params = CalibrationParams {
            max_saccade: 3.0,
            ..params()
        };
        // target always visible, moves 1 px per step
        let script = (0..1000).map(|i| Detection::found(100.0 + (i % 7) as f64, 100.0));
        let mut c = calibrator(script, params);

        c.calibrate().await.unwrap();
        let (mechanism, _, _) = c.into_parts();

        let relative = mechanism
            .commands
            .iter()
            .filter_map(|c| match c {
                Cmd::Relative(s) => Some(s.pan_percent.abs().max(s.tilt_percent.abs())),
                _ => None,
            })
            .collect::<Vec<_>>();

        assert!(relative.iter().all(|m| *m <= 3.0));
        // 3.0 / 0.3 steps per direction
        assert_eq!(relative.len(), 4 * 10);
    }

    #[tokio::test]
    async fn burns_stale_frames() {
        let params = CalibrationParams {
            capture_buffer_burn: 2,
            ..params()
        };
        // stale frames claim "found", the fresh ones miss
        let script = [
            Detection::found(1.0, 1.0),
            Detection::found(1.0, 1.0),
            Detection::found(5.0, 1.0),
            Detection::missed(),
        ];
        let mut c = calibrator(script, params);

        let readings = c.calibrate().await.unwrap();
        assert!(readings.is_empty());

        let (_, camera, _) = c.into_parts();
        assert_eq!(camera.captures, 4 * 2 * 2);
    }

    #[tokio::test]
    async fn progress_reported() {
        let script = [Detection::found(0.0, 0.0), Detection::found(3.0, 0.0)];
        let mut c = calibrator(script, params());
        let rx = c.subscribe();

        c.calibrate().await.unwrap();
        assert!(matches!(*rx.borrow(), CalibrationProgress::Done));
    }

    #[tokio::test]
    async fn cancelled_run_keeps_table() {
        let (cancel_tx, cancel_rx) = watch::channel(true);
        let mut c = calibrator([], params()).with_cancel(cancel_rx);

        let resolution = Resolution::new(640, 480);
        let mut table = CalibrationTable::new();
        let mut old = AxesCalibrationReadings::new();
        old.axis_mut(Axis::Horizontal).record(1, 0.3);
        table.replace(resolution, old.clone());

        let result = c.calibrate_resolution(&mut table, resolution).await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(table.get(&resolution), Some(&old));

        cancel_tx.send_replace(false);
        c.calibrate_resolution(&mut table, resolution).await.unwrap();
        assert!(table.get(&resolution).unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_saccade_limits_rejected() {
        for max_saccade in [f64::NAN, 0.0, -5.0] {
            let mut c = calibrator(
                [],
                CalibrationParams {
                    max_saccade,
                    ..params()
                },
            );
            assert!(matches!(c.calibrate().await, Err(Error::Config(_))));

            let (mechanism, _, _) = c.into_parts();
            assert!(mechanism.commands.is_empty());
        }

        let mut c = calibrator(
            [],
            CalibrationParams {
                saccade_increment: 0.0,
                ..params()
            },
        );
        assert!(matches!(c.calibrate().await, Err(Error::Config(_))));
    }
}
