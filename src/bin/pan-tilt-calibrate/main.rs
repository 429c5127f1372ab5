mod cli;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use futures_util::stream::StreamExt;
use itertools::Itertools;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pan_tilt_calibrate::{
    emulation, report, AxesCalibrationReadings, Axis, CalibrationParams, CalibrationProgress,
    CalibrationStore, CalibrationTable, Calibrator, Config, Detection, MonotonicClock,
    PanTiltMechanism, Resolution, SerialServoController, Setting, TokioSettle, TrackingController,
};

use cli::{Cli, Com};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cmd = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pan_tilt_calibrate=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    tracing::info!("Loading config...");
    let (config, config_path) = Config::load()?;
    tracing::debug!("Config {:?}:\n{}", config_path, config);

    let store = match cmd.file {
        Some(path) => CalibrationStore::new(path),
        None => CalibrationStore::from_config(&config)?,
    };

    match cmd.command {
        Com::Calibrate {
            resolution,
            settle_ms,
        } => calibrate(&config, &store, resolution, settle_ms).await,
        Com::Interpolate => {
            let mut table = store.read()?;
            table.calculate_accepted_readings();
            table.interpolate();
            store.write(&table)?;
            Ok(())
        }
        Com::Show {
            resolution,
            verbose,
        } => {
            let table = store.read()?;
            show(&table, resolution, verbose);
            Ok(())
        }
        Com::Export { path } => {
            let table = store.read()?;
            let path = report::export_path(&path, chrono::Local::now())?;
            report::export_xlsx(&table, &path)?;
            println!("{}", path.display());
            Ok(())
        }
        Com::Pursuit {
            x,
            y,
            resolution,
            duration_ms,
            port,
        } => {
            let resolution = resolution.unwrap_or_else(|| config.emulation.resolution());
            let duration = Duration::from_millis(duration_ms.unwrap_or(config.pursuit_duration_ms));
            pursuit(&config, &store, resolution, duration, (x, y), port).await
        }
        Com::Center { port } => {
            let mut servo = open_servo(&config, port).await?;
            servo.center().await?;
            tracing::info!("Servos centered");
            Ok(())
        }
    }
}

async fn open_servo(config: &Config, port: Option<String>) -> anyhow::Result<SerialServoController> {
    let port = port
        .or_else(|| config.servo_port.clone())
        .context("No serial port given and ServoPort is not set in the config")?;

    tracing::info!("Opening servo board at {}...", port);
    let mut servo = SerialServoController::open(
        port,
        config.servo_baud_rate,
        Duration::from_millis(config.port_timeout_ms),
    )?
    .with_trys(3);
    servo.test_connection().await?;
    Ok(servo)
}

async fn calibrate(
    config: &Config,
    store: &CalibrationStore,
    resolution: Option<Resolution>,
    settle_ms: Option<u64>,
) -> anyhow::Result<()> {
    let mut rig_config = config.emulation;
    if let Some(r) = resolution {
        rig_config.width = r.width;
        rig_config.height = r.height;
    }

    let mut params = CalibrationParams::from(config);
    if let Some(ms) = settle_ms {
        params.settle_time = Duration::from_millis(ms);
    }

    let mut table = store.read_or_default()?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping calibration...");
            cancel_tx.send_replace(true);
        }
    });

    let (mechanism, camera, detector) = emulation::rig(rig_config);
    let mut calibrator =
        Calibrator::new(mechanism, camera, detector, TokioSettle, params).with_cancel(cancel_rx);

    let mut progress = calibrator.subscribe();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let p = *progress.borrow_and_update();
            tracing::debug!("{}", p);
            if let CalibrationProgress::Done = p {
                break;
            }
        }
    });

    let res = calibrator
        .calibrate_resolution(&mut table, rig_config.resolution())
        .await;
    drop(calibrator);
    let _ = reporter.await;
    res?;

    store.write(&table)?;
    if let Some(readings) = table.get(&rig_config.resolution()) {
        print_summary(rig_config.resolution(), readings);
    }
    Ok(())
}

fn print_summary(resolution: Resolution, readings: &AxesCalibrationReadings) {
    println!("{}:", resolution);
    for axis in Axis::ALL {
        let r = readings.axis(axis);
        match r.range() {
            Some((lo, hi)) => println!("  {}: {} in [{}, {}] px", axis, r, lo, hi),
            None => println!("  {}: not calibrated", axis),
        }
    }
}

fn show(table: &CalibrationTable, resolution: Option<Resolution>, verbose: bool) {
    if table.is_empty() {
        println!("Calibration table is empty");
        return;
    }

    for (res, readings) in table
        .iter()
        .filter(|(res, _)| resolution.map_or(true, |r| r == **res))
    {
        print_summary(*res, readings);
        if !verbose {
            continue;
        }
        for axis in Axis::ALL {
            println!("  {}:", axis);
            for (chunk_no, chunk) in readings.axis(axis).iter().chunks(8).into_iter().enumerate() {
                let line = chunk.map(|(d, set)| format!("{d}:{set}")).join("  ");
                println!("    #{:<3} {}", chunk_no, line);
            }
        }
    }
}

async fn pursuit(
    config: &Config,
    store: &CalibrationStore,
    resolution: Resolution,
    duration: Duration,
    point: (f64, f64),
    port: Option<String>,
) -> anyhow::Result<()> {
    let table = store.read()?;
    let tracker = TrackingController::from_table(&table, resolution, duration)
        .with_context(|| format!("Resolution {} is not calibrated", resolution))?;

    let mut servo = match port {
        Some(p) => Some(open_servo(config, Some(p)).await?),
        None => None,
    };
    let current = servo
        .as_ref()
        .map(|s| s.current_setting())
        .unwrap_or(Setting::CENTER);

    let detection = Detection::found(point.0, point.1);
    let Some(target) = tracker.pursue(current, &detection, MonotonicClock::start())? else {
        return Ok(());
    };
    tracing::info!("{} -> {} in {:?}", target.origin(), target.destination(), duration);

    let positions = target.into_stream(Duration::from_millis(config.pursuit_tick_ms));
    tokio::pin!(positions);
    while let Some(setting) = positions.next().await {
        match servo.as_mut() {
            Some(servo) => servo.move_absolute(setting).await?,
            None => println!("{}", setting),
        }
    }
    Ok(())
}
