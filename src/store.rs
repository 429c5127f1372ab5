use std::path::{Path, PathBuf};

use crate::{CalibrationTable, Config, Error};

/// Calibration table stored as a JSON file
pub struct CalibrationStore {
    path: PathBuf,
}

impl CalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/pan-tilt-calibrate/calibration.json`
    pub fn default_path() -> Result<PathBuf, Error> {
        directories::BaseDirs::new()
            .map(|base_dirs| {
                base_dirs
                    .config_dir()
                    .join(Path::new(crate::config::APP_DIR))
                    .join(Path::new("calibration.json"))
            })
            .ok_or_else(|| Error::Config("Failed to get config directory!".to_owned()))
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        match &config.calibration_file {
            Some(path) => Ok(Self::new(path)),
            None => Self::default_path().map(Self::new),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn read(&self) -> Result<CalibrationTable, Error> {
        let file = std::fs::File::open(&self.path).map_err(Error::Store)?;
        let table = serde_json::from_reader(std::io::BufReader::new(file))?;
        tracing::debug!("Calibration loaded from {:?}", self.path);
        Ok(table)
    }

    /// Stored table, or an empty one if nothing was stored yet
    pub fn read_or_default(&self) -> Result<CalibrationTable, Error> {
        if self.exists() {
            self.read()
        } else {
            Ok(CalibrationTable::new())
        }
    }

    /// Replace the stored table. A reader sees either the old or the new file, never a partial one.
    pub fn write(&self, table: &CalibrationTable) -> Result<(), Error> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(Error::Store)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        {
            let file = std::fs::File::create(&tmp).map_err(Error::Store)?;
            let mut writer = std::io::BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, table)?;
            let file = writer.into_inner().map_err(|e| Error::Store(e.into_error()))?;
            file.sync_all().map_err(Error::Store)?;
        }
        std::fs::rename(&tmp, &self.path).map_err(Error::Store)?;

        tracing::info!("Calibration written to {:?}", self.path);
        Ok(())
    }
}
