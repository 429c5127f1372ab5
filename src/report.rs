use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use itertools::Itertools;
use umya_spreadsheet::Worksheet;

use crate::{AxesCalibrationReadings, Axis, CalibrationTable, Error};

const ROW_OFFSET: u32 = 4;

/// Expand strftime placeholders in an export file name, e.g. `calibration_%Y-%m-%d.xlsx`
pub fn export_path(template: &Path, now: DateTime<Local>) -> Result<PathBuf, Error> {
    use std::fmt::Write;

    let template = template
        .to_str()
        .ok_or_else(|| Error::Report(format!("{:?} is not a valid UTF-8 path", template)))?;

    let mut path = String::new();
    write!(path, "{}", now.format(template))
        .map_err(|_| Error::Report(format!("Invalid date format in {:?}", template)))?;
    Ok(PathBuf::from(path))
}

/// One sheet per resolution, one row per calibrated pixel deviation
pub fn export_xlsx(table: &CalibrationTable, path: &Path) -> Result<(), Error> {
    if table.is_empty() {
        return Err(Error::Report("Calibration table is empty".to_owned()));
    }

    let mut book = umya_spreadsheet::new_file_empty_worksheet();
    let now: DateTime<Local> = Local::now();

    for (resolution, readings) in table.iter() {
        let sheet = book
            .new_sheet(resolution.to_string())
            .map_err(|e| Error::Report(e.to_owned()))?;
        fill_sheet(sheet, &format!("Calibration {}", resolution), now, readings);
    }

    umya_spreadsheet::writer::xlsx::write(&book, path)
        .map_err(|e| Error::Report(format!("Failed to write {:?}: {}", path, e)))?;

    tracing::info!("Report written to {:?}", path);
    Ok(())
}

fn fill_sheet(
    sheet: &mut Worksheet,
    title: &str,
    now: DateTime<Local>,
    readings: &AxesCalibrationReadings,
) {
    sheet.get_cell_value_mut("A1").set_value(title);
    sheet
        .get_cell_value_mut("D1")
        .set_value(now.format("%d.%m.%Y %T").to_string());

    for (col, header) in ["A", "B", "C", "D", "E"].into_iter().zip([
        "Axis",
        "Deviation, px",
        "Accepted, %",
        "Interpolated",
        "Readings, %",
    ]) {
        sheet
            .get_cell_value_mut(format!("{col}{}", ROW_OFFSET - 1))
            .set_value(header);
    }

    let rows = Axis::ALL
        .into_iter()
        .flat_map(|axis| readings.axis(axis).iter().map(move |(d, set)| (axis, d, set)));

    for (i, (axis, deviation, set)) in rows.enumerate() {
        let row = ROW_OFFSET + i as u32;

        sheet
            .get_cell_value_mut(format!("A{row}"))
            .set_value(axis.to_string());
        sheet
            .get_cell_value_mut(format!("B{row}"))
            .set_value_number(deviation);
        match set.accepted() {
            Some(accepted) => sheet
                .get_cell_value_mut(format!("C{row}"))
                .set_value_number(accepted),
            None => sheet.get_cell_value_mut(format!("C{row}")).set_value("-"),
        };
        sheet
            .get_cell_value_mut(format!("D{row}"))
            .set_value(if set.is_interpolated() { "yes" } else { "" });
        sheet
            .get_cell_value_mut(format!("E{row}"))
            .set_value(set.readings().iter().map(|r| format!("{:.3}", r)).join("; "));
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;
    use crate::Resolution;

    #[test]
    fn date_in_file_name() {
        let now = Local.with_ymd_and_hms(2024, 3, 7, 12, 30, 0).unwrap();
        let path = export_path(Path::new("out/calibration_%Y-%m-%d.xlsx"), now).unwrap();
        assert_eq!(path, PathBuf::from("out/calibration_2024-03-07.xlsx"));

        let path = export_path(Path::new("report.xlsx"), now).unwrap();
        assert_eq!(path, PathBuf::from("report.xlsx"));
    }

    #[test]
    fn empty_table_is_not_exported() {
        let dir = tempfile::tempdir().unwrap();
        let res = export_xlsx(&CalibrationTable::new(), &dir.path().join("r.xlsx"));
        assert!(matches!(res, Err(Error::Report(_))));
    }

    #[test]
    fn export_writes_sheet_per_resolution() {
        let mut readings = AxesCalibrationReadings::new();
        readings.axis_mut(Axis::Horizontal).record(-2, -0.2);
        readings.axis_mut(Axis::Horizontal).record(2, 0.2);
        readings.axis_mut(Axis::Vertical).record(1, 0.1);
        readings.calculate_accepted_readings();
        readings.interpolate();

        let mut table = CalibrationTable::new();
        table.replace(Resolution::new(640, 480), readings.clone());
        table.replace(Resolution::new(1280, 720), readings);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        export_xlsx(&table, &path).unwrap();

        let book = umya_spreadsheet::reader::xlsx::read(&path).unwrap();
        assert_eq!(book.get_sheet_count(), 2);
    }
}
