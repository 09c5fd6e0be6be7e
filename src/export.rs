/// CSV export of sensor readings
use std::fs;
use std::io;
use std::path::Path;

use time::OffsetDateTime;

use crate::models::{Metric, Reading, Session};
use crate::utils::{format_date, format_iso_utc, format_rounded};

const FILE_PREFIX: &str = "chiro-logger";

/// What to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTarget {
    /// Completed session at this index
    Session(usize),
    /// The session still being recorded
    Active,
    /// Every reading, newest first
    All,
}

/// Header row of the exported file
pub fn csv_header() -> String {
    let mut columns = vec!["Timestamp".to_string()];
    columns.extend(Metric::ALL.iter().map(Metric::csv_header));
    columns.join(",")
}

/// One CSV row for a reading
pub fn csv_row(reading: &Reading) -> String {
    let mut fields = vec![format_iso_utc(&reading.timestamp)];
    fields.extend(
        Metric::ALL
            .iter()
            .map(|metric| format_rounded(metric.value(reading), metric.precision())),
    );
    fields.join(",")
}

/// Header plus one row per reading, in the order given
pub fn readings_to_csv<'a, I>(readings: I) -> String
where
    I: IntoIterator<Item = &'a Reading>,
{
    let mut lines = vec![csv_header()];
    lines.extend(readings.into_iter().map(csv_row));
    lines.join("\n")
}

/// File name for a single session export
pub fn session_file_name(session: &Session) -> String {
    let name = sanitize(session.device_info().display_name());
    format!(
        "{}-{}-{}.csv",
        FILE_PREFIX,
        name,
        format_date(&session.start_time())
    )
}

/// File name for an export of every reading
pub fn all_data_file_name(today: &OffsetDateTime) -> String {
    format!("{}-all-data-{}.csv", FILE_PREFIX, format_date(today))
}

pub fn write_csv(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, content)
}

// Device names end up in file names; keep them to a safe character set
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::device;
    use time::macros::datetime;

    fn sample() -> Reading {
        Reading {
            timestamp: datetime!(2024-01-01 0:00 UTC),
            temperature: 21.567,
            humidity: 45.26,
            pressure: 1013.14,
            battery_voltage: 3.7,
        }
    }

    #[test]
    fn header_lists_units() {
        assert_eq!(
            csv_header(),
            "Timestamp,Temperature (°C),Humidity (%),Pressure (hPa),Battery (V)"
        );
    }

    #[test]
    fn row_uses_field_precision() {
        assert_eq!(
            csv_row(&sample()),
            "2024-01-01T00:00:00.000Z,21.57,45.3,1013.1,3.70"
        );
    }

    #[test]
    fn document_keeps_given_order() {
        let mut later = sample();
        later.timestamp = datetime!(2024-01-01 0:05 UTC);
        let csv = readings_to_csv(&[sample(), later]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("2024-01-01T00:00:00.000Z"));
        assert!(lines[2].starts_with("2024-01-01T00:05:00.000Z"));
    }

    #[test]
    fn empty_export_is_header_only() {
        assert_eq!(readings_to_csv(std::iter::empty()), csv_header());
    }

    #[test]
    fn file_names_follow_device_and_date() {
        let session = Session::start(device(), datetime!(2024-05-06 10:00 UTC));
        assert_eq!(
            session_file_name(&session),
            "chiro-logger-ChiroLogger-01-2024-05-06.csv"
        );
        assert_eq!(
            all_data_file_name(&datetime!(2024-05-07 1:00 UTC)),
            "chiro-logger-all-data-2024-05-07.csv"
        );
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out").join("data.csv");
        write_csv(&path, "a,b").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "a,b");
    }
}
