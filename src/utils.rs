/// Utility functions for number and time formatting
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format.
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description!("[day].[month].[year] - [hour]:[minute]:[second]");
    dt.format(&format).unwrap_or_else(|_| dt.to_string())
}

/// ISO-8601 UTC timestamp with millisecond precision, e.g. 2024-01-01T00:00:00.000Z
pub fn format_iso_utc(dt: &OffsetDateTime) -> String {
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    );
    let utc = dt.to_offset(UtcOffset::UTC);
    utc.format(&format).unwrap_or_else(|_| utc.to_string())
}

/// Calendar date as YYYY-MM-DD, used in export file names
pub fn format_date(dt: &OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day]");
    dt.format(&format).unwrap_or_else(|_| dt.date().to_string())
}

/// Render a duration as e.g. `1h 02m 03s`
pub fn format_duration(duration: time::Duration) -> String {
    let total = duration.whole_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, total % 3600 / 60, total % 60);
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Round half away from zero to `decimals` places and render with exactly that many
pub fn format_rounded(value: f64, decimals: usize) -> String {
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor).round() / factor;
    // Avoid printing "-0.00" for tiny negatives
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{:.*}", decimals, rounded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn rounds_to_field_precision() {
        assert_eq!(format_rounded(21.567, 2), "21.57");
        assert_eq!(format_rounded(45.26, 1), "45.3");
        assert_eq!(format_rounded(45.25, 1), "45.3");
        assert_eq!(format_rounded(-2.5, 0), "-3");
        assert_eq!(format_rounded(3.7, 2), "3.70");
        assert_eq!(format_rounded(-0.001, 2), "0.00");
    }

    #[test]
    fn iso_timestamps_are_utc_with_millis() {
        assert_eq!(
            format_iso_utc(&datetime!(2024-01-01 2:00:00.5 +2)),
            "2024-01-01T00:00:00.500Z"
        );
    }

    #[test]
    fn formats_human_readable_values() {
        assert_eq!(
            format_datetime(&datetime!(2024-03-05 7:08:09 UTC)),
            "05.03.2024 - 07:08:09"
        );
        assert_eq!(format_date(&datetime!(2024-03-05 23:59 UTC)), "2024-03-05");
        assert_eq!(format_duration(time::Duration::seconds(3723)), "1h 02m 03s");
        assert_eq!(format_duration(time::Duration::seconds(65)), "1m 05s");
        assert_eq!(format_duration(time::Duration::seconds(9)), "9s");
    }
}
