use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One sample notified by the data logger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub battery_voltage: f64,
}

impl Reading {
    /// JSON has no encoding for NaN or infinity, so such a reading cannot be stored
    pub fn is_finite(&self) -> bool {
        Metric::ALL.iter().all(|metric| metric.value(self).is_finite())
    }
}

/// Identity of the peripheral that produced a session.
///
/// A session keeps its own copy, so the connection flags are a snapshot
/// taken when the session started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub id: String,
    pub name: Option<String>,
    pub mac_address: String,
    pub is_connected: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_sync: Option<OffsetDateTime>,
    #[serde(default)]
    pub battery_level: Option<f64>,
}

impl DeviceInfo {
    /// Placeholder used when the link never reported a MAC address
    pub const UNKNOWN_MAC: &'static str = "Unknown";

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Sensor fields carried by a [`Reading`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Metric {
    Temperature,
    Humidity,
    Pressure,
    #[value(name = "battery")]
    BatteryVoltage,
}

impl Metric {
    /// Column order used by the CSV export
    pub const ALL: [Metric; 4] = [
        Metric::Temperature,
        Metric::Humidity,
        Metric::Pressure,
        Metric::BatteryVoltage,
    ];

    pub fn value(&self, reading: &Reading) -> f64 {
        match self {
            Metric::Temperature => reading.temperature,
            Metric::Humidity => reading.humidity,
            Metric::Pressure => reading.pressure,
            Metric::BatteryVoltage => reading.battery_voltage,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Temperature => "Temperature",
            Metric::Humidity => "Humidity",
            Metric::Pressure => "Pressure",
            Metric::BatteryVoltage => "Battery",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Temperature => "°C",
            Metric::Humidity => "%",
            Metric::Pressure => "hPa",
            Metric::BatteryVoltage => "V",
        }
    }

    /// Decimal places kept when a value is exported or displayed
    pub fn precision(&self) -> usize {
        match self {
            Metric::Temperature | Metric::BatteryVoltage => 2,
            Metric::Humidity | Metric::Pressure => 1,
        }
    }

    pub fn csv_header(&self) -> String {
        format!("{} ({})", self.label(), self.unit())
    }
}

/// Minimum, maximum and arithmetic mean of one metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl FieldStats {
    /// Returns None for an empty input.
    pub fn from_values<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for value in values {
            count += 1;
            sum += value;
            min = min.min(value);
            max = max.max(value);
        }

        if count == 0 {
            return None;
        }

        Some(FieldStats {
            min,
            max,
            avg: sum / count as f64,
        })
    }
}

/// Aggregates shown for a single session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    pub temperature: FieldStats,
    pub humidity: FieldStats,
    pub pressure: FieldStats,
    pub duration: time::Duration,
    pub data_points: usize,
}

/// One bounded acquisition run.
///
/// Readings can only be pushed by the log store while the session is
/// active; once `end_time` is set the session is never touched again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "SessionRecord")]
pub struct Session {
    device_info: DeviceInfo,
    #[serde(with = "time::serde::rfc3339")]
    start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    end_time: Option<OffsetDateTime>,
    data_count: usize,
    readings: Vec<Reading>,
}

/// Wire form of a session. `dataCount` is derived, so whatever was stored
/// is ignored and recomputed from the readings.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    device_info: DeviceInfo,
    #[serde(with = "time::serde::rfc3339")]
    start_time: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    end_time: Option<OffsetDateTime>,
    // Older exports named the array `data`
    #[serde(default, alias = "data")]
    readings: Vec<Reading>,
}

impl From<SessionRecord> for Session {
    fn from(record: SessionRecord) -> Self {
        Session {
            device_info: record.device_info,
            start_time: record.start_time,
            end_time: record.end_time,
            data_count: record.readings.len(),
            readings: record.readings,
        }
    }
}

impl Session {
    pub(crate) fn start(device_info: DeviceInfo, start_time: OffsetDateTime) -> Self {
        Session {
            device_info,
            start_time,
            end_time: None,
            data_count: 0,
            readings: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, reading: Reading) {
        self.readings.push(reading);
        self.data_count = self.readings.len();
    }

    pub(crate) fn finish(&mut self, end_time: OffsetDateTime) {
        self.end_time = Some(end_time);
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    pub fn start_time(&self) -> OffsetDateTime {
        self.start_time
    }

    pub fn end_time(&self) -> Option<OffsetDateTime> {
        self.end_time
    }

    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn data_count(&self) -> usize {
        self.data_count
    }

    /// Statistics with `now` standing in for the end of a still active session.
    pub fn statistics_at(&self, now: OffsetDateTime) -> Option<SessionStats> {
        let stats = |metric: Metric| {
            FieldStats::from_values(self.readings.iter().map(|r| metric.value(r)))
        };

        Some(SessionStats {
            temperature: stats(Metric::Temperature)?,
            humidity: stats(Metric::Humidity)?,
            pressure: stats(Metric::Pressure)?,
            duration: self.end_time.unwrap_or(now) - self.start_time,
            data_points: self.readings.len(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{device, reading};
    use super::*;
    use time::macros::datetime;

    #[test]
    fn push_keeps_data_count_in_step() {
        let mut session = Session::start(device(), datetime!(2024-01-01 0:00 UTC));
        for i in 0..5 {
            session.push(reading(datetime!(2024-01-01 0:00 UTC), i as f64));
            assert_eq!(session.data_count(), session.readings().len());
        }
        let temperatures: Vec<f64> = session.readings().iter().map(|r| r.temperature).collect();
        assert_eq!(temperatures, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn statistics_of_three_temperatures() {
        let mut session = Session::start(device(), datetime!(2024-01-01 0:00 UTC));
        session.push(reading(datetime!(2024-01-01 0:01 UTC), 10.0));
        session.push(reading(datetime!(2024-01-01 0:02 UTC), 20.0));
        session.push(reading(datetime!(2024-01-01 0:03 UTC), 30.0));
        session.finish(datetime!(2024-01-01 0:10 UTC));

        let stats = session
            .statistics_at(datetime!(2024-01-02 0:00 UTC))
            .unwrap();
        assert_eq!(stats.temperature.min, 10.0);
        assert_eq!(stats.temperature.max, 30.0);
        assert_eq!(stats.temperature.avg, 20.0);
        assert_eq!(stats.data_points, 3);
        assert_eq!(stats.duration, time::Duration::minutes(10));
    }

    #[test]
    fn statistics_of_active_session_run_until_now() {
        let mut session = Session::start(device(), datetime!(2024-01-01 0:00 UTC));
        session.push(reading(datetime!(2024-01-01 0:01 UTC), 10.0));

        let stats = session
            .statistics_at(datetime!(2024-01-01 1:00 UTC))
            .unwrap();
        assert_eq!(stats.duration, time::Duration::hours(1));
    }

    #[test]
    fn empty_session_has_no_statistics() {
        let session = Session::start(device(), datetime!(2024-01-01 0:00 UTC));
        assert!(session
            .statistics_at(datetime!(2024-01-01 1:00 UTC))
            .is_none());
    }

    #[test]
    fn stored_data_count_is_recomputed() {
        let json = r#"{
            "deviceInfo": {"id": "x", "name": null, "macAddress": "Unknown", "isConnected": false},
            "startTime": "2024-01-01T00:00:00Z",
            "endTime": "2024-01-01T00:05:00Z",
            "dataCount": 42,
            "readings": [
                {"timestamp": "2024-01-01T00:01:00Z", "temperature": 1.0, "humidity": 2.0, "pressure": 3.0, "batteryVoltage": 4.0}
            ]
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.data_count(), 1);
        assert_eq!(session.end_time(), Some(datetime!(2024-01-01 0:05 UTC)));
        assert_eq!(session.readings()[0].timestamp, datetime!(2024-01-01 0:01 UTC));
    }

    #[test]
    fn metric_precision_matches_export_columns() {
        assert_eq!(Metric::Temperature.precision(), 2);
        assert_eq!(Metric::Humidity.precision(), 1);
        assert_eq!(Metric::Pressure.precision(), 1);
        assert_eq!(Metric::BatteryVoltage.precision(), 2);
        assert_eq!(Metric::Temperature.csv_header(), "Temperature (°C)");
    }

    #[test]
    fn readings_under_legacy_data_key_load() {
        let json = r#"{
            "deviceInfo": {"id": "x", "name": null, "macAddress": "Unknown", "isConnected": false},
            "startTime": "2024-01-01T00:00:00Z",
            "endTime": "2024-01-01T00:05:00Z",
            "dataCount": 1,
            "data": [
                {"timestamp": "2024-01-01T00:01:00Z", "temperature": 1.0, "humidity": 2.0, "pressure": 3.0, "batteryVoltage": 4.0}
            ]
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.data_count(), 1);
        assert_eq!(session.readings()[0].battery_voltage, 4.0);
    }

    #[test]
    fn non_finite_fields_are_detected() {
        let ok = reading(datetime!(2024-01-01 0:00 UTC), 20.0);
        assert!(ok.is_finite());

        let mut bad = ok.clone();
        bad.temperature = f64::NAN;
        assert!(!bad.is_finite());

        let mut bad = ok;
        bad.pressure = f64::INFINITY;
        assert!(!bad.is_finite());
    }
}
