/// Command-line presentation of the session log
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use time::OffsetDateTime;

use crate::bluetooth::DeviceCommand;
use crate::chart::{band_line, series, sparkline, DEFAULT_WINDOW};
use crate::export::{all_data_file_name, session_file_name, write_csv, ExportTarget};
use crate::logger::SessionLog;
use crate::models::{FieldStats, Metric, Session};
use crate::utils::{format_datetime, format_duration, format_rounded};

#[derive(Debug, Parser)]
#[command(name = "chiro-logger", version, about = "Log and export ChiroLogger sensor sessions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect to the data logger and record a session (default)
    Run {
        /// Commands written to the logger after connecting
        #[arg(long = "send", value_enum)]
        send: Vec<DeviceCommand>,
    },
    /// List completed sessions with their statistics
    Sessions,
    /// Show readings from every session, newest first
    Readings {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Chart one metric over the most recent readings
    Chart {
        #[arg(long, value_enum, default_value = "temperature")]
        metric: Metric,
        #[arg(long, default_value_t = DEFAULT_WINDOW)]
        window: usize,
    },
    /// Export a session, or everything, as CSV
    Export {
        /// Session index as shown by `sessions`; omit to export all readings
        #[arg(long)]
        session: Option<usize>,
        /// Output file; defaults to a dated name in the export directory
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Delete one completed session
    Delete { index: usize },
    /// Delete every stored session
    Clear,
}

pub fn list_sessions(log: &SessionLog) -> String {
    if log.sessions().is_empty() {
        return "No sessions recorded".to_string();
    }

    let mut out = Vec::new();
    for (index, session) in log.sessions().iter().enumerate() {
        out.push(format!(
            "[{}] {} - started {}",
            index,
            session.device_info().display_name(),
            format_datetime(&session.start_time())
        ));
        out.push(describe_stats(log, session));
    }
    out.join("\n")
}

fn describe_stats(log: &SessionLog, session: &Session) -> String {
    let stats = match log.session_statistics(session) {
        Some(stats) => stats,
        None => return "    no readings".to_string(),
    };

    let line = |metric: Metric, s: &FieldStats| {
        let p = metric.precision();
        format!(
            "    {}: min {} / avg {} / max {} {}",
            metric.label(),
            format_rounded(s.min, p),
            format_rounded(s.avg, p),
            format_rounded(s.max, p),
            metric.unit()
        )
    };

    [
        format!(
            "    {} readings over {}",
            stats.data_points,
            format_duration(stats.duration)
        ),
        line(Metric::Temperature, &stats.temperature),
        line(Metric::Humidity, &stats.humidity),
        line(Metric::Pressure, &stats.pressure),
    ]
    .join("\n")
}

pub fn list_readings(log: &SessionLog, limit: usize) -> String {
    let readings = log.all_readings();
    if readings.is_empty() {
        return "No readings recorded".to_string();
    }

    readings
        .iter()
        .take(limit)
        .map(|r| {
            format!(
                "{}  {:>7}°C  {:>5}%  {:>7} hPa  {:>5} V",
                format_datetime(&r.timestamp),
                format_rounded(r.temperature, Metric::Temperature.precision()),
                format_rounded(r.humidity, Metric::Humidity.precision()),
                format_rounded(r.pressure, Metric::Pressure.precision()),
                format_rounded(r.battery_voltage, Metric::BatteryVoltage.precision())
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn chart(log: &SessionLog, metric: Metric, window: usize) -> String {
    let chart = series(&log.all_readings(), metric, window);
    match chart.stats {
        Some(stats) => {
            let p = metric.precision();
            format!(
                "{} ({}) over {} readings\n{}\n{}\nmin {}  avg {}  max {}",
                metric.label(),
                metric.unit(),
                chart.points.len(),
                sparkline(&chart),
                band_line(&chart),
                format_rounded(stats.min, p),
                format_rounded(stats.avg, p),
                format_rounded(stats.max, p)
            )
        }
        None => format!("No {} data to chart", metric.label().to_lowercase()),
    }
}

/// Export and write the CSV file, returning the path written
pub fn export(
    log: &SessionLog,
    session: Option<usize>,
    output: Option<PathBuf>,
    export_dir: &std::path::Path,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let (target, default_name) = match session {
        Some(index) => {
            let name = log
                .sessions()
                .get(index)
                .map(session_file_name)
                .unwrap_or_default();
            (ExportTarget::Session(index), name)
        }
        None => (
            ExportTarget::All,
            all_data_file_name(&OffsetDateTime::now_utc()),
        ),
    };

    let csv = log.export_csv(target)?;
    let path = output.unwrap_or_else(|| export_dir.join(default_name));
    write_csv(&path, &csv)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceInfo, Reading};
    use crate::storage::MemoryStorage;
    use clap::CommandFactory;
    use time::macros::datetime;

    fn populated_log() -> SessionLog {
        let mut log = SessionLog::open(Box::new(MemoryStorage::new()));
        log.start_session(DeviceInfo {
            id: "id".to_string(),
            name: Some("ChiroLogger".to_string()),
            mac_address: DeviceInfo::UNKNOWN_MAC.to_string(),
            is_connected: true,
            last_sync: None,
            battery_level: None,
        });
        for (minute, temperature) in [(0, 10.0), (1, 20.0), (2, 30.0)] {
            log.append(Reading {
                timestamp: datetime!(2024-01-01 0:00 UTC) + time::Duration::minutes(minute),
                temperature,
                humidity: 50.0,
                pressure: 1000.0,
                battery_voltage: 3.6,
            })
            .unwrap();
        }
        log.end_session();
        log
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["chiro-logger", "run", "--send", "download-all"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Run { ref send }) if send == &vec![DeviceCommand::DownloadAll]
        ));

        let cli = Cli::try_parse_from(["chiro-logger", "chart", "--metric", "battery"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Chart { metric: Metric::BatteryVoltage, window: 50 })
        ));
    }

    #[test]
    fn session_listing_shows_statistics() {
        let text = list_sessions(&populated_log());
        assert!(text.contains("[0] ChiroLogger"));
        assert!(text.contains("3 readings"));
        assert!(text.contains("Temperature: min 10.00 / avg 20.00 / max 30.00 °C"));
    }

    #[test]
    fn readings_are_newest_first() {
        let text = list_readings(&populated_log(), 2);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("30.00"));
        assert!(lines[1].contains("20.00"));
    }

    #[test]
    fn chart_shows_bands_under_sparkline() {
        let text = chart(&populated_log(), Metric::Temperature, DEFAULT_WINDOW);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Temperature (°C) over 3 readings");
        assert_eq!(lines[1].chars().count(), 3);
        assert_eq!(lines[2], "-=#");
        assert_eq!(lines[3], "min 10.00  avg 20.00  max 30.00");
    }

    #[test]
    fn export_writes_dated_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = populated_log();

        let path = export(&log, Some(0), None, dir.path()).unwrap();
        assert_eq!(path, dir.path().join(session_file_name(&log.sessions()[0])));
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 4);

        assert!(export(&log, Some(7), None, dir.path()).is_err());
    }
}
