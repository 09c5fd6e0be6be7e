/// Normalized series for plotting one metric over the most recent readings
use time::OffsetDateTime;

use crate::models::{FieldStats, Metric, Reading};

/// Points shown by default
pub const DEFAULT_WINDOW: usize = 50;

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Where a value sits between the window min and max.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Low,
    Mid,
    High,
}

impl Band {
    /// Band for a position in 0 to 100, split at a third and two thirds
    pub fn from_position(y: f64) -> Self {
        let fraction = y / 100.0;
        if fraction < 0.33 {
            Band::Low
        } else if fraction < 0.66 {
            Band::Mid
        } else {
            Band::High
        }
    }

    /// Marker printed under the sparkline
    pub fn marker(&self) -> char {
        match self {
            Band::Low => '-',
            Band::Mid => '=',
            Band::High => '#',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    /// Horizontal position, 0 to 100
    pub x: f64,
    /// Value scaled into 0 to 100 between the window min and max
    pub y: f64,
    pub band: Band,
    pub value: f64,
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub metric: Metric,
    pub points: Vec<ChartPoint>,
    pub stats: Option<FieldStats>,
}

/// Build a series from at most `window` of the newest readings
///
/// `readings` may be in any order; points come out oldest first.
pub fn series(readings: &[Reading], metric: Metric, window: usize) -> ChartSeries {
    let mut recent: Vec<&Reading> = readings.iter().collect();
    recent.sort_by_key(|r| r.timestamp);
    let recent = &recent[recent.len().saturating_sub(window)..];

    let stats = FieldStats::from_values(recent.iter().map(|r| metric.value(r)));
    let last = recent.len().saturating_sub(1);

    let points = recent
        .iter()
        .enumerate()
        .map(|(index, reading)| {
            let value = metric.value(reading);
            let x = if last == 0 {
                50.0
            } else {
                index as f64 / last as f64 * 100.0
            };
            let y = match stats {
                Some(s) if s.max > s.min => (value - s.min) / (s.max - s.min) * 100.0,
                _ => 50.0,
            };
            ChartPoint {
                x,
                y,
                band: Band::from_position(y),
                value,
                timestamp: reading.timestamp,
            }
        })
        .collect();

    ChartSeries {
        metric,
        points,
        stats,
    }
}

/// One character per point
pub fn sparkline(series: &ChartSeries) -> String {
    series
        .points
        .iter()
        .map(|p| {
            let level = (p.y / 100.0 * (SPARK_LEVELS.len() - 1) as f64).round() as usize;
            SPARK_LEVELS[level.min(SPARK_LEVELS.len() - 1)]
        })
        .collect()
}

/// Band marker per point, aligned with [`sparkline`]
pub fn band_line(series: &ChartSeries) -> String {
    series.points.iter().map(|p| p.band.marker()).collect()
}
