/// Decoding of the comma separated lines notified by the data logger
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::models::Reading;

// Line layout: timestamp,temperature,humidity,pressure,batteryVoltage
const FIELD_COUNT: usize = 5;
const NUMERIC_FIELDS: [&str; 4] = ["temperature", "humidity", "pressure", "batteryVoltage"];

/// Why a raw line could not become a [`Reading`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeFailure {
    #[error("expected at least 5 fields, found {0}")]
    TooFewFields(usize),
    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),
    #[error("invalid {field} value {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

/// A raw line rejected by [`decode_line`].
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot decode line {line:?}: {reason}")]
pub struct DecodeError {
    pub line: String,
    pub reason: DecodeFailure,
}

/// Decode one raw line into a reading
///
/// The line is trimmed and split on commas. Fields past the fifth are
/// ignored. The timestamp must be RFC 3339; each numeric field is trimmed
/// and must parse to a finite number. Nothing is returned unless every
/// field decodes.
pub fn decode_line(raw: &str) -> Result<Reading, DecodeError> {
    let fail = |reason| DecodeError {
        line: raw.to_string(),
        reason,
    };

    let parts: Vec<&str> = raw.trim().split(',').collect();
    if parts.len() < FIELD_COUNT {
        return Err(fail(DecodeFailure::TooFewFields(parts.len())));
    }

    let timestamp = OffsetDateTime::parse(parts[0].trim(), &Rfc3339)
        .map_err(|_| fail(DecodeFailure::InvalidTimestamp(parts[0].to_string())))?;

    let mut values = [0.0f64; 4];
    for (i, field) in NUMERIC_FIELDS.iter().enumerate() {
        let text = parts[i + 1].trim();
        values[i] = match text.parse::<f64>() {
            Ok(value) if value.is_finite() => value,
            _ => {
                return Err(fail(DecodeFailure::InvalidNumber {
                    field: *field,
                    value: text.to_string(),
                }))
            }
        };
    }

    Ok(Reading {
        timestamp,
        temperature: values[0],
        humidity: values[1],
        pressure: values[2],
        battery_voltage: values[3],
    })
}

/// Split a notification payload into the lines it carries
///
/// The logger normally sends one record per notification, but a payload may
/// also hold several newline separated records. Blank lines are skipped.
pub fn split_payload(payload: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(payload)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
