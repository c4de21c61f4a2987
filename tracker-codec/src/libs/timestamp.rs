//! Envelope timestamp normalization.
//!
//! The network server writes local times with a fixed UTC offset suffix such as
//! `2017-06-01T14:03:21.517+02:00`. The suffix differs between deployments and does not follow
//! daylight-saving changes, so each schema version carries the suffix it expects and anything
//! else is rejected instead of being misparsed.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::error::DecodeError;

pub const DEF_UTC_OFFSET: &'static str = "+02:00";

/// Local part of the envelope time. `%.f` also accepts times without fractional seconds.
const LOCAL_FORMAT: &'static str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TimestampFormat {
    /// Offset suffix in `+HH:MM` or `-HH:MM` form.
    #[serde(rename = "utcOffset")]
    pub utc_offset: String,
}

impl Default for TimestampFormat {
    fn default() -> Self {
        TimestampFormat {
            utc_offset: DEF_UTC_OFFSET.to_string(),
        }
    }
}

impl TimestampFormat {
    pub fn new(utc_offset: &str) -> Self {
        TimestampFormat {
            utc_offset: utc_offset.to_string(),
        }
    }

    /// The full accepted format, for diagnostics.
    pub fn format_str(&self) -> String {
        format!("{}{}", LOCAL_FORMAT, self.utc_offset)
    }

    pub fn offset(&self) -> Result<FixedOffset, String> {
        parse_offset(self.utc_offset.as_str())
    }

    /// Parses an envelope time into UTC.
    pub fn parse(&self, time: &str) -> Result<DateTime<Utc>, DecodeError> {
        let err = || DecodeError::TimestampParseError {
            time: time.to_string(),
            format: self.format_str(),
        };

        let offset = self.offset().map_err(|_| err())?;
        let local = time.strip_suffix(self.utc_offset.as_str()).ok_or_else(err)?;
        let naive = NaiveDateTime::parse_from_str(local, LOCAL_FORMAT).map_err(|_| err())?;
        match offset.from_local_datetime(&naive).single() {
            None => Err(err()),
            Some(t) => Ok(t.with_timezone(&Utc)),
        }
    }
}

fn parse_offset(value: &str) -> Result<FixedOffset, String> {
    let bytes = value.as_bytes();
    let digits = |range: &[u8]| range.iter().all(u8::is_ascii_digit);
    if bytes.len() != 6 || bytes[3] != b':' || !digits(&bytes[1..3]) || !digits(&bytes[4..6]) {
        return Err(format!("UTC offset `{}` is not in ±HH:MM form", value));
    }
    let sign = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return Err(format!("UTC offset `{}` has no sign", value)),
    };
    let hours = value[1..3]
        .parse::<i32>()
        .map_err(|_| format!("UTC offset `{}` has invalid hours", value))?;
    let minutes = value[4..6]
        .parse::<i32>()
        .map_err(|_| format!("UTC offset `{}` has invalid minutes", value))?;
    if hours > 23 || minutes > 59 {
        return Err(format!("UTC offset `{}` out of range", value));
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| format!("UTC offset `{}` out of range", value))
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn parse_with_fraction() {
        let format = TimestampFormat::new("+02:00");
        let t = format.parse("2017-06-01T14:03:21.517+02:00").unwrap();
        assert_eq!((t.year(), t.month(), t.day()), (2017, 6, 1));
        assert_eq!((t.hour(), t.minute(), t.second()), (12, 3, 21));
        assert_eq!(t.timestamp_subsec_millis(), 517);
    }

    #[test]
    fn parse_without_fraction() {
        let format = TimestampFormat::new("+01:00");
        let t = format.parse("2017-12-24T00:30:00+01:00").unwrap();
        assert_eq!((t.month(), t.day(), t.hour(), t.minute()), (12, 23, 23, 30));
    }

    #[test]
    fn wrong_suffix() {
        let format = TimestampFormat::new("+02:00");
        let err = format.parse("2017-12-24T00:30:00.000+01:00").unwrap_err();
        assert_eq!(
            err,
            DecodeError::TimestampParseError {
                time: "2017-12-24T00:30:00.000+01:00".to_string(),
                format: "%Y-%m-%dT%H:%M:%S%.f+02:00".to_string(),
            }
        );
        assert!(format.parse("2017-12-24T00:30:00.000").is_err());
        assert!(format.parse("24.12.2017 00:30+02:00").is_err());
    }

    #[test]
    fn offsets() {
        assert_eq!(
            parse_offset("-05:30").unwrap().local_minus_utc(),
            -(5 * 3600 + 30 * 60)
        );
        assert!(parse_offset("02:00").is_err());
        assert!(parse_offset("+2:00").is_err());
        assert!(parse_offset("+24:00").is_err());
        assert!(parse_offset("Z").is_err());
    }
}
