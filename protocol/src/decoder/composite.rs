use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::decoder::Decode;
use crate::decoder::states::TemperatureStatus;
use crate::error::DecodeError;

fn bad_timestamp(timestamp: &str, reason: impl Into<String>) -> DecodeError {
    DecodeError::BadTimestamp {
        timestamp: timestamp.to_string(),
        reason: reason.into(),
    }
}

/// Parses `YYYY-MM-DDTHH:MM:SS[.fff]` into a UTC instant. Fractional seconds
/// are truncated and anything after the seconds field (such as a trailing
/// zone designator) is ignored.
pub fn parse_timestamp(timestamp: &str) -> Result<DateTime<Utc>, DecodeError> {
    let fields: Vec<&str> = timestamp.split(['-', 'T', ':']).collect();
    if fields.len() < 6 {
        return Err(bad_timestamp(
            timestamp,
            format!("expected 6 date/time fields, found {}", fields.len()),
        ));
    }

    let number = |index: usize, name: &str| {
        fields[index]
            .trim()
            .parse::<u32>()
            .map_err(|_| bad_timestamp(timestamp, format!("{} {:?} is not a number", name, fields[index])))
    };

    let year = fields[0]
        .parse::<i32>()
        .map_err(|_| bad_timestamp(timestamp, format!("year {:?} is not a number", fields[0])))?;
    let month = number(1, "month")?;
    let day = number(2, "day")?;
    let hour = number(3, "hour")?;
    let minute = number(4, "minute")?;

    let seconds_field = fields[5].split_whitespace().next().unwrap_or_default();
    let whole_seconds = seconds_field.split('.').next().unwrap_or_default();
    let second = whole_seconds
        .parse::<u32>()
        .map_err(|_| bad_timestamp(timestamp, format!("seconds {:?} is not a number", seconds_field)))?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .ok_or_else(|| bad_timestamp(timestamp, "field out of range"))?;

    Ok(Utc.from_utc_datetime(&naive))
}

fn token<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    index: usize,
    field: &'static str,
    payload: &str,
) -> Result<&'a str, DecodeError> {
    tokens.next().ok_or_else(|| DecodeError::MissingToken {
        index,
        field,
        payload: payload.to_string(),
    })
}

impl Decode for DateTime<Utc> {
    fn decode(payload: &str) -> Result<Self, DecodeError> {
        let mut tokens = payload.split_whitespace();
        parse_timestamp(token(&mut tokens, 0, "timestamp", payload)?)
    }
}

/// Frame index and FITS filename written by an exposure command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultrunFile {
    pub index: i32,
    pub filename: String,
}

impl Decode for MultrunFile {
    fn decode(payload: &str) -> Result<Self, DecodeError> {
        let mut tokens = payload.split_whitespace();
        let index = i32::decode(token(&mut tokens, 0, "index", payload)?)?;
        let filename = token(&mut tokens, 1, "filename", payload)?;

        Ok(MultrunFile {
            index,
            filename: filename.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureSample {
    pub timestamp: DateTime<Utc>,
    /// Degrees Celsius.
    pub temperature: f64,
}

impl Decode for TemperatureSample {
    fn decode(payload: &str) -> Result<Self, DecodeError> {
        let mut tokens = payload.split_whitespace();
        let timestamp = parse_timestamp(token(&mut tokens, 0, "timestamp", payload)?)?;
        let temperature = token(&mut tokens, 1, "temperature", payload)?;
        let temperature = temperature
            .parse::<f64>()
            .map_err(|_| DecodeError::NotDouble {
                payload: payload.to_string(),
            })?;

        Ok(TemperatureSample {
            timestamp,
            temperature,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemperatureStatusSample {
    pub timestamp: DateTime<Utc>,
    pub status: TemperatureStatus,
}

impl Decode for TemperatureStatusSample {
    fn decode(payload: &str) -> Result<Self, DecodeError> {
        let mut tokens = payload.split_whitespace();
        let timestamp = parse_timestamp(token(&mut tokens, 0, "timestamp", payload)?)?;
        let status = TemperatureStatus::decode(token(&mut tokens, 1, "status", payload)?)?;

        Ok(TemperatureStatusSample { timestamp, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn timestamp_truncates_fraction() {
        let parsed = parse_timestamp("2020-01-02T03:04:05.678").unwrap();
        assert_eq!(
            (parsed.year(), parsed.month(), parsed.day()),
            (2020, 1, 2)
        );
        assert_eq!(
            (parsed.hour(), parsed.minute(), parsed.second()),
            (3, 4, 5)
        );
        assert_eq!(parsed.nanosecond(), 0);
    }

    #[test]
    fn timestamp_without_fraction_or_with_zone_suffix() {
        let expected = Utc.with_ymd_and_hms(2023, 11, 30, 23, 59, 59).unwrap();
        assert_eq!(parse_timestamp("2023-11-30T23:59:59").unwrap(), expected);
        assert_eq!(parse_timestamp("2023-11-30T23:59:59.001 UTC").unwrap(), expected);
    }

    #[test]
    fn malformed_timestamps() {
        for bad in ["2020-01-02", "2020-13-02T03:04:05", "2020-01-02T03:xx:05", "yesterday"] {
            assert!(
                matches!(parse_timestamp(bad), Err(DecodeError::BadTimestamp { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn multrun_file_takes_the_second_token_as_filename() {
        let expected = MultrunFile {
            index: 3,
            filename: "/data/sprat/s_e_20200102_3_1_1_0.fits".to_string(),
        };
        assert_eq!(
            MultrunFile::decode("3 /data/sprat/s_e_20200102_3_1_1_0.fits"),
            Ok(expected.clone())
        );
        assert_eq!(
            MultrunFile::decode("3 /data/sprat/s_e_20200102_3_1_1_0.fits extra 7"),
            Ok(expected.clone())
        );
        assert_eq!(
            MultrunFile::decode("3  /data/sprat/s_e_20200102_3_1_1_0.fits"),
            Ok(expected)
        );
        assert!(matches!(
            MultrunFile::decode("3"),
            Err(DecodeError::MissingToken { field: "filename", .. })
        ));
        assert!(matches!(
            MultrunFile::decode(""),
            Err(DecodeError::MissingToken { field: "index", .. })
        ));
        assert!(matches!(
            MultrunFile::decode("three file.fits"),
            Err(DecodeError::NotInteger { .. })
        ));
    }

    #[test]
    fn temperature_samples() {
        let sample = TemperatureSample::decode("2020-01-02T03:04:05.678 -60.25").unwrap();
        assert_eq!(sample.temperature, -60.25);
        assert_eq!(sample.timestamp, Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap());

        assert!(matches!(
            TemperatureSample::decode("2020-01-02T03:04:05.678"),
            Err(DecodeError::MissingToken { field: "temperature", .. })
        ));

        let status = TemperatureStatusSample::decode("2020-01-02T03:04:05 RAMPING").unwrap();
        assert_eq!(status.status, TemperatureStatus::Ramping);
    }

    #[test]
    fn composite_replies_ignore_trailing_tokens() {
        let expected = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            DateTime::<Utc>::decode("2020-01-02T03:04:05 UTC extra"),
            Ok(expected)
        );

        let sample = TemperatureSample::decode("2020-01-02T03:04:05.678 -60.25 extra").unwrap();
        assert_eq!(sample.timestamp, expected);
        assert_eq!(sample.temperature, -60.25);

        let status = TemperatureStatusSample::decode("2020-01-02T03:04:05 OK extra").unwrap();
        assert_eq!(status.status, TemperatureStatus::Ok);
    }

    #[test]
    fn unrecognised_cooler_status_is_unknown() {
        let status = TemperatureStatusSample::decode("2020-01-02T03:04:05 STABLE").unwrap();
        assert_eq!(status.status, TemperatureStatus::Unknown);
        assert_eq!(
            status.timestamp,
            Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap()
        );
    }
}
