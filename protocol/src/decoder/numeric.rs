use crate::decoder::Decode;
use crate::error::DecodeError;

impl Decode for i32 {
    fn decode(payload: &str) -> Result<Self, DecodeError> {
        payload.parse::<i32>().map_err(|_| DecodeError::NotInteger {
            payload: payload.to_string(),
        })
    }
}

/// Splits an `ok <values...>` / `error <description>` payload into its
/// value part. Mechanism sensor readings signal failure in the payload
/// itself rather than through the return code.
fn strip_ok(payload: &str) -> Result<&str, DecodeError> {
    let mut tokens = payload.splitn(2, ' ');
    match (tokens.next(), tokens.next()) {
        (Some("ok"), Some(values)) => Ok(values),
        (Some("ok"), None) => Err(DecodeError::MissingToken {
            index: 1,
            field: "value",
            payload: payload.to_string(),
        }),
        (Some("error"), description) => Err(DecodeError::ErrorReply {
            description: description.unwrap_or_default().to_string(),
        }),
        _ => Err(DecodeError::UnexpectedReply {
            payload: payload.to_string(),
        }),
    }
}

fn parse_double(token: &str, payload: &str) -> Result<f64, DecodeError> {
    token.trim().parse::<f64>().map_err(|_| DecodeError::NotDouble {
        payload: payload.to_string(),
    })
}

/// A single floating point reading such as a temperature or humidity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading(pub f64);

impl SensorReading {
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Decode for SensorReading {
    fn decode(payload: &str) -> Result<Self, DecodeError> {
        let value = strip_ok(payload)?;
        parse_double(value, payload).map(SensorReading)
    }
}

/// Orientation reported by the gyroscope/accelerometer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GyroReading {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Decode for GyroReading {
    fn decode(payload: &str) -> Result<Self, DecodeError> {
        let values = strip_ok(payload)?;
        let mut tokens = values.split_whitespace();

        let mut next = |index: usize, field: &'static str| {
            tokens
                .next()
                .ok_or_else(|| DecodeError::MissingToken {
                    index,
                    field,
                    payload: payload.to_string(),
                })
                .and_then(|token| parse_double(token, payload))
        };

        Ok(GyroReading {
            x: next(1, "x")?,
            y: next(2, "y")?,
            z: next(3, "z")?,
        })
    }
}
