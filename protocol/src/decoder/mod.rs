//! Typed interpretation of reply payloads.
//!
//! A command carries the decoder for its reply as data ([`DecoderKind`]);
//! nothing is inferred from the content of the reply itself.

pub mod composite;
pub mod numeric;
pub mod states;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::engine::Exchange;
use crate::error::{DecodeError, ProtocolError};
use crate::reply::{Framing, ParsedReply};

pub use composite::{MultrunFile, TemperatureSample, TemperatureStatusSample, parse_timestamp};
pub use numeric::{GyroReading, SensorReading};
pub use states::{
    ExposureStatus, InOutPosition, OnOffState, RotationPosition, TemperatureStatus, WireToken,
};

pub trait Decode: Sized {
    fn decode(payload: &str) -> Result<Self, DecodeError>;
}

/// Payload of a command whose only meaningful outcome is its return code.
/// The text is kept for logging.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Acknowledgement(pub String);

impl Decode for Acknowledgement {
    fn decode(payload: &str) -> Result<Self, DecodeError> {
        Ok(Acknowledgement(payload.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderKind {
    Acknowledge,
    Integer,
    Double,
    InOut,
    OnOff,
    Rotation,
    ExposureStatus,
    IndexFilename,
    TimestampTemperature,
    TimestampStatus,
    Timestamp,
    Gyro,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Acknowledged(Acknowledgement),
    Integer(i32),
    Double(SensorReading),
    InOut(InOutPosition),
    OnOff(OnOffState),
    Rotation(RotationPosition),
    ExposureStatus(ExposureStatus),
    IndexFilename(MultrunFile),
    TimestampTemperature(TemperatureSample),
    TimestampStatus(TemperatureStatusSample),
    Timestamp(DateTime<Utc>),
    Gyro(GyroReading),
}

impl DecoderKind {
    pub fn decode(&self, payload: &str) -> Result<Decoded, DecodeError> {
        Ok(match self {
            DecoderKind::Acknowledge => Decoded::Acknowledged(Acknowledgement::decode(payload)?),
            DecoderKind::Integer => Decoded::Integer(i32::decode(payload)?),
            DecoderKind::Double => Decoded::Double(SensorReading::decode(payload)?),
            DecoderKind::InOut => Decoded::InOut(InOutPosition::decode(payload)?),
            DecoderKind::OnOff => Decoded::OnOff(OnOffState::decode(payload)?),
            DecoderKind::Rotation => Decoded::Rotation(RotationPosition::decode(payload)?),
            DecoderKind::ExposureStatus => {
                Decoded::ExposureStatus(ExposureStatus::decode(payload)?)
            }
            DecoderKind::IndexFilename => Decoded::IndexFilename(MultrunFile::decode(payload)?),
            DecoderKind::TimestampTemperature => {
                Decoded::TimestampTemperature(TemperatureSample::decode(payload)?)
            }
            DecoderKind::TimestampStatus => {
                Decoded::TimestampStatus(TemperatureStatusSample::decode(payload)?)
            }
            DecoderKind::Timestamp => Decoded::Timestamp(DateTime::<Utc>::decode(payload)?),
            DecoderKind::Gyro => Decoded::Gyro(GyroReading::decode(payload)?),
        })
    }
}

impl fmt::Display for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decoded::Acknowledged(Acknowledgement(text)) if text.is_empty() => write!(f, "ok"),
            Decoded::Acknowledged(Acknowledgement(text)) => write!(f, "ok ({})", text),
            Decoded::Integer(value) => write!(f, "{}", value),
            Decoded::Double(reading) => write!(f, "{}", reading.value()),
            Decoded::InOut(position) => write!(f, "{}", position),
            Decoded::OnOff(state) => write!(f, "{}", state),
            Decoded::Rotation(position) => write!(f, "{}", position),
            Decoded::ExposureStatus(status) => write!(f, "{}", status),
            Decoded::IndexFilename(file) => write!(f, "{} {}", file.index, file.filename),
            Decoded::TimestampTemperature(sample) => {
                write!(f, "{} {:.2}", sample.timestamp.to_rfc3339(), sample.temperature)
            }
            Decoded::TimestampStatus(sample) => {
                write!(f, "{} {}", sample.timestamp.to_rfc3339(), sample.status)
            }
            Decoded::Timestamp(timestamp) => write!(f, "{}", timestamp.to_rfc3339()),
            Decoded::Gyro(reading) => write!(f, "{} {} {}", reading.x, reading.y, reading.z),
        }
    }
}

/// A reply paired with the outcome of decoding it.
///
/// The reply only counts as successful when the device returned code 0 and
/// the payload matched the decoder's grammar. Every accessor for the decoded
/// value fails otherwise; there is no default value to fall back on.
#[derive(Debug, Clone)]
pub struct TypedReply<T> {
    command: String,
    reply: ParsedReply,
    decoded: Option<Result<T, DecodeError>>,
}

impl<T: Decode> TypedReply<T> {
    pub fn new(command: impl Into<String>, reply: ParsedReply) -> Self {
        let decoded = reply.ok().then(|| T::decode(reply.payload()));
        Self {
            command: command.into(),
            reply,
            decoded,
        }
    }
}

impl<T> TypedReply<T> {
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn reply(&self) -> &ParsedReply {
        &self.reply
    }

    pub fn ok(&self) -> bool {
        matches!(self.decoded, Some(Ok(_)))
    }

    fn decode_error(&self, source: DecodeError) -> ProtocolError {
        ProtocolError::Decode {
            command: self.command.clone(),
            source,
        }
    }

    fn upstream_error(&self) -> ProtocolError {
        ProtocolError::Upstream {
            command: self.command.clone(),
            code: self.reply.return_code(),
            description: self.reply.payload().to_string(),
        }
    }

    pub fn value(&self) -> Result<&T, ProtocolError> {
        match &self.decoded {
            Some(Ok(value)) => Ok(value),
            Some(Err(e)) => Err(self.decode_error(e.clone())),
            None => Err(self.upstream_error()),
        }
    }

    pub fn into_value(self) -> Result<T, ProtocolError> {
        match self.decoded {
            Some(Ok(value)) => Ok(value),
            Some(Err(source)) => Err(ProtocolError::Decode {
                command: self.command,
                source,
            }),
            None => Err(ProtocolError::Upstream {
                command: self.command,
                code: self.reply.return_code(),
                description: self.reply.payload().to_string(),
            }),
        }
    }
}

/// One command as data: the exact line sent, how the reply is framed and
/// which decoder interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    line: String,
    framing: Framing,
    decoder: DecoderKind,
    reply_timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(line: impl Into<String>, framing: Framing, decoder: DecoderKind) -> Self {
        Self {
            line: line.into(),
            framing,
            decoder,
            reply_timeout: None,
        }
    }

    /// Commands that keep the connection open while the device works, such
    /// as exposures, need longer than the transport's read timeout.
    pub fn with_reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = Some(reply_timeout);
        self
    }

    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn decoder(&self) -> DecoderKind {
        self.decoder
    }

    /// Applies this command's decoder to a reply already received for it.
    pub fn interpret(&self, reply: ParsedReply) -> Result<Decoded, ProtocolError> {
        let payload = reply.into_payload(&self.line)?;
        self.decoder
            .decode(&payload)
            .map_err(|source| ProtocolError::Decode {
                command: self.line.clone(),
                source,
            })
    }

    pub async fn execute(&self, exchange: &dyn Exchange) -> Result<Decoded, ProtocolError> {
        let reply = exchange.exchange(self).await?;
        self.interpret(reply)
    }

    /// Sends the command and decodes the reply straight into `T`. The caller
    /// is responsible for `T` matching [`CommandSpec::decoder`].
    pub async fn execute_typed<T: Decode>(
        &self,
        exchange: &dyn Exchange,
    ) -> Result<TypedReply<T>, ProtocolError> {
        let reply = exchange.exchange(self).await?;
        Ok(TypedReply::new(self.line.clone(), reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_reply_never_exposes_a_value() {
        let reply = TypedReply::<i32>::new("status multrun index", ParsedReply::new(3, "busy"));

        assert!(!reply.ok());
        assert!(matches!(
            reply.value(),
            Err(ProtocolError::Upstream { code: 3, .. })
        ));
    }

    #[test]
    fn decode_failure_turns_a_zero_code_into_a_failure() {
        let reply = TypedReply::<i32>::new("status multrun index", ParsedReply::new(0, "abc"));

        assert!(reply.reply().ok());
        assert!(!reply.ok());
        assert!(matches!(
            reply.into_value(),
            Err(ProtocolError::Decode {
                source: DecodeError::NotInteger { .. },
                ..
            })
        ));
    }

    #[test]
    fn successful_reply_exposes_its_value() {
        let reply = TypedReply::<i32>::new("status exposure length", ParsedReply::new(0, "42"));
        assert!(reply.ok());
        assert_eq!(reply.value().unwrap(), &42);
    }

    #[test]
    fn interpret_selects_the_decoder_from_the_command() {
        let spec = CommandSpec::new("slit", Framing::Bare, DecoderKind::InOut);
        assert_eq!(
            spec.interpret(ParsedReply::new(0, "in")).unwrap(),
            Decoded::InOut(InOutPosition::In)
        );

        let spec = CommandSpec::new("status exposure status", Framing::ReturnCode, DecoderKind::ExposureStatus);
        assert_eq!(
            spec.interpret(ParsedReply::new(0, "READOUT")).unwrap(),
            Decoded::ExposureStatus(ExposureStatus::Readout)
        );

        let error = spec.interpret(ParsedReply::new(12, "Camera offline")).unwrap_err();
        assert_eq!(error.device_description(), Some("Camera offline"));
        assert_eq!(error.command(), "status exposure status");
    }

    #[tokio::test]
    async fn execute_typed_keeps_the_raw_reply() {
        let backend = crate::mock::ScriptedBackend::new()
            .on("status exposure length", ["0 1500"])
            .on("status multrun index", ["1 not in a multrun"]);

        let spec = CommandSpec::new("status exposure length", Framing::ReturnCode, DecoderKind::Integer);
        let reply = spec.execute_typed::<i32>(&backend).await.unwrap();
        assert_eq!(reply.command(), "status exposure length");
        assert_eq!(reply.into_value().unwrap(), 1500);

        let spec = CommandSpec::new("status multrun index", Framing::ReturnCode, DecoderKind::Integer);
        let reply = spec.execute_typed::<i32>(&backend).await.unwrap();
        assert_eq!(reply.reply().return_code(), 1);
        assert_eq!(
            reply.value().unwrap_err().device_description(),
            Some("not in a multrun")
        );
    }
}
