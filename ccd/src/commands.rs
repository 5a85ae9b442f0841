use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use sprat_protocol::decoder::{OnOffState, WireToken};
use sprat_protocol::{CommandSpec, DecoderKind, Framing};

/// Longest keyword the detector server accepts in a `fitsheader` command.
pub const MAX_KEYWORD_LENGTH: usize = 12;

/// Time allowed on top of the exposure length for clearing and reading out
/// one frame before the reply is considered lost.
pub const FRAME_OVERHEAD: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown exposure type {0:?}")]
    UnknownExposureType(String),

    #[error("Invalid FITS keyword {keyword:?}: {reason}")]
    InvalidKeyword { keyword: String, reason: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExposureType {
    Acquire,
    Arc,
    Bias,
    Dark,
    Exposure,
    LampFlat,
    SkyFlat,
    Standard,
}

impl ExposureType {
    pub const ALL: [ExposureType; 8] = [
        ExposureType::Acquire,
        ExposureType::Arc,
        ExposureType::Bias,
        ExposureType::Dark,
        ExposureType::Exposure,
        ExposureType::LampFlat,
        ExposureType::SkyFlat,
        ExposureType::Standard,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            ExposureType::Acquire => "acquire",
            ExposureType::Arc => "arc",
            ExposureType::Bias => "bias",
            ExposureType::Dark => "dark",
            ExposureType::Exposure => "exposure",
            ExposureType::LampFlat => "lampflat",
            ExposureType::SkyFlat => "skyflat",
            ExposureType::Standard => "standard",
        }
    }
}

impl fmt::Display for ExposureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for ExposureType {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExposureType::ALL
            .into_iter()
            .find(|exposure_type| exposure_type.token() == s)
            .ok_or_else(|| CommandError::UnknownExposureType(s.to_string()))
    }
}

/// Sub-window of the detector, in unbinned pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start_x: u32,
    pub end_x: u32,
    pub start_y: u32,
    pub end_y: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FitsValue {
    Boolean(bool),
    Float(f64),
    Integer(i32),
    String(String),
    CommentString(String),
    Units(String),
}

impl FitsValue {
    pub fn type_token(&self) -> &'static str {
        match self {
            FitsValue::Boolean(_) => "boolean",
            FitsValue::Float(_) => "float",
            FitsValue::Integer(_) => "integer",
            FitsValue::String(_) => "string",
            FitsValue::CommentString(_) => "commentstring",
            FitsValue::Units(_) => "units",
        }
    }
}

impl fmt::Display for FitsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitsValue::Boolean(value) => write!(f, "{}", value),
            FitsValue::Float(value) => write!(f, "{}", value),
            FitsValue::Integer(value) => write!(f, "{}", value),
            FitsValue::String(value) | FitsValue::CommentString(value) | FitsValue::Units(value) => {
                f.write_str(value)
            }
        }
    }
}

pub fn validate_keyword(keyword: &str) -> Result<(), CommandError> {
    let invalid = |reason| CommandError::InvalidKeyword {
        keyword: keyword.to_string(),
        reason,
    };

    if keyword.is_empty() {
        return Err(invalid("empty"));
    }
    if keyword.len() > MAX_KEYWORD_LENGTH {
        return Err(invalid("longer than 12 characters"));
    }
    if keyword.chars().any(char::is_whitespace) {
        return Err(invalid("contains whitespace"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExposureQuery {
    Length,
    Status,
    StartTime,
    Multrun,
    Run,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultrunQuery {
    Count,
    Index,
    BinX,
    BinY,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureQuery {
    Get,
    Status,
}

/// Every command understood by the detector server.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorCommand {
    Abort,
    Bias,
    Config {
        x_bin: u32,
        y_bin: u32,
        window: Option<Window>,
    },
    Dark {
        exposure_ms: u32,
    },
    Expose {
        exposure_ms: u32,
    },
    FitsHeaderAdd {
        keyword: String,
        value: FitsValue,
    },
    FitsHeaderDelete {
        keyword: String,
    },
    FitsHeaderClear,
    MultBias {
        count: u32,
    },
    MultDark {
        exposure_ms: u32,
        count: u32,
    },
    Multrun {
        exposure_ms: u32,
        count: u32,
        exposure_type: ExposureType,
    },
    Shutdown,
    StatusExposure(ExposureQuery),
    StatusMultrun(MultrunQuery),
    StatusTemperature(TemperatureQuery),
    TemperatureCooler {
        on: bool,
    },
    TemperatureSet {
        celsius: f64,
    },
}

impl DetectorCommand {
    pub fn line(&self) -> String {
        match self {
            DetectorCommand::Abort => "abort".to_string(),
            DetectorCommand::Bias => "bias".to_string(),
            DetectorCommand::Config {
                x_bin,
                y_bin,
                window: None,
            } => format!("config {} {}", x_bin, y_bin),
            DetectorCommand::Config {
                x_bin,
                y_bin,
                window: Some(w),
            } => format!(
                "config {} {} {} {} {} {}",
                x_bin, y_bin, w.start_x, w.end_x, w.start_y, w.end_y
            ),
            DetectorCommand::Dark { exposure_ms } => format!("dark {}", exposure_ms),
            DetectorCommand::Expose { exposure_ms } => format!("expose {}", exposure_ms),
            DetectorCommand::FitsHeaderAdd { keyword, value } => {
                format!("fitsheader add {} {} {}", keyword, value.type_token(), value)
            }
            DetectorCommand::FitsHeaderDelete { keyword } => {
                format!("fitsheader delete {}", keyword)
            }
            DetectorCommand::FitsHeaderClear => "fitsheader clear".to_string(),
            DetectorCommand::MultBias { count } => format!("multbias {}", count),
            DetectorCommand::MultDark { exposure_ms, count } => {
                format!("multdark {} {}", exposure_ms, count)
            }
            DetectorCommand::Multrun {
                exposure_ms,
                count,
                exposure_type,
            } => format!("multrun {} {} {}", exposure_ms, count, exposure_type),
            DetectorCommand::Shutdown => "shutdown".to_string(),
            DetectorCommand::StatusExposure(query) => format!(
                "status exposure {}",
                match query {
                    ExposureQuery::Length => "length",
                    ExposureQuery::Status => "status",
                    ExposureQuery::StartTime => "start_time",
                    ExposureQuery::Multrun => "multrun",
                    ExposureQuery::Run => "run",
                }
            ),
            DetectorCommand::StatusMultrun(query) => format!(
                "status multrun {}",
                match query {
                    MultrunQuery::Count => "count",
                    MultrunQuery::Index => "index",
                    MultrunQuery::BinX => "binx",
                    MultrunQuery::BinY => "biny",
                }
            ),
            DetectorCommand::StatusTemperature(query) => format!(
                "status temperature {}",
                match query {
                    TemperatureQuery::Get => "get",
                    TemperatureQuery::Status => "status",
                }
            ),
            DetectorCommand::TemperatureCooler { on } => {
                let state = if *on { OnOffState::On } else { OnOffState::Off };
                format!("temperature cooler {}", state.lower_token())
            }
            DetectorCommand::TemperatureSet { celsius } => format!("temperature set {}", celsius),
        }
    }

    pub fn decoder(&self) -> DecoderKind {
        match self {
            DetectorCommand::Bias
            | DetectorCommand::Dark { .. }
            | DetectorCommand::Expose { .. }
            | DetectorCommand::MultBias { .. }
            | DetectorCommand::MultDark { .. }
            | DetectorCommand::Multrun { .. } => DecoderKind::IndexFilename,
            DetectorCommand::StatusExposure(ExposureQuery::Status) => DecoderKind::ExposureStatus,
            DetectorCommand::StatusExposure(ExposureQuery::StartTime) => DecoderKind::Timestamp,
            DetectorCommand::StatusExposure(_) | DetectorCommand::StatusMultrun(_) => {
                DecoderKind::Integer
            }
            DetectorCommand::StatusTemperature(TemperatureQuery::Get) => {
                DecoderKind::TimestampTemperature
            }
            DetectorCommand::StatusTemperature(TemperatureQuery::Status) => {
                DecoderKind::TimestampStatus
            }
            DetectorCommand::Abort
            | DetectorCommand::Config { .. }
            | DetectorCommand::FitsHeaderAdd { .. }
            | DetectorCommand::FitsHeaderDelete { .. }
            | DetectorCommand::FitsHeaderClear
            | DetectorCommand::Shutdown
            | DetectorCommand::TemperatureCooler { .. }
            | DetectorCommand::TemperatureSet { .. } => DecoderKind::Acknowledge,
        }
    }

    /// How long the server may hold the connection before it replies. Only
    /// commands that take frames wait on the detector.
    pub fn reply_timeout(&self) -> Option<Duration> {
        let frames = |exposure_ms: u32, count: u32| {
            (Duration::from_millis(exposure_ms as u64) + FRAME_OVERHEAD) * count.max(1)
        };

        match self {
            DetectorCommand::Bias => Some(frames(0, 1)),
            DetectorCommand::Dark { exposure_ms } | DetectorCommand::Expose { exposure_ms } => {
                Some(frames(*exposure_ms, 1))
            }
            DetectorCommand::MultBias { count } => Some(frames(0, *count)),
            DetectorCommand::MultDark { exposure_ms, count }
            | DetectorCommand::Multrun {
                exposure_ms, count, ..
            } => Some(frames(*exposure_ms, *count)),
            _ => None,
        }
    }

    pub fn spec(&self) -> CommandSpec {
        let spec = CommandSpec::new(self.line(), Framing::ReturnCode, self.decoder());
        match self.reply_timeout() {
            Some(reply_timeout) => spec.with_reply_timeout(reply_timeout),
            None => spec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposure_command_lines() {
        assert_eq!(DetectorCommand::Bias.line(), "bias");
        assert_eq!(DetectorCommand::Dark { exposure_ms: 1000 }.line(), "dark 1000");
        assert_eq!(DetectorCommand::MultBias { count: 5 }.line(), "multbias 5");
        assert_eq!(
            DetectorCommand::MultDark {
                exposure_ms: 60000,
                count: 3
            }
            .line(),
            "multdark 60000 3"
        );
        assert_eq!(
            DetectorCommand::Multrun {
                exposure_ms: 1000,
                count: 2,
                exposure_type: ExposureType::SkyFlat
            }
            .line(),
            "multrun 1000 2 skyflat"
        );
    }

    #[test]
    fn config_with_and_without_window() {
        assert_eq!(
            DetectorCommand::Config {
                x_bin: 2,
                y_bin: 2,
                window: None
            }
            .line(),
            "config 2 2"
        );
        assert_eq!(
            DetectorCommand::Config {
                x_bin: 1,
                y_bin: 1,
                window: Some(Window {
                    start_x: 1,
                    end_x: 1024,
                    start_y: 200,
                    end_y: 300
                })
            }
            .line(),
            "config 1 1 1 1024 200 300"
        );
    }

    #[test]
    fn status_and_temperature_lines() {
        assert_eq!(
            DetectorCommand::StatusExposure(ExposureQuery::StartTime).line(),
            "status exposure start_time"
        );
        assert_eq!(
            DetectorCommand::StatusMultrun(MultrunQuery::BinY).line(),
            "status multrun biny"
        );
        assert_eq!(
            DetectorCommand::StatusTemperature(TemperatureQuery::Get).line(),
            "status temperature get"
        );
        assert_eq!(
            DetectorCommand::TemperatureSet { celsius: -60.0 }.line(),
            "temperature set -60"
        );
        assert_eq!(
            DetectorCommand::TemperatureSet { celsius: -45.5 }.line(),
            "temperature set -45.5"
        );
        assert_eq!(
            DetectorCommand::TemperatureCooler { on: false }.line(),
            "temperature cooler off"
        );
    }

    #[test]
    fn fits_header_lines() {
        assert_eq!(
            DetectorCommand::FitsHeaderAdd {
                keyword: "OBJECT".to_string(),
                value: FitsValue::String("M 31".to_string())
            }
            .line(),
            "fitsheader add OBJECT string M 31"
        );
        assert_eq!(
            DetectorCommand::FitsHeaderAdd {
                keyword: "ROTSKYPA".to_string(),
                value: FitsValue::Float(12.5)
            }
            .line(),
            "fitsheader add ROTSKYPA float 12.5"
        );
        assert_eq!(
            DetectorCommand::FitsHeaderAdd {
                keyword: "GRISMIN".to_string(),
                value: FitsValue::Boolean(true)
            }
            .line(),
            "fitsheader add GRISMIN boolean true"
        );
        assert_eq!(
            DetectorCommand::FitsHeaderDelete {
                keyword: "OBJECT".to_string()
            }
            .line(),
            "fitsheader delete OBJECT"
        );
    }

    #[test]
    fn decoder_follows_reply_shape() {
        assert_eq!(DetectorCommand::Bias.decoder(), DecoderKind::IndexFilename);
        assert_eq!(
            DetectorCommand::StatusExposure(ExposureQuery::Length).decoder(),
            DecoderKind::Integer
        );
        assert_eq!(
            DetectorCommand::StatusExposure(ExposureQuery::Status).decoder(),
            DecoderKind::ExposureStatus
        );
        assert_eq!(
            DetectorCommand::StatusExposure(ExposureQuery::StartTime).decoder(),
            DecoderKind::Timestamp
        );
        assert_eq!(
            DetectorCommand::StatusTemperature(TemperatureQuery::Status).decoder(),
            DecoderKind::TimestampStatus
        );
        assert_eq!(DetectorCommand::Shutdown.decoder(), DecoderKind::Acknowledge);
    }

    #[test]
    fn only_frame_commands_extend_the_reply_timeout() {
        assert_eq!(DetectorCommand::Abort.spec().reply_timeout(), None);
        assert_eq!(
            DetectorCommand::MultDark {
                exposure_ms: 10_000,
                count: 2
            }
            .reply_timeout(),
            Some(Duration::from_secs(80))
        );
        assert_eq!(
            DetectorCommand::MultBias { count: 0 }.reply_timeout(),
            Some(FRAME_OVERHEAD)
        );
    }

    #[test]
    fn exposure_types_parse_from_their_tokens() {
        for exposure_type in ExposureType::ALL {
            assert_eq!(exposure_type.token().parse(), Ok(exposure_type));
        }
        assert_eq!(
            "flat".parse::<ExposureType>(),
            Err(CommandError::UnknownExposureType("flat".to_string()))
        );
    }

    #[test]
    fn keyword_validation() {
        assert!(validate_keyword("EXPTIME").is_ok());
        assert!(validate_keyword("").is_err());
        assert!(validate_keyword("TOOLONGKEYWORD").is_err());
        assert!(validate_keyword("TWO WORDS").is_err());
    }
}
