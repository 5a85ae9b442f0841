//! Closed sets of positions and states reported by the instrument.
//!
//! Every set has an `Unknown` member (sensor indeterminate) and an `Error`
//! member. Tokens outside the set decode to `Error`, with the exception of
//! [`TemperatureStatus`], whose device already reports `UNKNOWN` for
//! anything it cannot classify.

use std::fmt;

use crate::decoder::Decode;
use crate::error::DecodeError;

pub trait WireToken: Sized + Copy {
    /// Member reported for tokens outside the known set.
    const FALLBACK: Self;

    fn from_token(token: &str) -> Option<Self>;
    fn lower_token(&self) -> &'static str;
    fn upper_token(&self) -> &'static str;
}

fn decode_token<T: WireToken>(payload: &str) -> T {
    T::from_token(payload).unwrap_or(T::FALLBACK)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InOutPosition {
    In,
    Out,
    Unknown,
    Error,
}

impl WireToken for InOutPosition {
    const FALLBACK: Self = InOutPosition::Error;

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "in" => Some(InOutPosition::In),
            "out" => Some(InOutPosition::Out),
            "unknown" => Some(InOutPosition::Unknown),
            _ => None,
        }
    }

    fn lower_token(&self) -> &'static str {
        match self {
            InOutPosition::In => "in",
            InOutPosition::Out => "out",
            InOutPosition::Unknown => "unknown",
            InOutPosition::Error => "error",
        }
    }

    fn upper_token(&self) -> &'static str {
        match self {
            InOutPosition::In => "IN",
            InOutPosition::Out => "OUT",
            InOutPosition::Unknown => "UNKNOWN",
            InOutPosition::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OnOffState {
    On,
    Off,
    Unknown,
    Error,
}

impl WireToken for OnOffState {
    const FALLBACK: Self = OnOffState::Error;

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "on" => Some(OnOffState::On),
            "off" => Some(OnOffState::Off),
            "unknown" => Some(OnOffState::Unknown),
            _ => None,
        }
    }

    fn lower_token(&self) -> &'static str {
        match self {
            OnOffState::On => "on",
            OnOffState::Off => "off",
            OnOffState::Unknown => "unknown",
            OnOffState::Error => "error",
        }
    }

    fn upper_token(&self) -> &'static str {
        match self {
            OnOffState::On => "ON",
            OnOffState::Off => "OFF",
            OnOffState::Unknown => "UNKNOWN",
            OnOffState::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExposureStatus {
    None,
    WaitStart,
    Clear,
    Expose,
    PreReadout,
    Readout,
    PostReadout,
    Unknown,
    Error,
}

impl WireToken for ExposureStatus {
    const FALLBACK: Self = ExposureStatus::Error;

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "NONE" => Some(ExposureStatus::None),
            "WAIT_START" => Some(ExposureStatus::WaitStart),
            "CLEAR" => Some(ExposureStatus::Clear),
            "EXPOSE" => Some(ExposureStatus::Expose),
            "PRE_READOUT" => Some(ExposureStatus::PreReadout),
            "READOUT" => Some(ExposureStatus::Readout),
            "POST_READOUT" => Some(ExposureStatus::PostReadout),
            "UNKNOWN" => Some(ExposureStatus::Unknown),
            _ => None,
        }
    }

    fn lower_token(&self) -> &'static str {
        match self {
            ExposureStatus::None => "none",
            ExposureStatus::WaitStart => "wait_start",
            ExposureStatus::Clear => "clear",
            ExposureStatus::Expose => "expose",
            ExposureStatus::PreReadout => "pre_readout",
            ExposureStatus::Readout => "readout",
            ExposureStatus::PostReadout => "post_readout",
            ExposureStatus::Unknown => "unknown",
            ExposureStatus::Error => "error",
        }
    }

    fn upper_token(&self) -> &'static str {
        match self {
            ExposureStatus::None => "NONE",
            ExposureStatus::WaitStart => "WAIT_START",
            ExposureStatus::Clear => "CLEAR",
            ExposureStatus::Expose => "EXPOSE",
            ExposureStatus::PreReadout => "PRE_READOUT",
            ExposureStatus::Readout => "READOUT",
            ExposureStatus::PostReadout => "POST_READOUT",
            ExposureStatus::Unknown => "UNKNOWN",
            ExposureStatus::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemperatureStatus {
    Off,
    Ambient,
    Ok,
    Ramping,
    Unknown,
}

impl WireToken for TemperatureStatus {
    const FALLBACK: Self = TemperatureStatus::Unknown;

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "OFF" => Some(TemperatureStatus::Off),
            "AMBIENT" => Some(TemperatureStatus::Ambient),
            "OK" => Some(TemperatureStatus::Ok),
            "RAMPING" => Some(TemperatureStatus::Ramping),
            "UNKNOWN" => Some(TemperatureStatus::Unknown),
            _ => None,
        }
    }

    fn lower_token(&self) -> &'static str {
        match self {
            TemperatureStatus::Off => "off",
            TemperatureStatus::Ambient => "ambient",
            TemperatureStatus::Ok => "ok",
            TemperatureStatus::Ramping => "ramping",
            TemperatureStatus::Unknown => "unknown",
        }
    }

    fn upper_token(&self) -> &'static str {
        match self {
            TemperatureStatus::Off => "OFF",
            TemperatureStatus::Ambient => "AMBIENT",
            TemperatureStatus::Ok => "OK",
            TemperatureStatus::Ramping => "RAMPING",
            TemperatureStatus::Unknown => "UNKNOWN",
        }
    }
}

/// Rotation stage position. The stage reports a bare integer index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RotationPosition {
    At(i32),
    Unknown,
    Error,
}

impl Decode for RotationPosition {
    fn decode(payload: &str) -> Result<Self, DecodeError> {
        match payload {
            "unknown" => Ok(RotationPosition::Unknown),
            "error" => Ok(RotationPosition::Error),
            _ => i32::decode(payload).map(RotationPosition::At),
        }
    }
}

impl fmt::Display for RotationPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationPosition::At(index) => write!(f, "{}", index),
            RotationPosition::Unknown => write!(f, "UNKNOWN"),
            RotationPosition::Error => write!(f, "ERROR"),
        }
    }
}

macro_rules! token_enum_impls {
    ($($state:ty),*) => {
        $(
            impl Decode for $state {
                fn decode(payload: &str) -> Result<Self, DecodeError> {
                    Ok(decode_token(payload))
                }
            }

            impl fmt::Display for $state {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.upper_token())
                }
            }
        )*
    };
}

token_enum_impls!(InOutPosition, OnOffState, ExposureStatus, TemperatureStatus);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_out_tokens() {
        assert_eq!(InOutPosition::decode("in"), Ok(InOutPosition::In));
        assert_eq!(InOutPosition::decode("out"), Ok(InOutPosition::Out));
        assert_eq!(InOutPosition::decode("unknown"), Ok(InOutPosition::Unknown));
        assert_eq!(InOutPosition::decode("bogus"), Ok(InOutPosition::Error));
        assert_eq!(InOutPosition::decode("IN"), Ok(InOutPosition::Error));
        assert_eq!(InOutPosition::decode(""), Ok(InOutPosition::Error));
    }

    #[test]
    fn on_off_tokens() {
        assert_eq!(OnOffState::decode("on"), Ok(OnOffState::On));
        assert_eq!(OnOffState::decode("off"), Ok(OnOffState::Off));
        assert_eq!(OnOffState::decode("unknown"), Ok(OnOffState::Unknown));
        assert_eq!(OnOffState::decode("On"), Ok(OnOffState::Error));
    }

    #[test]
    fn exposure_status_tokens() {
        let all = [
            ExposureStatus::None,
            ExposureStatus::WaitStart,
            ExposureStatus::Clear,
            ExposureStatus::Expose,
            ExposureStatus::PreReadout,
            ExposureStatus::Readout,
            ExposureStatus::PostReadout,
        ];
        for status in all {
            assert_eq!(ExposureStatus::decode(status.upper_token()), Ok(status));
        }
        assert_eq!(ExposureStatus::decode("expose"), Ok(ExposureStatus::Error));
    }

    #[test]
    fn temperature_status_falls_back_to_unknown() {
        assert_eq!(TemperatureStatus::decode("RAMPING"), Ok(TemperatureStatus::Ramping));
        assert_eq!(TemperatureStatus::decode("STABILISED"), Ok(TemperatureStatus::Unknown));
    }

    #[test]
    fn encoders_give_both_cases() {
        assert_eq!(InOutPosition::In.lower_token(), "in");
        assert_eq!(InOutPosition::In.upper_token(), "IN");
        assert_eq!(OnOffState::Off.lower_token(), "off");
        assert_eq!(ExposureStatus::PreReadout.upper_token(), "PRE_READOUT");
        assert_eq!(InOutPosition::Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn rotation_positions() {
        assert_eq!(RotationPosition::decode("1"), Ok(RotationPosition::At(1)));
        assert_eq!(RotationPosition::decode("unknown"), Ok(RotationPosition::Unknown));
        assert_eq!(RotationPosition::decode("error"), Ok(RotationPosition::Error));
        assert!(matches!(
            RotationPosition::decode("left"),
            Err(DecodeError::NotInteger { .. })
        ));
    }
}
