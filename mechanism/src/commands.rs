use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use sprat_protocol::decoder::{InOutPosition, OnOffState, WireToken};
use sprat_protocol::{CommandSpec, DecoderKind, Framing};

/// Positions the rotation stage can be commanded to.
pub const ROTATION_POSITIONS: RangeInclusive<i32> = 0..=1;

/// Two-position mechanisms with in/out sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mechanism {
    Grism,
    Mirror,
    Slit,
}

impl Mechanism {
    pub const ALL: [Mechanism; 3] = [Mechanism::Grism, Mechanism::Mirror, Mechanism::Slit];

    pub fn token(&self) -> &'static str {
        match self {
            Mechanism::Grism => "grism",
            Mechanism::Mirror => "mirror",
            Mechanism::Slit => "slit",
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Mechanism {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mechanism::ALL
            .into_iter()
            .find(|mechanism| mechanism.token() == s)
            .ok_or_else(|| format!("unknown mechanism {:?}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lamp {
    Arc,
    Tungsten,
}

impl Lamp {
    pub fn token(&self) -> &'static str {
        match self {
            Lamp::Arc => "arclamp",
            Lamp::Tungsten => "wlamp",
        }
    }
}

impl FromStr for Lamp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "arc" | "arclamp" => Ok(Lamp::Arc),
            "w" | "wlamp" | "tungsten" => Ok(Lamp::Tungsten),
            _ => Err(format!("unknown lamp {:?}", s)),
        }
    }
}

/// Commands understood by the mechanism microcontroller. Commands that take
/// an optional target query the current state when it is `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MechanismCommand {
    InOut {
        mechanism: Mechanism,
        target: Option<InOutPosition>,
    },
    Lamp {
        lamp: Lamp,
        state: Option<OnOffState>,
    },
    Rotation {
        target: Option<i32>,
    },
    Gyro,
    Humidity {
        sensor: u32,
    },
    Temperature {
        sensor: u32,
    },
}

impl MechanismCommand {
    pub fn line(&self) -> String {
        match self {
            MechanismCommand::InOut {
                mechanism,
                target: Some(target),
            } => format!("{} {}", mechanism.token(), target.lower_token()),
            MechanismCommand::InOut {
                mechanism,
                target: None,
            } => mechanism.token().to_string(),
            MechanismCommand::Lamp {
                lamp,
                state: Some(state),
            } => format!("{} {}", lamp.token(), state.lower_token()),
            MechanismCommand::Lamp { lamp, state: None } => lamp.token().to_string(),
            MechanismCommand::Rotation {
                target: Some(target),
            } => format!("rotation {}", target),
            MechanismCommand::Rotation { target: None } => "rotation".to_string(),
            MechanismCommand::Gyro => "gyro".to_string(),
            MechanismCommand::Humidity { sensor } => format!("humidity {}", sensor),
            MechanismCommand::Temperature { sensor } => format!("temperature {}", sensor),
        }
    }

    pub fn decoder(&self) -> DecoderKind {
        match self {
            MechanismCommand::InOut { .. } => DecoderKind::InOut,
            MechanismCommand::Lamp { .. } => DecoderKind::OnOff,
            MechanismCommand::Rotation { .. } => DecoderKind::Rotation,
            MechanismCommand::Gyro => DecoderKind::Gyro,
            MechanismCommand::Humidity { .. } | MechanismCommand::Temperature { .. } => {
                DecoderKind::Double
            }
        }
    }

    pub fn spec(&self) -> CommandSpec {
        CommandSpec::new(self.line(), Framing::Bare, self.decoder())
    }
}
