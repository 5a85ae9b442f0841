use std::sync::Arc;

use sprat_protocol::decoder::{GyroReading, InOutPosition, OnOffState, RotationPosition};
use sprat_protocol::{Decoded, DecodeError, Engine, Exchange, ProtocolError, TelnetSettings};
use tracing::debug;

use crate::commands::{Lamp, Mechanism, MechanismCommand};

/// Typed front end for the mechanism microcontroller.
#[derive(Clone)]
pub struct MechanismClient {
    exchange: Arc<dyn Exchange>,
}

fn unexpected(command: &MechanismCommand, decoded: Decoded) -> ProtocolError {
    ProtocolError::Decode {
        command: command.line(),
        source: DecodeError::UnexpectedReply {
            payload: decoded.to_string(),
        },
    }
}

impl MechanismClient {
    pub fn new(exchange: Arc<dyn Exchange>) -> Self {
        Self { exchange }
    }

    pub fn connect(host: impl Into<String>, port: u16, settings: TelnetSettings) -> Self {
        Self::new(Arc::new(Engine::new(host, port, settings)))
    }

    pub async fn send_command(&self, command: &MechanismCommand) -> Result<Decoded, ProtocolError> {
        debug!("Sending mechanism command {:?}", command.line());
        command.spec().execute(self.exchange.as_ref()).await
    }

    /// Moves `mechanism` towards `target`, or only reads its position when
    /// `target` is `None`. Returns the position the microcontroller reports.
    pub async fn in_out(
        &self,
        mechanism: Mechanism,
        target: Option<InOutPosition>,
    ) -> Result<InOutPosition, ProtocolError> {
        let command = MechanismCommand::InOut { mechanism, target };
        match self.send_command(&command).await? {
            Decoded::InOut(position) => Ok(position),
            other => Err(unexpected(&command, other)),
        }
    }

    pub async fn position(&self, mechanism: Mechanism) -> Result<InOutPosition, ProtocolError> {
        self.in_out(mechanism, None).await
    }

    pub async fn lamp(&self, lamp: Lamp, state: Option<OnOffState>) -> Result<OnOffState, ProtocolError> {
        let command = MechanismCommand::Lamp { lamp, state };
        match self.send_command(&command).await? {
            Decoded::OnOff(state) => Ok(state),
            other => Err(unexpected(&command, other)),
        }
    }

    pub async fn rotation(&self, target: Option<i32>) -> Result<RotationPosition, ProtocolError> {
        let command = MechanismCommand::Rotation { target };
        match self.send_command(&command).await? {
            Decoded::Rotation(position) => Ok(position),
            other => Err(unexpected(&command, other)),
        }
    }

    pub async fn gyro(&self) -> Result<GyroReading, ProtocolError> {
        let command = MechanismCommand::Gyro;
        match self.send_command(&command).await? {
            Decoded::Gyro(reading) => Ok(reading),
            other => Err(unexpected(&command, other)),
        }
    }

    /// Relative humidity in percent.
    pub async fn humidity(&self, sensor: u32) -> Result<f64, ProtocolError> {
        self.reading(MechanismCommand::Humidity { sensor }).await
    }

    /// Degrees Celsius.
    pub async fn temperature(&self, sensor: u32) -> Result<f64, ProtocolError> {
        self.reading(MechanismCommand::Temperature { sensor }).await
    }

    async fn reading(&self, command: MechanismCommand) -> Result<f64, ProtocolError> {
        match self.send_command(&command).await? {
            Decoded::Double(reading) => Ok(reading.value()),
            other => Err(unexpected(&command, other)),
        }
    }
}
