use std::sync::atomic::AtomicBool;

use async_trait::async_trait;
use sprat_protocol::ProtocolError;
use sprat_protocol::decoder::InOutPosition;

use crate::client::MechanismClient;
use crate::commands::{Mechanism, MechanismCommand};
use crate::positioner::{MoveParams, Positioner};

/// Positioner for the grism, fold mirror and slit.
pub struct MechanismPositioner {
    client: MechanismClient,
    mechanism: Mechanism,
    params: MoveParams,
    moving: AtomicBool,
}

impl MechanismPositioner {
    pub fn new(client: MechanismClient, mechanism: Mechanism) -> Self {
        Self {
            client,
            mechanism,
            params: MoveParams::default(),
            moving: AtomicBool::new(false),
        }
    }

    pub fn with_params(mut self, params: MoveParams) -> Self {
        self.params = params;
        self
    }

    pub fn kind(&self) -> Mechanism {
        self.mechanism
    }

    pub async fn position(&self) -> Result<InOutPosition, ProtocolError> {
        self.client.position(self.mechanism).await
    }
}

#[async_trait]
impl Positioner for MechanismPositioner {
    type Position = InOutPosition;

    fn mechanism(&self) -> &str {
        self.mechanism.token()
    }

    fn params(&self) -> MoveParams {
        self.params
    }

    fn set_params(&mut self, params: MoveParams) {
        self.params = params;
    }

    fn moving(&self) -> &AtomicBool {
        &self.moving
    }

    fn accepts_target(&self, target: InOutPosition) -> bool {
        matches!(target, InOutPosition::In | InOutPosition::Out)
    }

    fn command_line(&self, target: Option<InOutPosition>) -> String {
        MechanismCommand::InOut {
            mechanism: self.mechanism,
            target,
        }
        .line()
    }

    async fn command(&self, target: Option<InOutPosition>) -> Result<InOutPosition, ProtocolError> {
        self.client.in_out(self.mechanism, target).await
    }
}
