use std::sync::atomic::AtomicBool;

use async_trait::async_trait;
use sprat_protocol::ProtocolError;
use sprat_protocol::decoder::RotationPosition;

use crate::client::MechanismClient;
use crate::commands::{MechanismCommand, ROTATION_POSITIONS};
use crate::positioner::{MoveParams, Positioner};

pub struct RotationPositioner {
    client: MechanismClient,
    params: MoveParams,
    moving: AtomicBool,
}

impl RotationPositioner {
    pub fn new(client: MechanismClient) -> Self {
        Self {
            client,
            params: MoveParams::default(),
            moving: AtomicBool::new(false),
        }
    }

    pub fn with_params(mut self, params: MoveParams) -> Self {
        self.params = params;
        self
    }
}

fn index(position: Option<RotationPosition>) -> Option<i32> {
    match position {
        Some(RotationPosition::At(index)) => Some(index),
        _ => None,
    }
}

#[async_trait]
impl Positioner for RotationPositioner {
    type Position = RotationPosition;

    fn mechanism(&self) -> &str {
        "rotation"
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

    fn accepts_target(&self, target: RotationPosition) -> bool {
        matches!(target, RotationPosition::At(index) if ROTATION_POSITIONS.contains(&index))
    }

    fn command_line(&self, target: Option<RotationPosition>) -> String {
        MechanismCommand::Rotation {
            target: index(target),
        }
        .line()
    }

    async fn command(&self, target: Option<RotationPosition>) -> Result<RotationPosition, ProtocolError> {
        self.client.rotation(index(target)).await
    }
}
