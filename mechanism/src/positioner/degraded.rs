use std::sync::atomic::AtomicBool;
use std::time::Duration;

use async_trait::async_trait;
use sprat_protocol::ProtocolError;
use sprat_protocol::decoder::InOutPosition;

use crate::positioner::{MechanismPositioner, MoveParams, Positioner};

pub const GRACE_DELAY: Duration = Duration::from_millis(5000);

/// A position sensor known not to report one position. While moving to
/// `target`, a poll that reports `reported` instead starts a grace delay
/// after which the move is assumed complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorWorkaround {
    pub target: InOutPosition,
    pub reported: InOutPosition,
    pub grace_delay: Duration,
}

impl SensorWorkaround {
    /// The slit "in" sensor never fires; the slit reads as unknown once it
    /// has left the "out" sensor.
    pub fn broken_in_sensor(grace_delay: Duration) -> Self {
        Self {
            target: InOutPosition::In,
            reported: InOutPosition::Unknown,
            grace_delay,
        }
    }
}

impl Default for SensorWorkaround {
    fn default() -> Self {
        Self::broken_in_sensor(GRACE_DELAY)
    }
}

pub struct DegradedSensorPositioner {
    inner: MechanismPositioner,
    workaround: SensorWorkaround,
}

impl DegradedSensorPositioner {
    pub fn new(inner: MechanismPositioner, workaround: SensorWorkaround) -> Self {
        Self { inner, workaround }
    }

    pub fn workaround(&self) -> SensorWorkaround {
        self.workaround
    }

    pub fn into_inner(self) -> MechanismPositioner {
        self.inner
    }
}

#[async_trait]
impl Positioner for DegradedSensorPositioner {
    type Position = InOutPosition;

    fn mechanism(&self) -> &str {
        self.inner.mechanism()
    }

    fn params(&self) -> MoveParams {
        self.inner.params()
    }

    fn set_params(&mut self, params: MoveParams) {
        self.inner.set_params(params);
    }

    fn moving(&self) -> &AtomicBool {
        self.inner.moving()
    }

    fn accepts_target(&self, target: InOutPosition) -> bool {
        self.inner.accepts_target(target)
    }

    fn command_line(&self, target: Option<InOutPosition>) -> String {
        self.inner.command_line(target)
    }

    async fn command(&self, target: Option<InOutPosition>) -> Result<InOutPosition, ProtocolError> {
        self.inner.command(target).await
    }

    fn assumed_arrival(&self, target: InOutPosition, observed: InOutPosition) -> Option<Duration> {
        (target == self.workaround.target && observed == self.workaround.reported)
            .then_some(self.workaround.grace_delay)
    }
}
