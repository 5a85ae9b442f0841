pub mod axis;
pub mod client;
pub mod commands;
pub mod positioner;

pub use axis::MechanismAxis;
pub use client::MechanismClient;
pub use commands::{Lamp, Mechanism, MechanismCommand};
pub use positioner::{
    DegradedSensorPositioner, MechanismPositioner, MoveError, MoveParams, MoveReport, Positioner,
    RotationPositioner, SensorWorkaround,
};
pub use tokio_util::sync::CancellationToken;
