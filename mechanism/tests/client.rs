use std::sync::Arc;

use sprat_mechanism::{Lamp, Mechanism, MechanismClient};
use sprat_protocol::decoder::{GyroReading, InOutPosition, OnOffState, RotationPosition};
use sprat_protocol::mock::ScriptedBackend;
use sprat_protocol::{DecodeError, ProtocolError};

fn client(backend: ScriptedBackend) -> (Arc<ScriptedBackend>, MechanismClient) {
    let backend = Arc::new(backend);
    (backend.clone(), MechanismClient::new(backend))
}

#[tokio::test]
async fn unrecognised_position_reads_as_error() {
    let (_, client) = client(ScriptedBackend::new().on("grism", ["half way"]));

    assert_eq!(client.position(Mechanism::Grism).await.unwrap(), InOutPosition::Error);
}

#[tokio::test]
async fn lamps_switch_and_report() {
    let (backend, client) = client(
        ScriptedBackend::new()
            .on("wlamp on", ["on"])
            .on("arclamp", ["off"]),
    );

    assert_eq!(
        client.lamp(Lamp::Tungsten, Some(OnOffState::On)).await.unwrap(),
        OnOffState::On
    );
    assert_eq!(client.lamp(Lamp::Arc, None).await.unwrap(), OnOffState::Off);
    assert_eq!(backend.sent(), ["wlamp on", "arclamp"]);
}

#[tokio::test]
async fn rotation_reports_index() {
    let (_, client) = client(ScriptedBackend::new().on("rotation", ["1"]));

    assert_eq!(client.rotation(None).await.unwrap(), RotationPosition::At(1));
}

#[tokio::test]
async fn sensor_readings() {
    let (_, client) = client(
        ScriptedBackend::new()
            .on("humidity 0", ["ok 41.5"])
            .on("temperature 2", ["ok -3.25"])
            .on("gyro", ["ok 0.5 0 -1"]),
    );

    assert_eq!(client.humidity(0).await.unwrap(), 41.5);
    assert_eq!(client.temperature(2).await.unwrap(), -3.25);
    assert_eq!(
        client.gyro().await.unwrap(),
        GyroReading {
            x: 0.5,
            y: 0.0,
            z: -1.0
        }
    );
}

#[tokio::test]
async fn sensor_error_carries_description() {
    let (_, client) = client(
        ScriptedBackend::new()
            .on("humidity 1", ["error sensor 1 not fitted"])
            .on("temperature 0", ["21.5"]),
    );

    let error = client.humidity(1).await.unwrap_err();
    assert_eq!(error.device_description(), Some("sensor 1 not fitted"));

    let error = client.temperature(0).await.unwrap_err();
    assert!(matches!(
        error,
        ProtocolError::Decode {
            source: DecodeError::UnexpectedReply { .. },
            ..
        }
    ));
}
