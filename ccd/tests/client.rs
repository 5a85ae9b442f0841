use std::sync::Arc;

use chrono::{TimeZone, Utc};
use sprat_ccd::{DetectorClient, ExposureType, FitsValue};
use sprat_protocol::decoder::{ExposureStatus, TemperatureStatus};
use sprat_protocol::mock::ScriptedBackend;
use sprat_protocol::{DecodeError, ProtocolError};

fn client(backend: ScriptedBackend) -> (DetectorClient, Arc<ScriptedBackend>) {
    let backend = Arc::new(backend);
    (DetectorClient::new(backend.clone()), backend)
}

#[tokio::test]
async fn multrun_returns_last_frame() {
    let (detector, backend) = client(
        ScriptedBackend::new().on("multrun 1000 3 standard", ["0 3 /data/s_s_20200102_3_3_1_0.fits"]),
    );

    let file = detector.multrun(1000, 3, ExposureType::Standard).await.unwrap();

    assert_eq!(file.index, 3);
    assert_eq!(file.filename, "/data/s_s_20200102_3_3_1_0.fits");
    assert_eq!(backend.sent(), ["multrun 1000 3 standard"]);
}

#[tokio::test]
async fn upstream_failure_keeps_the_server_description() {
    let (detector, _) = client(ScriptedBackend::new().on("bias", ["12 Bias failed:CCD not ready"]));

    let error = detector.bias().await.unwrap_err();

    assert!(matches!(error, ProtocolError::Upstream { code: 12, .. }));
    assert_eq!(error.device_description(), Some("Bias failed:CCD not ready"));
}

#[tokio::test]
async fn integer_status_rejects_garbage() {
    let (detector, _) = client(
        ScriptedBackend::new()
            .on("status multrun index", ["0 abc"])
            .on("status multrun count", ["0 12"]),
    );

    assert!(matches!(
        detector.multrun_index().await,
        Err(ProtocolError::Decode {
            source: DecodeError::NotInteger { .. },
            ..
        })
    ));
    assert_eq!(detector.multrun_count().await.unwrap(), 12);
}

#[tokio::test]
async fn exposure_and_temperature_status() {
    let (detector, _) = client(
        ScriptedBackend::new()
            .on("status exposure status", ["0 READOUT"])
            .on("status exposure start_time", ["0 2020-01-02T03:04:05.678 UTC"])
            .on("status temperature get", ["0 2020-01-02T03:04:05.678 -59.9"])
            .on("status temperature status", ["0 2020-01-02T03:04:05.678 OK"]),
    );

    assert_eq!(detector.exposure_status().await.unwrap(), ExposureStatus::Readout);
    assert_eq!(
        detector.exposure_start_time().await.unwrap(),
        Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap()
    );

    let sample = detector.temperature().await.unwrap();
    assert_eq!(sample.temperature, -59.9);

    let status = detector.temperature_status().await.unwrap();
    assert_eq!(status.status, TemperatureStatus::Ok);
}

#[tokio::test]
async fn binning_queries_both_axes() {
    let (detector, backend) = client(
        ScriptedBackend::new()
            .on("status multrun binx", ["0 2"])
            .on("status multrun biny", ["0 1"]),
    );

    assert_eq!(detector.multrun_binning().await.unwrap(), (2, 1));
    assert_eq!(backend.sent(), ["status multrun binx", "status multrun biny"]);
}

#[tokio::test]
async fn acknowledged_commands() {
    let (detector, backend) = client(
        ScriptedBackend::new()
            .on("config 2 2", ["0 Config completed."])
            .on("fitsheader add OBJECT string HD 1234", ["0 ok"])
            .on("temperature cooler on", ["0 Cooler on."])
            .on("shutdown", ["0 Shutting down."]),
    );

    detector.config(2, 2, None).await.unwrap();
    detector
        .fits_header_add("OBJECT", FitsValue::String("HD 1234".to_string()))
        .await
        .unwrap();
    detector.set_cooler(true).await.unwrap();
    detector.shutdown().await.unwrap();

    assert_eq!(backend.sent().len(), 4);
}
