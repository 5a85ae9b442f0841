use std::sync::Arc;

use chrono::{DateTime, Utc};
use sprat_protocol::decoder::{ExposureStatus, MultrunFile, TemperatureSample, TemperatureStatusSample};
use sprat_protocol::{Decoded, DecodeError, Engine, Exchange, ProtocolError, TelnetSettings};
use tracing::{debug, info};

use crate::commands::{
    DetectorCommand, ExposureQuery, ExposureType, FitsValue, MultrunQuery, TemperatureQuery,
    Window,
};

/// Typed front end for the detector server.
#[derive(Clone)]
pub struct DetectorClient {
    exchange: Arc<dyn Exchange>,
}

fn unexpected(command: &DetectorCommand, decoded: Decoded) -> ProtocolError {
    ProtocolError::Decode {
        command: command.line(),
        source: DecodeError::UnexpectedReply {
            payload: decoded.to_string(),
        },
    }
}

impl DetectorClient {
    pub fn new(exchange: Arc<dyn Exchange>) -> Self {
        Self { exchange }
    }

    pub fn connect(host: impl Into<String>, port: u16, settings: TelnetSettings) -> Self {
        Self::new(Arc::new(Engine::new(host, port, settings)))
    }

    pub async fn send_command(&self, command: &DetectorCommand) -> Result<Decoded, ProtocolError> {
        debug!("Sending detector command {:?}", command.line());
        command.spec().execute(self.exchange.as_ref()).await
    }

    async fn acknowledge(&self, command: DetectorCommand) -> Result<(), ProtocolError> {
        match self.send_command(&command).await? {
            Decoded::Acknowledged(_) => Ok(()),
            other => Err(unexpected(&command, other)),
        }
    }

    async fn frames(&self, command: DetectorCommand) -> Result<MultrunFile, ProtocolError> {
        match self.send_command(&command).await? {
            Decoded::IndexFilename(file) => {
                info!("{:?} wrote frame {} to {}", command.line(), file.index, file.filename);
                Ok(file)
            }
            other => Err(unexpected(&command, other)),
        }
    }

    async fn integer(&self, command: DetectorCommand) -> Result<i32, ProtocolError> {
        match self.send_command(&command).await? {
            Decoded::Integer(value) => Ok(value),
            other => Err(unexpected(&command, other)),
        }
    }

    pub async fn abort(&self) -> Result<(), ProtocolError> {
        self.acknowledge(DetectorCommand::Abort).await
    }

    pub async fn bias(&self) -> Result<MultrunFile, ProtocolError> {
        self.frames(DetectorCommand::Bias).await
    }

    pub async fn dark(&self, exposure_ms: u32) -> Result<MultrunFile, ProtocolError> {
        self.frames(DetectorCommand::Dark { exposure_ms }).await
    }

    pub async fn expose(&self, exposure_ms: u32) -> Result<MultrunFile, ProtocolError> {
        self.frames(DetectorCommand::Expose { exposure_ms }).await
    }

    pub async fn mult_bias(&self, count: u32) -> Result<MultrunFile, ProtocolError> {
        self.frames(DetectorCommand::MultBias { count }).await
    }

    pub async fn mult_dark(&self, exposure_ms: u32, count: u32) -> Result<MultrunFile, ProtocolError> {
        self.frames(DetectorCommand::MultDark { exposure_ms, count })
            .await
    }

    /// Returns the index and filename of the last frame of the run.
    pub async fn multrun(
        &self,
        exposure_ms: u32,
        count: u32,
        exposure_type: ExposureType,
    ) -> Result<MultrunFile, ProtocolError> {
        self.frames(DetectorCommand::Multrun {
            exposure_ms,
            count,
            exposure_type,
        })
        .await
    }

    pub async fn config(
        &self,
        x_bin: u32,
        y_bin: u32,
        window: Option<Window>,
    ) -> Result<(), ProtocolError> {
        self.acknowledge(DetectorCommand::Config {
            x_bin,
            y_bin,
            window,
        })
        .await
    }

    pub async fn shutdown(&self) -> Result<(), ProtocolError> {
        self.acknowledge(DetectorCommand::Shutdown).await
    }

    pub async fn fits_header_add(
        &self,
        keyword: impl Into<String>,
        value: FitsValue,
    ) -> Result<(), ProtocolError> {
        self.acknowledge(DetectorCommand::FitsHeaderAdd {
            keyword: keyword.into(),
            value,
        })
        .await
    }

    pub async fn fits_header_delete(&self, keyword: impl Into<String>) -> Result<(), ProtocolError> {
        self.acknowledge(DetectorCommand::FitsHeaderDelete {
            keyword: keyword.into(),
        })
        .await
    }

    pub async fn fits_header_clear(&self) -> Result<(), ProtocolError> {
        self.acknowledge(DetectorCommand::FitsHeaderClear).await
    }

    pub async fn set_temperature(&self, celsius: f64) -> Result<(), ProtocolError> {
        self.acknowledge(DetectorCommand::TemperatureSet { celsius })
            .await
    }

    pub async fn set_cooler(&self, on: bool) -> Result<(), ProtocolError> {
        self.acknowledge(DetectorCommand::TemperatureCooler { on })
            .await
    }

    /// Exposure length of the current or last exposure, in milliseconds.
    pub async fn exposure_length(&self) -> Result<i32, ProtocolError> {
        self.integer(DetectorCommand::StatusExposure(ExposureQuery::Length))
            .await
    }

    pub async fn exposure_status(&self) -> Result<ExposureStatus, ProtocolError> {
        let command = DetectorCommand::StatusExposure(ExposureQuery::Status);
        match self.send_command(&command).await? {
            Decoded::ExposureStatus(status) => Ok(status),
            other => Err(unexpected(&command, other)),
        }
    }

    pub async fn exposure_start_time(&self) -> Result<DateTime<Utc>, ProtocolError> {
        let command = DetectorCommand::StatusExposure(ExposureQuery::StartTime);
        match self.send_command(&command).await? {
            Decoded::Timestamp(timestamp) => Ok(timestamp),
            other => Err(unexpected(&command, other)),
        }
    }

    pub async fn exposure_multrun(&self) -> Result<i32, ProtocolError> {
        self.integer(DetectorCommand::StatusExposure(ExposureQuery::Multrun))
            .await
    }

    pub async fn exposure_run(&self) -> Result<i32, ProtocolError> {
        self.integer(DetectorCommand::StatusExposure(ExposureQuery::Run))
            .await
    }

    pub async fn multrun_count(&self) -> Result<i32, ProtocolError> {
        self.integer(DetectorCommand::StatusMultrun(MultrunQuery::Count))
            .await
    }

    pub async fn multrun_index(&self) -> Result<i32, ProtocolError> {
        self.integer(DetectorCommand::StatusMultrun(MultrunQuery::Index))
            .await
    }

    pub async fn multrun_binning(&self) -> Result<(i32, i32), ProtocolError> {
        let x_bin = self
            .integer(DetectorCommand::StatusMultrun(MultrunQuery::BinX))
            .await?;
        let y_bin = self
            .integer(DetectorCommand::StatusMultrun(MultrunQuery::BinY))
            .await?;
        Ok((x_bin, y_bin))
    }

    pub async fn temperature(&self) -> Result<TemperatureSample, ProtocolError> {
        let command = DetectorCommand::StatusTemperature(TemperatureQuery::Get);
        match self.send_command(&command).await? {
            Decoded::TimestampTemperature(sample) => Ok(sample),
            other => Err(unexpected(&command, other)),
        }
    }

    pub async fn temperature_status(&self) -> Result<TemperatureStatusSample, ProtocolError> {
        let command = DetectorCommand::StatusTemperature(TemperatureQuery::Status);
        match self.send_command(&command).await? {
            Decoded::TimestampStatus(sample) => Ok(sample),
            other => Err(unexpected(&command, other)),
        }
    }
}
