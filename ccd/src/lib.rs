pub mod client;
pub mod commands;

pub use client::DetectorClient;
pub use commands::{
    CommandError, DetectorCommand, ExposureQuery, ExposureType, FitsValue, MultrunQuery,
    TemperatureQuery, Window, validate_keyword,
};
