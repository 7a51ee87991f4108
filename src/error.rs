/// Error types shared by the sampling pipeline, storage and hardware layers
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure to obtain a usable reading from the sensor
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("driver error: {0}")]
    Driver(String),

    #[error("sensor returned no values")]
    MissingValues,

    #[error("sensor read timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("sensor read failed: {0}")]
    Sensor(#[from] SensorError),

    #[error("persistence error on {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("malformed history label: {0:?}")]
    MalformedHistoryLabel(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("actuator error: {0}")]
    Actuator(String),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl MonitorError {
    pub fn persistence(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MonitorError::Persistence {
            path: path.into(),
            source,
        }
    }
}
