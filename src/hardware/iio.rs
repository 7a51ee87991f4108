/// DHT11 access through the Linux IIO driver (`dht11` device-tree overlay)
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SensorError;
use crate::hardware::Sensor;
use crate::models::Measurement;

const TEMPERATURE_FILE: &str = "in_temp_input";
const HUMIDITY_FILE: &str = "in_humidityrelative_input";

#[derive(Debug, Clone)]
pub struct IioDht11 {
    device: PathBuf,
}

impl IioDht11 {
    pub fn new(device: impl AsRef<Path>) -> Self {
        let device = device.as_ref().to_path_buf();
        info!("Reading DHT11 sensor from {}", device.display());
        Self { device }
    }

    /// Read one channel; the driver reports thousandths of the unit
    fn read_channel(&self, file: &str) -> Result<f32, SensorError> {
        let path = self.device.join(file);
        // The driver answers EIO when the checksum or bus timing fails
        let raw = fs::read_to_string(&path)
            .map_err(|e| SensorError::Driver(format!("{}: {}", path.display(), e)))?;

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SensorError::MissingValues);
        }

        trimmed
            .parse::<i32>()
            .map(|milli| milli as f32 / 1000.0)
            .map_err(|_| SensorError::Driver(format!("unexpected value '{}' in {}", trimmed, path.display())))
    }
}

impl Sensor for IioDht11 {
    fn read(&mut self) -> Result<Measurement, SensorError> {
        let temperature = self.read_channel(TEMPERATURE_FILE)?;
        let humidity = self.read_channel(HUMIDITY_FILE)?;
        Ok(Measurement {
            temperature,
            humidity,
        })
    }

    fn release(&mut self) {
        info!("DHT11 released.");
    }
}
