use crate::error::SensorError;
use crate::hardware::Sensor;
use crate::models::Measurement;

/// Slowly drifting readings for running the monitor without hardware
///
/// Values follow a fixed sine pattern, so consecutive runs are reproducible.
#[derive(Debug, Default)]
pub struct SimulatedSensor {
    step: u64,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sensor for SimulatedSensor {
    fn read(&mut self) -> Result<Measurement, SensorError> {
        let phase = self.step as f32 / 120.0;
        self.step = self.step.wrapping_add(1);

        // DHT11 reports whole degrees and whole percent
        Ok(Measurement {
            temperature: (24.0 + 4.0 * phase.sin()).round(),
            humidity: (50.0 + 10.0 * (phase * 0.7).cos()).round(),
        })
    }
}
