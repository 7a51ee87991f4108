/// Sensor and actuator capabilities used by the sampling loop
pub mod gpio;
pub mod iio;
pub mod simulated;

use log::info;

use crate::config::{ActuatorBackend, MonitorConfig, SensorBackend};
use crate::error::{MonitorError, SensorError};
use crate::models::Measurement;

pub use gpio::GpioBuzzer;
pub use iio::IioDht11;
pub use simulated::SimulatedSensor;

/// A temperature/humidity source
///
/// `read` may block; callers run it off the async executor with a timeout.
pub trait Sensor: Send + 'static {
    fn read(&mut self) -> Result<Measurement, SensorError>;

    /// Release the underlying device. Called once during shutdown.
    fn release(&mut self) {}
}

/// A binary output such as the alarm buzzer
pub trait Actuator: Send + 'static {
    fn set(&mut self, on: bool) -> Result<(), MonitorError>;

    fn release(&mut self) {}
}

impl<S: Sensor + ?Sized> Sensor for Box<S> {
    fn read(&mut self) -> Result<Measurement, SensorError> {
        (**self).read()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn set(&mut self, on: bool) -> Result<(), MonitorError> {
        (**self).set(on)
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Actuator that only records transitions in the log
#[derive(Debug, Default)]
pub struct LogActuator {
    on: Option<bool>,
}

impl Actuator for LogActuator {
    fn set(&mut self, on: bool) -> Result<(), MonitorError> {
        if self.on != Some(on) {
            info!("Buzzer: {}", if on { "ON (High Temperature!)" } else { "OFF" });
        }
        self.on = Some(on);
        Ok(())
    }
}

/// Build the sensor selected by configuration
pub fn open_sensor(config: &MonitorConfig) -> Box<dyn Sensor> {
    match config.sensor_backend {
        SensorBackend::Simulated => Box::new(SimulatedSensor::new()),
        SensorBackend::Iio => Box::new(IioDht11::new(&config.iio_device)),
    }
}

/// Build the actuator selected by configuration
pub fn open_actuator(config: &MonitorConfig) -> Result<Box<dyn Actuator>, MonitorError> {
    match config.actuator_backend {
        ActuatorBackend::Log => Ok(Box::new(LogActuator::default())),
        ActuatorBackend::Gpio => Ok(Box::new(GpioBuzzer::open(config.buzzer_gpio)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_actuator_accepts_every_state() {
        let mut actuator = LogActuator::default();
        assert!(actuator.set(true).is_ok());
        assert!(actuator.set(true).is_ok());
        assert!(actuator.set(false).is_ok());
        assert_eq!(actuator.on, Some(false));
    }

    #[test]
    fn default_config_opens_simulated_hardware() {
        let config = MonitorConfig::default();
        let mut sensor = open_sensor(&config);
        assert!(sensor.read().is_ok());
        assert!(open_actuator(&config).is_ok());
    }
}
