/// Buzzer on a Raspberry Pi GPIO pin
use log::info;
use rppal::gpio::{Gpio, OutputPin};

use crate::error::MonitorError;
use crate::hardware::Actuator;

/// Digital output the buzzer is wired to
pub trait OutputLine: Send + 'static {
    fn set_high(&mut self);
    fn set_low(&mut self);
}

impl OutputLine for OutputPin {
    fn set_high(&mut self) {
        OutputPin::set_high(self)
    }

    fn set_low(&mut self) {
        OutputPin::set_low(self)
    }
}

#[derive(Debug)]
pub struct GpioBuzzer<P: OutputLine = OutputPin> {
    pin: Option<P>,
    line: u8,
}

impl GpioBuzzer {
    /// Claim BCM pin `line` as an output, driven low
    ///
    /// # Arguments
    /// * `line` - BCM GPIO number the buzzer is connected to
    ///
    /// # Returns
    /// The buzzer, or an actuator error when the GPIO peripheral or pin is
    /// unavailable
    pub fn open(line: u8) -> Result<Self, MonitorError> {
        let gpio = Gpio::new().map_err(|e| MonitorError::Actuator(format!("GPIO init: {}", e)))?;
        let pin = gpio
            .get(line)
            .map_err(|e| MonitorError::Actuator(format!("GPIO pin {}: {}", line, e)))?
            .into_output_low();

        info!("Buzzer ready on GPIO{}", line);
        Ok(GpioBuzzer::with_pin(pin, line))
    }
}

impl<P: OutputLine> GpioBuzzer<P> {
    pub fn with_pin(pin: P, line: u8) -> Self {
        GpioBuzzer {
            pin: Some(pin),
            line,
        }
    }
}

impl<P: OutputLine> Actuator for GpioBuzzer<P> {
    fn set(&mut self, on: bool) -> Result<(), MonitorError> {
        let pin = self
            .pin
            .as_mut()
            .ok_or_else(|| MonitorError::Actuator(format!("GPIO{} already released", self.line)))?;
        if on {
            pin.set_high();
        } else {
            pin.set_low();
        }
        Ok(())
    }

    /// Drive the pin low and hand it back; dropping the pin restores its mode
    fn release(&mut self) {
        if let Some(mut pin) = self.pin.take() {
            pin.set_low();
            drop(pin);
            info!("Buzzer released.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct FakeLine {
        levels: Arc<Mutex<Vec<bool>>>,
        dropped: Arc<Mutex<bool>>,
    }

    impl OutputLine for FakeLine {
        fn set_high(&mut self) {
            self.levels.lock().unwrap().push(true);
        }

        fn set_low(&mut self) {
            self.levels.lock().unwrap().push(false);
        }
    }

    impl Drop for FakeLine {
        fn drop(&mut self) {
            *self.dropped.lock().unwrap() = true;
        }
    }

    #[test]
    fn drives_pin_levels() {
        let line = FakeLine::default();
        let mut buzzer = GpioBuzzer::with_pin(line.clone(), 17);

        buzzer.set(true).unwrap();
        buzzer.set(false).unwrap();
        buzzer.set(true).unwrap();

        assert_eq!(*line.levels.lock().unwrap(), vec![true, false, true]);
    }

    #[test]
    fn release_drives_low_and_drops_pin() {
        let line = FakeLine::default();
        let levels = Arc::clone(&line.levels);
        let dropped = Arc::clone(&line.dropped);
        let mut buzzer = GpioBuzzer::with_pin(line, 17);

        buzzer.set(true).unwrap();
        buzzer.release();

        assert_eq!(levels.lock().unwrap().last(), Some(&false));
        assert!(*dropped.lock().unwrap());
        assert!(matches!(buzzer.set(true), Err(MonitorError::Actuator(_))));

        // second release is a no-op
        buzzer.release();
        assert_eq!(levels.lock().unwrap().len(), 2);
    }
}
