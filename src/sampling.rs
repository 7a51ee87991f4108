/// Fixed-period sensor sampling: live state, alarm threshold and averaging
use log::{error, info, warn};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};
use std::time::Duration;
use time::{OffsetDateTime, UtcOffset};
use tokio::task::JoinHandle;

use crate::config::MonitorConfig;
use crate::error::SensorError;
use crate::hardware::{Actuator, Sensor};
use crate::live_state::LiveState;
use crate::models::{ActuatorState, Measurement, Reading};
use crate::shutdown::StopSignal;
use crate::storage::{with_store, SharedBuffer, SharedStore};
use crate::utils::format_live_time;

#[derive(Debug, Clone, Copy)]
pub struct SamplingSettings {
    pub interval: Duration,
    pub sensor_timeout: Duration,
    pub alarm_threshold: f32,
    pub utc_offset: UtcOffset,
}

impl From<&MonitorConfig> for SamplingSettings {
    fn from(config: &MonitorConfig) -> Self {
        SamplingSettings {
            interval: config.sample_interval,
            sensor_timeout: config.sensor_timeout,
            alarm_threshold: config.alarm_threshold,
            utc_offset: config.utc_offset,
        }
    }
}

/// Result of one sampling iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Updated {
        actuator: ActuatorState,
        flushed: bool,
    },
    Failed,
}

/// Alarm rule: on at or above the threshold
pub fn actuator_state_for(temperature: f32, threshold: f32) -> ActuatorState {
    ActuatorState::from(temperature >= threshold)
}

/// Sensor driver shared with the blocking pool, with at most one read in flight
struct SensorReader<S: Sensor> {
    sensor: Arc<Mutex<S>>,
    pending: Option<JoinHandle<Result<Measurement, SensorError>>>,
}

impl<S: Sensor> SensorReader<S> {
    fn new(sensor: S) -> Self {
        SensorReader {
            sensor: Arc::new(Mutex::new(sensor)),
            pending: None,
        }
    }

    /// Read the sensor on the blocking pool, bounded by `timeout`
    ///
    /// A read that times out keeps running. Later calls wait on that same
    /// read instead of queueing another driver call behind it.
    ///
    /// # Arguments
    /// * `timeout` - Longest time to wait for the driver on this call
    ///
    /// # Returns
    /// The measurement, or `SensorError::Timeout` while the driver is stuck
    async fn read(&mut self, timeout: Duration) -> Result<Measurement, SensorError> {
        let mut task = match self.pending.take() {
            Some(task) => task,
            None => {
                let sensor = Arc::clone(&self.sensor);
                tokio::task::spawn_blocking(move || {
                    sensor.lock().unwrap_or_else(PoisonError::into_inner).read()
                })
            }
        };

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(SensorError::Driver(format!("sensor task failed: {}", e))),
            Err(_) => {
                self.pending = Some(task);
                Err(SensorError::Timeout(timeout))
            }
        }
    }

    /// Release the driver unless a read still holds it
    fn release(&mut self) {
        if let Some(task) = self.pending.take() {
            if !task.is_finished() {
                warn!("Sensor read still in progress, skipping sensor release");
                return;
            }
        }
        match self.sensor.try_lock() {
            Ok(mut sensor) => sensor.release(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().release(),
            Err(TryLockError::WouldBlock) => {
                warn!("Sensor read still in progress, skipping sensor release")
            }
        }
    }
}

pub struct SamplingLoop<S: Sensor, A: Actuator> {
    sensor: SensorReader<S>,
    actuator: A,
    live: Arc<LiveState>,
    buffer: SharedBuffer,
    store: SharedStore,
    settings: SamplingSettings,
}

impl<S: Sensor, A: Actuator> SamplingLoop<S, A> {
    pub fn new(
        sensor: S,
        actuator: A,
        live: Arc<LiveState>,
        buffer: SharedBuffer,
        store: SharedStore,
        settings: SamplingSettings,
    ) -> Self {
        Self {
            sensor: SensorReader::new(sensor),
            actuator,
            live,
            buffer,
            store,
            settings,
        }
    }

    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.settings.utc_offset)
    }

    /// Run one iteration: read, publish, drive the alarm, accumulate
    ///
    /// A failed or timed-out read only flags the live state; the actuator,
    /// buffer and store keep their previous state.
    ///
    /// # Returns
    /// What the iteration did, for logging and tests
    pub async fn tick(&mut self) -> TickOutcome {
        match self.sensor.read(self.settings.sensor_timeout).await {
            Ok(measurement) => {
                let reading = Reading::new(measurement, self.now());
                self.handle_reading(reading).await
            }
            Err(e) => {
                self.live.mark_error();
                warn!("Failed to retrieve sensor data: {}", e);
                TickOutcome::Failed
            }
        }
    }

    /// Apply a successful reading to live state, actuator, buffer and store
    ///
    /// The live record is replaced first so readers see the reading even if
    /// the buzzer write fails. When the reading closes the averaging window
    /// the resulting point is appended to the store and persisted.
    ///
    /// # Arguments
    /// * `reading` - Timestamped measurement from the sensor
    ///
    /// # Returns
    /// The actuator state applied and whether a point was flushed
    pub async fn handle_reading(&mut self, reading: Reading) -> TickOutcome {
        let actuator = actuator_state_for(reading.temperature, self.settings.alarm_threshold);
        self.live.update(&reading, actuator);

        if let Err(e) = self.actuator.set(actuator.is_on()) {
            error!("Failed to set buzzer {:?}: {}", actuator, e);
        }

        let now = self.now();
        let mut buffer = self.buffer.lock().await;
        info!(
            "[{}] Temp: {}°C, Hum: {}% (Buffer: {} readings)",
            format_live_time(&reading.taken_at),
            reading.temperature,
            reading.humidity,
            buffer.len()
        );

        // Buffer stays locked while the point is stored so a concurrent
        // clear sees either both or neither
        let flushed = match buffer.append(&reading) {
            Some(point) => {
                if let Err(e) = with_store(&self.store, move |store| store.append(point, now)).await {
                    error!("Failed to store averaged point: {}", e);
                }
                true
            }
            None => false,
        };

        TickOutcome::Updated { actuator, flushed }
    }

    /// Sample until stopped, then flush and release the hardware
    pub async fn run(mut self, mut stop: StopSignal) {
        info!(
            "Sampling sensor every {}s (alarm at {:.1}°C)",
            self.settings.interval.as_secs(),
            self.settings.alarm_threshold
        );

        while !stop.is_stopped() {
            self.tick().await;
            if stop.sleep(self.settings.interval).await {
                break;
            }
        }

        self.shutdown().await;
    }

    /// Flush the open window, persist, switch the actuator off, release devices
    ///
    /// An empty buffer leaves the store and its file untouched. The sensor is
    /// not released while a hung read still holds it.
    pub async fn shutdown(mut self) {
        let now = self.now();
        {
            let mut buffer = self.buffer.lock().await;
            if !buffer.is_empty() {
                info!("Saving remaining buffered data...");
            }
            if let Some(point) = buffer.force_flush() {
                if let Err(e) = with_store(&self.store, move |store| store.append(point, now)).await {
                    error!("Failed to store final averaged point: {}", e);
                }
            }
        }

        if let Err(e) = self.actuator.set(false) {
            warn!("Buzzer cleanup error: {}", e);
        }
        self.actuator.release();

        self.sensor.release();

        info!("Sampling loop stopped");
    }
}
