/// Most recent reading and actuator status, shared between the sampling
/// loop (single writer) and API handlers (many readers)
use std::sync::{PoisonError, RwLock};

use crate::models::{ActuatorState, LiveSnapshot, Reading};

#[derive(Debug, Default)]
pub struct LiveState {
    inner: RwLock<LiveSnapshot>,
}

impl LiveState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole record with a fresh reading and clear the error flag
    pub fn update(&self, reading: &Reading, actuator: ActuatorState) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *state = LiveSnapshot {
            temperature: Some(reading.temperature),
            humidity: Some(reading.humidity),
            actuator,
            taken_at: Some(reading.taken_at),
            has_error: false,
        };
    }

    /// Flag a failed read while keeping the last good values visible
    pub fn mark_error(&self) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.has_error = true;
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use time::macros::datetime;

    fn reading(temperature: f32, humidity: f32) -> Reading {
        Reading {
            temperature,
            humidity,
            taken_at: datetime!(2024-01-05 15:15:00 UTC),
        }
    }

    #[test]
    fn starts_empty() {
        let snapshot = LiveState::new().snapshot();
        assert_eq!(snapshot, LiveSnapshot::default());
        assert_eq!(snapshot.actuator, ActuatorState::Off);
        assert!(!snapshot.has_error);
    }

    #[test]
    fn mark_error_keeps_last_good_values() {
        let live = LiveState::new();
        live.update(&reading(24.0, 45.0), ActuatorState::Off);
        live.mark_error();

        let snapshot = live.snapshot();
        assert!(snapshot.has_error);
        assert_eq!(snapshot.temperature, Some(24.0));
        assert_eq!(snapshot.humidity, Some(45.0));
        assert_eq!(snapshot.taken_at, Some(datetime!(2024-01-05 15:15:00 UTC)));
    }

    #[test]
    fn update_clears_error_and_replaces_fields() {
        let live = LiveState::new();
        live.update(&reading(24.0, 45.0), ActuatorState::Off);
        live.mark_error();

        let later = Reading {
            temperature: 39.0,
            humidity: 30.0,
            taken_at: datetime!(2024-01-05 15:15:05 UTC),
        };
        live.update(&later, ActuatorState::On);

        let snapshot = live.snapshot();
        assert!(!snapshot.has_error);
        assert_eq!(snapshot.temperature, Some(39.0));
        assert_eq!(snapshot.humidity, Some(30.0));
        assert_eq!(snapshot.actuator, ActuatorState::On);
        assert_eq!(snapshot.taken_at, Some(later.taken_at));
    }

    #[test]
    fn readers_never_see_a_torn_record() {
        let live = Arc::new(LiveState::new());

        let writer = {
            let live = Arc::clone(&live);
            thread::spawn(move || {
                for i in 0..2_000 {
                    let value = i as f32;
                    live.update(&reading(value, value), ActuatorState::from(i % 2 == 0));
                }
            })
        };

        for _ in 0..2_000 {
            let snapshot = live.snapshot();
            assert_eq!(snapshot.temperature, snapshot.humidity);
        }
        writer.join().unwrap();
    }
}
