use serde::{Serialize, Serializer};
use time::OffsetDateTime;

use crate::utils::format_live_time;

/// Raw values returned by a sensor driver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub temperature: f32,
    pub humidity: f32,
}

/// A timestamped sensor sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub temperature: f32,
    pub humidity: f32,
    pub taken_at: OffsetDateTime,
}

impl Reading {
    pub fn new(measurement: Measurement, taken_at: OffsetDateTime) -> Self {
        Reading {
            temperature: measurement.temperature,
            humidity: measurement.humidity,
            taken_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ActuatorState {
    #[serde(rename = "ON")]
    On,
    #[default]
    #[serde(rename = "OFF")]
    Off,
}

impl ActuatorState {
    pub fn is_on(self) -> bool {
        self == ActuatorState::On
    }
}

impl From<bool> for ActuatorState {
    fn from(on: bool) -> Self {
        if on {
            ActuatorState::On
        } else {
            ActuatorState::Off
        }
    }
}

/// One averaged history entry, produced once per closed window
#[derive(Debug, Clone, PartialEq)]
pub struct AveragedPoint {
    pub label: String,
    pub temperature: f32,
    pub humidity: f32,
    /// Window midpoint. `None` only for entries loaded from files that
    /// predate stored timestamps and whose label could not be parsed.
    pub taken_at: Option<OffsetDateTime>,
}

/// Copy of the live state handed to API consumers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiveSnapshot {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    #[serde(rename = "buzzer")]
    pub actuator: ActuatorState,
    #[serde(rename = "time", serialize_with = "serialize_live_time")]
    pub taken_at: Option<OffsetDateTime>,
    #[serde(rename = "error")]
    pub has_error: bool,
}

fn serialize_live_time<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(dt) => serializer.serialize_some(&format_live_time(dt)),
        None => serializer.serialize_none(),
    }
}

/// The full retained series as three parallel arrays
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistorySeries {
    pub labels: Vec<String>,
    pub temp: Vec<f32>,
    pub hum: Vec<f32>,
}

/// Store statistics merged with the state of the open averaging window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryStats {
    pub total_points: usize,
    pub oldest_point: Option<String>,
    pub newest_point: Option<String>,
    pub last_save: Option<String>,
    pub buffered_readings: usize,
    pub buffer_start: Option<String>,
    pub next_save_in: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn snapshot_serializes_with_dashboard_field_names() {
        let snapshot = LiveSnapshot {
            temperature: Some(24.0),
            humidity: Some(40.0),
            actuator: ActuatorState::On,
            taken_at: Some(datetime!(2024-01-05 15:15:00 UTC)),
            has_error: false,
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "temperature": 24.0,
                "humidity": 40.0,
                "buzzer": "ON",
                "time": "2024-01-05 03:15:00 PM",
                "error": false
            })
        );
    }

    #[test]
    fn empty_snapshot_has_nulls() {
        let json = serde_json::to_value(LiveSnapshot::default()).unwrap();
        assert_eq!(json["temperature"], serde_json::Value::Null);
        assert_eq!(json["time"], serde_json::Value::Null);
        assert_eq!(json["buzzer"], "OFF");
        assert_eq!(json["error"], false);
    }

    #[test]
    fn actuator_state_from_bool() {
        assert_eq!(ActuatorState::from(true), ActuatorState::On);
        assert!(!ActuatorState::from(false).is_on());
    }
}
