/// Rolling averaging window that reduces raw readings to history points
use log::info;
use time::OffsetDateTime;

use crate::models::{AveragedPoint, Reading};
use crate::utils::{duration_to_seconds, format_datetime, format_label, round_to_tenth};

/// Accumulates readings until the window has been open for `window`
///
/// The window is measured in wall-clock time from its first reading, so
/// failed sensor reads shorten the sample count but never stretch the window.
#[derive(Debug, Clone)]
pub struct AveragingBuffer {
    temps: Vec<f32>,
    humidities: Vec<f32>,
    window_start: Option<OffsetDateTime>,
    window: time::Duration,
}

impl AveragingBuffer {
    pub fn new(window: std::time::Duration) -> Self {
        Self {
            temps: Vec::new(),
            humidities: Vec::new(),
            window_start: None,
            window: time::Duration::try_from(window).unwrap_or(time::Duration::MAX),
        }
    }

    /// Add a reading, returning the averaged point if this closed the window
    ///
    /// The first reading after a flush opens a new window at its timestamp.
    ///
    /// # Arguments
    /// * `reading` - Successful sensor reading
    ///
    /// # Returns
    /// Some(AveragedPoint) when the window has been open for the full
    /// averaging period, None otherwise
    pub fn append(&mut self, reading: &Reading) -> Option<AveragedPoint> {
        let start = *self.window_start.get_or_insert_with(|| {
            info!(
                "Started new averaging period at {}",
                format_datetime(&reading.taken_at)
            );
            reading.taken_at
        });

        self.temps.push(reading.temperature);
        self.humidities.push(reading.humidity);

        if reading.taken_at - start >= self.window {
            self.flush()
        } else {
            None
        }
    }

    /// Reduce the open window to one point and reset to the closed state
    ///
    /// Returns `None` without touching anything when no readings are buffered.
    pub fn flush(&mut self) -> Option<AveragedPoint> {
        if self.temps.is_empty() || self.humidities.is_empty() {
            return None;
        }
        let start = self.window_start?;

        let count = self.temps.len();
        let temp_avg = self.temps.iter().sum::<f32>() / count as f32;
        let hum_avg = self.humidities.iter().sum::<f32>() / self.humidities.len() as f32;
        let midpoint = start.checked_add(self.window / 2_i32).unwrap_or(start);

        let point = AveragedPoint {
            label: format_label(&midpoint),
            temperature: round_to_tenth(temp_avg),
            humidity: round_to_tenth(hum_avg),
            taken_at: Some(midpoint),
        };

        info!(
            "Averaged point {}: {:.1}°C, {:.1}% (from {} readings)",
            point.label, temp_avg, hum_avg, count
        );

        self.clear();
        Some(point)
    }

    /// Flush a window that has not elapsed yet, used on shutdown
    pub fn force_flush(&mut self) -> Option<AveragedPoint> {
        self.flush()
    }

    /// Drop buffered readings without producing a point
    pub fn clear(&mut self) {
        self.temps.clear();
        self.humidities.clear();
        self.window_start = None;
    }

    pub fn len(&self) -> usize {
        self.temps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.temps.is_empty()
    }

    pub fn window_start(&self) -> Option<OffsetDateTime> {
        self.window_start
    }

    /// Whole seconds until the open window closes, `None` when no window is open
    pub fn seconds_until_flush(&self, now: OffsetDateTime) -> Option<u64> {
        self.window_start.map(|start| {
            start
                .checked_add(self.window)
                .map_or(u64::MAX, |end| duration_to_seconds(end - now))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use time::macros::datetime;

    fn reading(temperature: f32, humidity: f32, taken_at: OffsetDateTime) -> Reading {
        Reading {
            temperature,
            humidity,
            taken_at,
        }
    }

    #[test]
    fn flush_on_empty_buffer_is_a_noop() {
        let mut buffer = AveragingBuffer::new(Duration::from_secs(300));
        assert_eq!(buffer.flush(), None);
        assert_eq!(buffer.force_flush(), None);
        assert!(buffer.is_empty());
        assert_eq!(buffer.window_start(), None);
    }

    #[test]
    fn window_closes_after_five_minutes() {
        let mut buffer = AveragingBuffer::new(Duration::from_secs(300));

        assert_eq!(buffer.append(&reading(25.0, 50.0, datetime!(2024-01-05 15:15:00 UTC))), None);
        assert_eq!(buffer.window_start(), Some(datetime!(2024-01-05 15:15:00 UTC)));
        assert_eq!(buffer.append(&reading(26.0, 52.0, datetime!(2024-01-05 15:17:30 UTC))), None);

        let point = buffer
            .append(&reading(27.0, 51.0, datetime!(2024-01-05 15:20:00 UTC)))
            .expect("window should close at 300s");

        assert_eq!(point.label, "Jan 05 03:17 PM");
        assert_eq!(point.temperature, 26.0);
        assert_eq!(point.humidity, 51.0);
        assert_eq!(point.taken_at, Some(datetime!(2024-01-05 15:17:30 UTC)));

        assert!(buffer.is_empty());
        assert_eq!(buffer.window_start(), None);
    }

    #[test]
    fn mean_does_not_depend_on_order() {
        let start = datetime!(2024-03-10 08:00:00 UTC);
        let values = [(21.3, 40.2), (22.9, 41.7), (20.1, 44.4), (23.4, 40.1)];

        let mut forward = AveragingBuffer::new(Duration::from_secs(300));
        let mut backward = AveragingBuffer::new(Duration::from_secs(300));
        for (i, (t, h)) in values.iter().enumerate() {
            forward.append(&reading(*t, *h, start + time::Duration::seconds(i as i64 * 5)));
        }
        for (i, (t, h)) in values.iter().rev().enumerate() {
            backward.append(&reading(*t, *h, start + time::Duration::seconds(i as i64 * 5)));
        }

        let a = forward.flush().unwrap();
        let b = backward.flush().unwrap();
        assert_eq!(a.temperature, 21.9);
        assert_eq!(a.humidity, 41.6);
        assert_eq!(a.temperature, b.temperature);
        assert_eq!(a.humidity, b.humidity);
    }

    #[test]
    fn force_flush_emits_partial_window() {
        let mut buffer = AveragingBuffer::new(Duration::from_secs(300));
        buffer.append(&reading(30.0, 60.0, datetime!(2024-01-05 10:00:00 UTC)));

        let point = buffer.force_flush().unwrap();
        assert_eq!(point.temperature, 30.0);
        assert_eq!(point.label, "Jan 05 10:02 AM");
        assert_eq!(buffer.force_flush(), None);
    }

    #[test]
    fn sparse_readings_still_close_on_elapsed_time() {
        let mut buffer = AveragingBuffer::new(Duration::from_secs(300));
        buffer.append(&reading(20.0, 50.0, datetime!(2024-01-05 10:00:00 UTC)));
        let point = buffer.append(&reading(22.0, 52.0, datetime!(2024-01-05 10:07:00 UTC)));
        assert_eq!(point.map(|p| p.temperature), Some(21.0));
    }

    #[test]
    fn countdown_until_window_close() {
        let mut buffer = AveragingBuffer::new(Duration::from_secs(300));
        assert_eq!(buffer.seconds_until_flush(datetime!(2024-01-05 10:00:00 UTC)), None);

        buffer.append(&reading(20.0, 50.0, datetime!(2024-01-05 10:00:00 UTC)));
        assert_eq!(buffer.seconds_until_flush(datetime!(2024-01-05 10:01:40 UTC)), Some(200));
        assert_eq!(buffer.seconds_until_flush(datetime!(2024-01-05 10:09:00 UTC)), Some(0));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn oversized_window_does_not_overflow() {
        let mut buffer = AveragingBuffer::new(Duration::from_secs(1_000_000_000_000));
        let at = datetime!(2024-01-05 10:00:00 UTC);
        assert_eq!(buffer.append(&reading(20.0, 50.0, at)), None);

        assert_eq!(buffer.seconds_until_flush(at), Some(u64::MAX));
        let point = buffer.force_flush().unwrap();
        assert_eq!(point.taken_at, Some(at));
        assert_eq!(point.temperature, 20.0);
    }
}
