/// Capacity- and age-bounded series of averaged points, persisted as JSON
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use time::{OffsetDateTime, UtcOffset};

use crate::error::MonitorError;
use crate::models::{AveragedPoint, HistorySeries};
use crate::utils::{format_timestamp, parse_label, parse_timestamp};

/// On-disk layout of the history file
#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    data: HistoryData,
    last_save: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryData {
    labels: Vec<String>,
    temp: Vec<f32>,
    hum: Vec<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    time: Vec<Option<String>>,
}

/// Summary of the retained series
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub total_points: usize,
    pub oldest_label: Option<String>,
    pub newest_label: Option<String>,
    pub last_save: Option<OffsetDateTime>,
}

#[derive(Debug)]
pub struct RetentionStore {
    points: VecDeque<AveragedPoint>,
    max_points: usize,
    last_save: Option<OffsetDateTime>,
    path: PathBuf,
    offset: UtcOffset,
}

impl RetentionStore {
    /// Create an empty store backed by `path`
    pub fn new(path: impl Into<PathBuf>, max_points: usize, offset: UtcOffset) -> Self {
        let max_points = max_points.max(1);
        Self {
            points: VecDeque::with_capacity(max_points),
            max_points,
            last_save: None,
            path: path.into(),
            offset,
        }
    }

    /// Load the store from `path`
    ///
    /// A missing or unreadable file yields an empty store; startup never
    /// fails because of history. Series longer than `max_points` keep their
    /// newest entries.
    ///
    /// # Arguments
    /// * `path` - History JSON file
    /// * `max_points` - Capacity of the store
    /// * `offset` - Offset for labels and timestamps stored without one
    ///
    /// # Returns
    /// The loaded store, empty if nothing usable was found
    pub fn load(path: impl Into<PathBuf>, max_points: usize, offset: UtcOffset) -> Self {
        let mut store = Self::new(path, max_points, offset);

        match store.read_file() {
            Ok(Some(count)) => info!("Loaded {} historical data points", count),
            Ok(None) => info!(
                "No historical data file found at {}, starting fresh",
                store.path.display()
            ),
            Err(e) => {
                warn!("Error loading historical data, starting empty: {}", e);
                store.points.clear();
                store.last_save = None;
            }
        }

        store
    }

    fn read_file(&mut self) -> Result<Option<usize>, MonitorError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MonitorError::persistence(&self.path, e)),
        };

        let file: HistoryFile = serde_json::from_str(&contents)?;
        let HistoryData {
            labels,
            temp,
            hum,
            time: times,
        } = file.data;

        if labels.len() != temp.len() || labels.len() != hum.len() {
            return Err(MonitorError::Serialization(serde::de::Error::custom(format!(
                "history arrays differ in length (labels={}, temp={}, hum={})",
                labels.len(),
                temp.len(),
                hum.len()
            ))));
        }

        self.last_save = file
            .last_save
            .as_deref()
            .and_then(|value| parse_timestamp(value, self.offset));

        // Labels carry no year; anchor legacy entries to the save time
        let anchor = self
            .last_save
            .unwrap_or_else(|| OffsetDateTime::now_utc().to_offset(self.offset));

        for (i, ((label, temperature), humidity)) in labels.into_iter().zip(temp).zip(hum).enumerate() {
            let stored = times
                .get(i)
                .and_then(|t| t.as_deref())
                .and_then(|t| parse_timestamp(t, self.offset));
            let taken_at = stored.or_else(|| self.resolve_label(&label, anchor));

            self.points.push_back(AveragedPoint {
                label,
                temperature,
                humidity,
                taken_at,
            });
        }

        let excess = self.points.len().saturating_sub(self.max_points);
        self.points.drain(..excess);

        Ok(Some(self.points.len()))
    }

    fn resolve_label(&self, label: &str, anchor: OffsetDateTime) -> Option<OffsetDateTime> {
        match parse_label(label, anchor.year(), self.offset) {
            Ok(dt) if dt > anchor => parse_label(label, anchor.year() - 1, self.offset).ok(),
            Ok(dt) => Some(dt),
            Err(e) => {
                warn!("{}; the point will not be pruned by age", e);
                None
            }
        }
    }

    /// Append a point, evicting the oldest entries beyond capacity, and persist
    ///
    /// A failed write is logged; the point stays in memory and is written
    /// with the next successful persist.
    ///
    /// # Arguments
    /// * `point` - Averaged point to add as the newest entry
    /// * `now` - Recorded as the last save time
    pub fn append(&mut self, point: AveragedPoint, now: OffsetDateTime) {
        self.points.push_back(point);
        while self.points.len() > self.max_points {
            self.points.pop_front();
        }
        self.last_save = Some(now);

        if let Err(e) = self.persist() {
            error!("Error saving historical data: {}", e);
        }
    }

    /// Drop every point before the first one taken at or after `cutoff`
    ///
    /// When no point qualifies the store is left as is. Points without a
    /// timestamp are skipped while searching.
    ///
    /// # Arguments
    /// * `cutoff` - Oldest timestamp that may remain in the store
    ///
    /// # Returns
    /// Number of points dropped
    pub fn prune_older_than(&mut self, cutoff: OffsetDateTime) -> usize {
        let keep_from = self.points.iter().position(|point| match point.taken_at {
            Some(taken_at) => taken_at >= cutoff,
            None => {
                debug!("Skipping history point without timestamp: {}", point.label);
                false
            }
        });

        let dropped = match keep_from {
            Some(index) if index > 0 => index,
            _ => return 0,
        };

        self.points.drain(..dropped);
        if let Err(e) = self.persist() {
            error!("Error saving historical data after pruning: {}", e);
        }
        info!("Cleaned {} old data points", dropped);

        dropped
    }

    /// Empty the store and delete the persisted file
    ///
    /// The in-memory series is cleared even when deleting the file fails.
    ///
    /// # Returns
    /// Ok when the file is gone (or never existed), a persistence error otherwise
    pub fn clear(&mut self) -> Result<(), MonitorError> {
        self.points.clear();
        self.last_save = None;

        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(MonitorError::persistence(&self.path, e)),
        }

        info!("Historical data cleared");
        Ok(())
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total_points: self.points.len(),
            oldest_label: self.points.front().map(|p| p.label.clone()),
            newest_label: self.points.back().map(|p| p.label.clone()),
            last_save: self.last_save,
        }
    }

    /// The full series in the three-array form the dashboard consumes
    pub fn series(&self) -> HistorySeries {
        HistorySeries {
            labels: self.points.iter().map(|p| p.label.clone()).collect(),
            temp: self.points.iter().map(|p| p.temperature).collect(),
            hum: self.points.iter().map(|p| p.humidity).collect(),
        }
    }

    /// Write the store to disk via a temporary file and rename
    ///
    /// The parent directory is created on first write. Blocks on file I/O, so
    /// async callers go through `storage::with_store`.
    pub fn persist(&self) -> Result<(), MonitorError> {
        let file = HistoryFile {
            data: HistoryData {
                labels: self.points.iter().map(|p| p.label.clone()).collect(),
                temp: self.points.iter().map(|p| p.temperature).collect(),
                hum: self.points.iter().map(|p| p.humidity).collect(),
                time: self
                    .points
                    .iter()
                    .map(|p| p.taken_at.as_ref().map(format_timestamp))
                    .collect(),
            },
            last_save: self.last_save.as_ref().map(format_timestamp),
        };
        let json = serde_json::to_string_pretty(&file)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| MonitorError::persistence(parent, e))?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(|e| MonitorError::persistence(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| MonitorError::persistence(&self.path, e))?;

        debug!("Saved historical data with {} points", self.points.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
