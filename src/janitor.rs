/// Periodic age-based pruning of the retention store
use log::{debug, error, info};
use std::time::Duration;
use time::{OffsetDateTime, UtcOffset};

use crate::config::MonitorConfig;
use crate::shutdown::StopSignal;
use crate::storage::{with_store, SharedStore};

pub struct RetentionJanitor {
    store: SharedStore,
    retention: time::Duration,
    interval: Duration,
    utc_offset: UtcOffset,
}

impl RetentionJanitor {
    pub fn new(store: SharedStore, config: &MonitorConfig) -> Self {
        Self {
            store,
            retention: time::Duration::try_from(config.retention).unwrap_or(time::Duration::MAX),
            interval: config.prune_interval,
            utc_offset: config.utc_offset,
        }
    }

    /// Prune points older than the retention period as of `now`
    ///
    /// # Arguments
    /// * `now` - Current time in the configured offset
    ///
    /// # Returns
    /// Number of points removed; zero when the store is empty, when no point
    /// is recent enough to anchor the cut, or when the cutoff is unrepresentable
    pub async fn prune_once(&self, now: OffsetDateTime) -> usize {
        let cutoff = match now.checked_sub(self.retention) {
            Some(cutoff) => cutoff,
            None => return 0,
        };

        let pruned = with_store(&self.store, move |store| {
            if store.is_empty() {
                0
            } else {
                store.prune_older_than(cutoff)
            }
        })
        .await;

        pruned.unwrap_or_else(|e| {
            error!("Retention check failed: {}", e);
            0
        })
    }

    /// Prune once per interval until stopped; the first prune happens after
    /// one full interval
    pub async fn run(self, mut stop: StopSignal) {
        info!(
            "Retention janitor pruning every {}s",
            self.interval.as_secs()
        );

        loop {
            if stop.sleep(self.interval).await {
                break;
            }
            let now = OffsetDateTime::now_utc().to_offset(self.utc_offset);
            let dropped = self.prune_once(now).await;
            debug!("Retention check removed {} points", dropped);
        }

        info!("Retention janitor stopped");
    }
}
