pub mod buffer;
pub mod retention;

use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::error::MonitorError;
use crate::models::HistoryStats;
use crate::utils::format_timestamp;

pub use buffer::AveragingBuffer;
pub use retention::{RetentionStore, StoreStats};

pub type SharedBuffer = Arc<Mutex<AveragingBuffer>>;
pub type SharedStore = Arc<Mutex<RetentionStore>>;

/// Run a store operation that may touch the disk on the blocking pool
///
/// The store stays locked until `op` returns, so operations on the same
/// store never interleave.
///
/// # Arguments
/// * `store` - Shared retention store
/// * `op` - Operation to run with exclusive access to the store
///
/// # Returns
/// The operation's result, or a task error if it panicked
pub async fn with_store<F, R>(store: &SharedStore, op: F) -> Result<R, MonitorError>
where
    F: FnOnce(&mut RetentionStore) -> R + Send + 'static,
    R: Send + 'static,
{
    let mut guard = Arc::clone(store).lock_owned().await;
    let result = tokio::task::spawn_blocking(move || op(&mut guard)).await?;
    Ok(result)
}

/// Merge store statistics with the state of the open averaging window
pub fn history_stats(
    store: &RetentionStore,
    buffer: &AveragingBuffer,
    now: OffsetDateTime,
) -> HistoryStats {
    let StoreStats {
        total_points,
        oldest_label,
        newest_label,
        last_save,
    } = store.stats();

    HistoryStats {
        total_points,
        oldest_point: oldest_label,
        newest_point: newest_label,
        last_save: last_save.as_ref().map(format_timestamp),
        buffered_readings: buffer.len(),
        buffer_start: buffer.window_start().as_ref().map(format_timestamp),
        next_save_in: buffer.seconds_until_flush(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Reading;
    use crate::storage::retention::tests::temp_history_path;
    use std::time::Duration;
    use time::macros::datetime;
    use time::UtcOffset;

    #[test]
    fn stats_for_empty_history() {
        let store = RetentionStore::new(temp_history_path("merged-empty"), 288, UtcOffset::UTC);
        let buffer = AveragingBuffer::new(Duration::from_secs(300));

        let stats = history_stats(&store, &buffer, datetime!(2024-01-05 12:00 UTC));
        assert_eq!(stats.total_points, 0);
        assert_eq!(stats.buffered_readings, 0);
        assert_eq!(stats.buffer_start, None);
        assert_eq!(stats.next_save_in, None);
        assert_eq!(stats.last_save, None);
    }

    #[test]
    fn stats_include_open_window() {
        let store = RetentionStore::new(temp_history_path("merged-open"), 288, UtcOffset::UTC);
        let mut buffer = AveragingBuffer::new(Duration::from_secs(300));
        buffer.append(&Reading {
            temperature: 22.0,
            humidity: 40.0,
            taken_at: datetime!(2024-01-05 12:00 UTC),
        });

        let stats = history_stats(&store, &buffer, datetime!(2024-01-05 12:01 UTC));
        assert_eq!(stats.buffered_readings, 1);
        assert_eq!(stats.buffer_start.as_deref(), Some("2024-01-05T12:00:00Z"));
        assert_eq!(stats.next_save_in, Some(240));
    }

    #[tokio::test]
    async fn store_operations_run_off_the_runtime() {
        let store: SharedStore = Arc::new(Mutex::new(RetentionStore::new(
            temp_history_path("blocking"),
            288,
            UtcOffset::UTC,
        )));
        let at = datetime!(2024-01-05 12:02:30 UTC);

        let len = with_store(&store, move |store| {
            store.append(
                crate::models::AveragedPoint {
                    label: "Jan 05 12:02 PM".into(),
                    temperature: 21.0,
                    humidity: 45.0,
                    taken_at: Some(at),
                },
                at,
            );
            store.len()
        })
        .await
        .unwrap();

        assert_eq!(len, 1);
        let store = store.lock().await;
        assert!(store.path().exists());
    }
}
