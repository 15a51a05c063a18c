//! Remote sync notification boundary.
//!
//! The sync protocol itself is an external collaborator. The core only
//! notifies it after manual-data edits, fire-and-forget: the edit never
//! waits on, and never fails because of, a sync outcome.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;

/// Trait for the remote synchronization service.
#[async_trait::async_trait]
pub trait SyncNotifier: Send + Sync {
    /// The name of this notifier (for logging/debugging).
    fn name(&self) -> &'static str;

    /// Notify the sync service that a trip changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification could not be delivered. The
    /// caller is expected to log and drop it.
    async fn trip_changed(&self, trip_id: i64) -> Result<()>;
}

/// A sync notifier that only logs, for standalone use and tests.
#[derive(Debug, Default, Clone)]
pub struct NullSync;

#[async_trait::async_trait]
impl SyncNotifier for NullSync {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn trip_changed(&self, trip_id: i64) -> Result<()> {
        debug!("sync notification for trip {} (no-op)", trip_id);
        Ok(())
    }
}

/// Dispatch a change notification on a detached task.
///
/// Failures are logged at warn level and otherwise ignored.
pub fn notify_detached(notifier: Arc<dyn SyncNotifier>, trip_id: i64) {
    tokio::spawn(async move {
        if let Err(err) = notifier.trip_changed(trip_id).await {
            warn!(
                "sync notifier '{}' failed for trip {}: {}",
                notifier.name(),
                trip_id,
                err
            );
        }
    });
}
