//! The trip controller.
//!
//! The controller is the user-facing side of trip recording. It never
//! owns trip state; it holds a cached snapshot of the recorder's answer
//! and treats the recorder as authoritative. The cache makes status
//! queries instant, and a short background poll re-converges it after a
//! start. When a stop does not take effect in time the controller
//! escalates: one unconditional force stop, an orphan repair pass, and
//! the cache pinned to idle. The sequence is safe to run against a dead
//! recorder, so a stuck stop always lands the system in a clean state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::ManualTripData;
use crate::recorder::{RecorderLink, RecorderStatus, StartRequest};
use crate::repair::{repair_orphans, RepairReport};
use crate::storage::SharedStore;
use crate::sync::{notify_detached, SyncNotifier};

/// The controller's cached view of the recorder.
///
/// A snapshot, not the truth: the recorder's own answer wins whenever
/// the two disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CachedStatus {
    /// Whether a trip is believed to be recording.
    pub is_tracking: bool,
    /// The open trip's id, when tracking.
    pub trip_id: Option<i64>,
}

impl CachedStatus {
    /// The idle snapshot.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            is_tracking: false,
            trip_id: None,
        }
    }

    /// A snapshot tracking the given trip.
    #[must_use]
    pub fn tracking(trip_id: i64) -> Self {
        Self {
            is_tracking: true,
            trip_id: Some(trip_id),
        }
    }
}

impl From<RecorderStatus> for CachedStatus {
    fn from(status: RecorderStatus) -> Self {
        Self {
            is_tracking: status.is_tracking,
            trip_id: status.trip_id,
        }
    }
}

/// Timing knobs for the controller's convergence and stop paths.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Delays between cache re-convergence polls after a start.
    pub convergence_delays: Vec<Duration>,
    /// How long a stop may take before the controller escalates.
    pub stop_wait: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            convergence_delays: vec![
                Duration::from_millis(500),
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(1000),
            ],
            stop_wait: Duration::from_millis(1000),
        }
    }
}

impl ControllerSettings {
    /// Build settings from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            convergence_delays: config.convergence_delays(),
            stop_wait: config.stop_wait(),
        }
    }
}

/// User-facing coordinator for trip recording.
pub struct TripController {
    link: Arc<dyn RecorderLink>,
    store: SharedStore,
    sync: Arc<dyn SyncNotifier>,
    cache: Arc<Mutex<CachedStatus>>,
    settings: ControllerSettings,
}

impl std::fmt::Debug for TripController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripController")
            .field("cache", &self.cached_status())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TripController {
    /// Create a controller over the given recorder link and store.
    #[must_use]
    pub fn new(
        link: Arc<dyn RecorderLink>,
        store: SharedStore,
        sync: Arc<dyn SyncNotifier>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            link,
            store,
            sync,
            cache: Arc::new(Mutex::new(CachedStatus::idle())),
            settings,
        }
    }

    fn cache_mut(&self) -> MutexGuard<'_, CachedStatus> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached recorder snapshot, without contacting the recorder.
    #[must_use]
    pub fn cached_status(&self) -> CachedStatus {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initialize the cache on startup.
    ///
    /// Runs an orphan repair pass first, then seeds the cache from the
    /// recorder's answer. An unreachable recorder seeds an idle cache;
    /// by then repair has already closed everything it left behind.
    ///
    /// # Errors
    ///
    /// Returns an error if the trip table cannot be read or updated.
    pub async fn attach(&self) -> Result<CachedStatus> {
        let report = repair_orphans(&self.store, self.link.as_ref()).await?;
        if report.repaired_any() {
            info!("closed {} orphaned trip(s) on startup", report.closed.len());
        }

        let snapshot = match self.link.status().await {
            Ok(status) => CachedStatus::from(status),
            Err(err) => {
                debug!("recorder unreachable on attach ({}), caching idle", err);
                CachedStatus::idle()
            }
        };
        *self.cache_mut() = snapshot;
        Ok(snapshot)
    }

    /// Start recording a trip.
    ///
    /// Repairs orphans first, refreshes the cached view from the
    /// recorder, and rejects with `AlreadyTracking` when a trip is
    /// already recording. On success the cache flips to tracking
    /// immediately and a short background poll re-converges it with the
    /// recorder's own answer.
    ///
    /// # Errors
    ///
    /// Returns the recorder's precondition rejections verbatim,
    /// `RecorderUnreachable` on a transport failure, or a storage error
    /// from the repair pass.
    pub async fn start_trip(&self, request: StartRequest) -> Result<i64> {
        repair_orphans(&self.store, self.link.as_ref()).await?;

        // Reject from a fresh answer, not the cache: repair may just
        // have closed the trip the cache remembers. An unreachable
        // recorder cannot be tracking anything repair left open.
        let current = match self.link.status().await {
            Ok(status) => CachedStatus::from(status),
            Err(err) => {
                debug!("status refresh before start failed ({})", err);
                CachedStatus::idle()
            }
        };
        *self.cache_mut() = current;

        if current.is_tracking {
            return Err(Error::AlreadyTracking {
                trip_id: current.trip_id,
            });
        }

        let trip_id = self.link.start_trip(request).await?;
        *self.cache_mut() = CachedStatus::tracking(trip_id);
        self.spawn_convergence_poll();

        info!("trip {} started", trip_id);
        Ok(trip_id)
    }

    /// Stop the open trip.
    ///
    /// Forwards the stop, waits `stop_wait`, and confirms the recorder
    /// actually went idle. A stop that fails, or a recorder still
    /// tracking after the wait, triggers escalation; either way the call
    /// returns with the system idle.
    ///
    /// # Errors
    ///
    /// Returns an error only if escalation's storage work fails; an
    /// unresponsive recorder is handled, not surfaced.
    pub async fn stop_trip(&self) -> Result<()> {
        if let Err(err) = self.link.stop_trip().await {
            warn!("stop request failed ({}), escalating", err);
            return self.escalate().await;
        }

        tokio::time::sleep(self.settings.stop_wait).await;

        match self.link.status().await {
            Ok(status) if !status.is_tracking => {
                *self.cache_mut() = CachedStatus::from(status);
                info!("trip stopped");
                Ok(())
            }
            Ok(status) => {
                warn!(
                    "recorder still tracking trip {:?} after stop, escalating",
                    status.trip_id
                );
                self.escalate().await
            }
            Err(err) => {
                warn!("status check after stop failed ({}), escalating", err);
                self.escalate().await
            }
        }
    }

    /// Run an orphan repair pass on demand and refresh the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the trip table cannot be read or updated.
    pub async fn force_cleanup(&self) -> Result<RepairReport> {
        let report = repair_orphans(&self.store, self.link.as_ref()).await?;

        let snapshot = match self.link.status().await {
            Ok(status) => CachedStatus::from(status),
            Err(_) => CachedStatus::idle(),
        };
        *self.cache_mut() = snapshot;
        Ok(report)
    }

    /// Attach manual data to a trip and notify the sync service.
    ///
    /// The notification is fire-and-forget; the edit is durable before
    /// it is dispatched and never fails because of it.
    ///
    /// # Errors
    ///
    /// Returns `TripNotFound` if the trip does not exist, or a storage
    /// error if the update fails.
    pub async fn update_manual_data(&self, trip_id: i64, data: &ManualTripData) -> Result<()> {
        let updated = self.store.lock().await.set_manual_data(trip_id, data)?;
        if !updated {
            return Err(Error::TripNotFound { trip_id });
        }

        notify_detached(Arc::clone(&self.sync), trip_id);
        Ok(())
    }

    /// Stuck-stop recovery: one unconditional force stop, an orphan
    /// repair pass, and an idle cache. Each step tolerates a dead
    /// recorder, so the sequence always lands idle.
    async fn escalate(&self) -> Result<()> {
        if let Err(err) = self.link.force_stop().await {
            warn!("force stop failed during escalation: {}", err);
        }
        if let Err(err) = repair_orphans(&self.store, self.link.as_ref()).await {
            warn!("orphan repair during escalation failed: {}", err);
        }
        *self.cache_mut() = CachedStatus::idle();
        info!("escalation complete, recorder idle");
        Ok(())
    }

    /// Re-converge the cache with the recorder after a start, on a
    /// detached task. Failed polls leave the cache as is.
    fn spawn_convergence_poll(&self) {
        let link = Arc::clone(&self.link);
        let cache = Arc::clone(&self.cache);
        let delays = self.settings.convergence_delays.clone();

        tokio::spawn(async move {
            for delay in delays {
                tokio::time::sleep(delay).await;
                match link.status().await {
                    Ok(status) => {
                        *cache.lock().unwrap_or_else(PoisonError::into_inner) =
                            CachedStatus::from(status);
                    }
                    Err(err) => debug!("convergence poll failed: {}", err),
                }
            }
        });
    }
}
