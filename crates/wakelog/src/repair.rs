//! Orphaned-trip repair.
//!
//! An orphaned trip is an open trip row whose recorder is gone: the
//! process crashed, the task panicked, or the row predates this run.
//! Repair closes every open trip the live recorder does not claim,
//! stamping the end time with the repair time. It is deliberately
//! aggressive: when the recorder cannot be reached at all, every open
//! trip is treated as orphaned and closed. A reachable recorder's
//! claimed trip is never touched.
//!
//! Closing goes through the conditional update in
//! [`crate::storage::TripStore::close_trip`], so running repair twice,
//! or concurrently with a normal stop, closes each trip at most once.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::recorder::RecorderLink;
use crate::storage::SharedStore;

/// Outcome of one repair pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Number of open trips examined.
    pub examined: usize,
    /// Ids of the trips closed as orphans.
    pub closed: Vec<i64>,
}

impl RepairReport {
    /// Whether the pass closed anything.
    #[must_use]
    pub fn repaired_any(&self) -> bool {
        !self.closed.is_empty()
    }
}

/// Close every open trip the recorder does not claim.
///
/// # Errors
///
/// Returns an error only when the trip table cannot be read or updated.
/// An unreachable recorder is not an error; it means no trip is claimed.
pub async fn repair_orphans(store: &SharedStore, link: &dyn RecorderLink) -> Result<RepairReport> {
    let open = store.lock().await.active_trips()?;
    if open.is_empty() {
        return Ok(RepairReport::default());
    }

    let claimed = match link.status().await {
        Ok(status) => status.trip_id,
        Err(err) => {
            warn!("recorder unreachable during repair ({}), treating all open trips as orphaned", err);
            None
        }
    };

    let mut report = RepairReport {
        examined: open.len(),
        closed: Vec::new(),
    };
    let now = Utc::now();

    for trip in open {
        let Some(trip_id) = trip.id else { continue };
        if Some(trip_id) == claimed {
            debug!("trip {} is claimed by the live recorder, leaving open", trip_id);
            continue;
        }
        if store.lock().await.close_trip(trip_id, now)? {
            info!("closed orphaned trip {}", trip_id);
            report.closed.push(trip_id);
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::{Boat, Trip, TripContext, TripRole, WaterType};
    use crate::recorder::{RecorderStatus, StartRequest};
    use crate::storage::TripStore;

    /// A scripted recorder link for exercising repair in isolation.
    struct StubLink {
        status: Result<RecorderStatus>,
    }

    impl StubLink {
        fn idle() -> Self {
            Self {
                status: Ok(RecorderStatus::idle()),
            }
        }

        fn tracking(trip_id: i64) -> Self {
            Self {
                status: Ok(RecorderStatus::tracking(trip_id)),
            }
        }

        fn unreachable() -> Self {
            Self {
                status: Err(Error::RecorderUnreachable),
            }
        }
    }

    #[async_trait::async_trait]
    impl RecorderLink for StubLink {
        async fn start_trip(&self, _request: StartRequest) -> Result<i64> {
            Err(Error::RecorderUnreachable)
        }

        async fn stop_trip(&self) -> Result<()> {
            Err(Error::RecorderUnreachable)
        }

        async fn force_stop(&self) -> Result<()> {
            Err(Error::RecorderUnreachable)
        }

        async fn status(&self) -> Result<RecorderStatus> {
            match &self.status {
                Ok(status) => Ok(*status),
                Err(_) => Err(Error::RecorderUnreachable),
            }
        }
    }

    fn shared_store_with_open_trips(count: usize) -> (SharedStore, Vec<i64>) {
        let store = TripStore::open_in_memory().expect("failed to create test store");
        let boat_id = store.insert_boat(&Boat::new("Misty")).unwrap();
        let ids = (0..count)
            .map(|_| {
                let trip = Trip::new(
                    boat_id,
                    WaterType::Salt,
                    TripRole::Skipper,
                    1000,
                    TripContext::default(),
                );
                store.insert_trip(&trip).unwrap()
            })
            .collect();
        (store.into_shared(), ids)
    }

    #[tokio::test]
    async fn test_no_open_trips_is_a_no_op() {
        let (store, _) = shared_store_with_open_trips(0);
        let report = repair_orphans(&store, &StubLink::idle()).await.unwrap();

        assert_eq!(report, RepairReport::default());
        assert!(!report.repaired_any());
    }

    #[tokio::test]
    async fn test_idle_recorder_orphans_everything() {
        let (store, ids) = shared_store_with_open_trips(2);
        let report = repair_orphans(&store, &StubLink::idle()).await.unwrap();

        assert_eq!(report.examined, 2);
        assert_eq!(report.closed, ids);
        assert!(store.lock().await.active_trips().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_claimed_trip_is_left_open() {
        let (store, ids) = shared_store_with_open_trips(3);
        let claimed = ids[1];
        let report = repair_orphans(&store, &StubLink::tracking(claimed))
            .await
            .unwrap();

        assert_eq!(report.examined, 3);
        assert_eq!(report.closed, vec![ids[0], ids[2]]);

        let still_open = store.lock().await.active_trips().unwrap();
        assert_eq!(still_open.len(), 1);
        assert_eq!(still_open[0].id, Some(claimed));
    }

    #[tokio::test]
    async fn test_unreachable_recorder_orphans_everything() {
        let (store, ids) = shared_store_with_open_trips(2);
        let report = repair_orphans(&store, &StubLink::unreachable())
            .await
            .unwrap();

        assert_eq!(report.closed, ids);
        assert!(store.lock().await.active_trips().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repair_is_idempotent() {
        let (store, ids) = shared_store_with_open_trips(2);

        let first = repair_orphans(&store, &StubLink::idle()).await.unwrap();
        assert_eq!(first.closed, ids);

        let second = repair_orphans(&store, &StubLink::idle()).await.unwrap();
        assert_eq!(second, RepairReport::default());
    }

    #[tokio::test]
    async fn test_closed_trips_keep_their_points() {
        let (store, ids) = shared_store_with_open_trips(1);
        {
            let guard = store.lock().await;
            guard
                .append_point(&crate::model::GpsPoint {
                    trip_id: ids[0],
                    latitude: 59.9,
                    longitude: 10.7,
                    altitude: None,
                    accuracy: None,
                    speed: None,
                    heading: None,
                    timestamp: Utc::now(),
                })
                .unwrap();
        }

        repair_orphans(&store, &StubLink::idle()).await.unwrap();

        let guard = store.lock().await;
        assert_eq!(guard.point_count(ids[0]).unwrap(), 1);
        assert!(!guard.get_trip(ids[0]).unwrap().unwrap().is_open());
    }
}
