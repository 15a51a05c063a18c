//! The background trip recorder.
//!
//! The recorder is the single owner of the "is a trip open, and which
//! one" fact. It runs as a dedicated task that shares no mutable memory
//! with the controller: all coordination happens through the command
//! channel ([`RecorderLink`]) and the durable trip table. While a trip
//! is open it samples the position source on its own timer and serially
//! appends points, independent of any controller activity.
//!
//! The task may die at any time, leaving an open trip row with no owner;
//! resolving that is the job of [`crate::repair`], not the recorder.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{GpsPoint, Trip, TripContext, TripRole, WaterType};
use crate::position::PositionSource;
use crate::storage::SharedStore;

/// Capacity of the recorder command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// The recorder's answer to a status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct RecorderStatus {
    /// Whether a trip is currently being recorded.
    pub is_tracking: bool,
    /// The open trip's id, when tracking.
    pub trip_id: Option<i64>,
}

impl RecorderStatus {
    /// Status for an idle recorder.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            is_tracking: false,
            trip_id: None,
        }
    }

    /// Status for a recorder tracking the given trip.
    #[must_use]
    pub fn tracking(trip_id: i64) -> Self {
        Self {
            is_tracking: true,
            trip_id: Some(trip_id),
        }
    }
}

/// Parameters for starting a trip.
#[derive(Debug, Clone)]
pub struct StartRequest {
    /// The boat to record the trip against.
    pub boat_id: i64,
    /// The kind of water.
    pub water_type: WaterType,
    /// The user's role aboard.
    pub role: TripRole,
    /// Position sampling period in milliseconds.
    pub update_interval_ms: u64,
    /// Optional context captured at start.
    pub context: TripContext,
}

/// The control surface between a controller and the recorder.
///
/// Every method that crosses to the recorder maps a broken transport to
/// [`Error::RecorderUnreachable`]; `start_trip` additionally surfaces
/// the recorder's precondition rejections verbatim.
#[async_trait::async_trait]
pub trait RecorderLink: Send + Sync {
    /// Start recording a trip. Returns the new trip's id.
    ///
    /// # Errors
    ///
    /// Returns `BoatNotFound`, `BoatDisabled`, or `AlreadyTracking` when
    /// the precondition check fails (recorder state is unchanged), or
    /// `RecorderUnreachable` on a transport failure.
    async fn start_trip(&self, request: StartRequest) -> Result<i64>;

    /// Stop the open trip. A no-op if the recorder is idle.
    ///
    /// # Errors
    ///
    /// Returns `RecorderUnreachable` on a transport failure.
    async fn stop_trip(&self) -> Result<()>;

    /// Unconditionally stop tracking. Always succeeds on a live recorder;
    /// used only for recovery.
    ///
    /// # Errors
    ///
    /// Returns `RecorderUnreachable` on a transport failure.
    async fn force_stop(&self) -> Result<()>;

    /// Query the recorder's current state.
    ///
    /// # Errors
    ///
    /// Returns `RecorderUnreachable` on a transport failure.
    async fn status(&self) -> Result<RecorderStatus>;
}

/// Commands sent from a [`RecorderHandle`] to the recorder task.
#[derive(Debug)]
enum RecorderCommand {
    Start(StartRequest, oneshot::Sender<Result<i64>>),
    Stop(oneshot::Sender<Result<()>>),
    ForceStop(oneshot::Sender<()>),
    Status(oneshot::Sender<RecorderStatus>),
}

/// A cloneable handle to a spawned recorder task.
#[derive(Debug, Clone)]
pub struct RecorderHandle {
    tx: mpsc::Sender<RecorderCommand>,
}

#[async_trait::async_trait]
impl RecorderLink for RecorderHandle {
    async fn start_trip(&self, request: StartRequest) -> Result<i64> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RecorderCommand::Start(request, reply_tx))
            .await
            .map_err(|_| Error::RecorderUnreachable)?;
        reply_rx.await.map_err(|_| Error::RecorderUnreachable)?
    }

    async fn stop_trip(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RecorderCommand::Stop(reply_tx))
            .await
            .map_err(|_| Error::RecorderUnreachable)?;
        reply_rx.await.map_err(|_| Error::RecorderUnreachable)?
    }

    async fn force_stop(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RecorderCommand::ForceStop(reply_tx))
            .await
            .map_err(|_| Error::RecorderUnreachable)?;
        reply_rx.await.map_err(|_| Error::RecorderUnreachable)
    }

    async fn status(&self) -> Result<RecorderStatus> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RecorderCommand::Status(reply_tx))
            .await
            .map_err(|_| Error::RecorderUnreachable)?;
        reply_rx.await.map_err(|_| Error::RecorderUnreachable)
    }
}

/// A link with no recorder behind it; every call reports unreachable.
///
/// One-shot commands (status, cleanup, trip listing) use it so that
/// orphan repair treats every open row as ownerless.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRecorder;

#[async_trait::async_trait]
impl RecorderLink for NoRecorder {
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
        Err(Error::RecorderUnreachable)
    }
}

/// The currently tracked trip and its sampling timer.
#[derive(Debug)]
struct ActiveTrip {
    trip_id: i64,
    ticker: tokio::time::Interval,
}

impl ActiveTrip {
    fn new(trip_id: i64, update_interval_ms: u64) -> Self {
        let mut ticker =
            tokio::time::interval(Duration::from_millis(update_interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { trip_id, ticker }
    }
}

/// The recorder task state.
pub struct Recorder {
    store: SharedStore,
    source: Box<dyn PositionSource>,
    rx: mpsc::Receiver<RecorderCommand>,
    active: Option<ActiveTrip>,
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("source", &self.source.name())
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

enum Event {
    Command(Option<RecorderCommand>),
    Sample,
}

impl Recorder {
    /// Spawn the recorder task and return a handle to it.
    ///
    /// On startup the recorder recovers its state solely from durable
    /// trip rows: the newest open trip, if any, is adopted and sampling
    /// resumes at its recorded interval. Older open rows are left for
    /// orphan repair.
    pub fn spawn(store: SharedStore, source: Box<dyn PositionSource>) -> RecorderHandle {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let recorder = Self {
            store,
            source,
            rx,
            active: None,
        };
        tokio::spawn(recorder.run());
        RecorderHandle { tx }
    }

    async fn run(mut self) {
        self.adopt_open_trip().await;

        loop {
            match self.next_event().await {
                Event::Command(Some(command)) => self.handle_command(command).await,
                Event::Command(None) => {
                    debug!("recorder command channel closed, shutting down");
                    break;
                }
                Event::Sample => self.sample().await,
            }
        }
    }

    /// Wait for the next command or, while tracking, the next sampling tick.
    async fn next_event(&mut self) -> Event {
        match self.active.as_mut() {
            Some(active) => tokio::select! {
                command = self.rx.recv() => Event::Command(command),
                _ = active.ticker.tick() => Event::Sample,
            },
            None => Event::Command(self.rx.recv().await),
        }
    }

    async fn handle_command(&mut self, command: RecorderCommand) {
        match command {
            RecorderCommand::Start(request, reply) => {
                let _ = reply.send(self.handle_start(request).await);
            }
            RecorderCommand::Stop(reply) => {
                let _ = reply.send(self.handle_stop().await);
            }
            RecorderCommand::ForceStop(reply) => {
                self.handle_force_stop().await;
                let _ = reply.send(());
            }
            RecorderCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
        }
    }

    fn status(&self) -> RecorderStatus {
        match &self.active {
            Some(active) => RecorderStatus::tracking(active.trip_id),
            None => RecorderStatus::idle(),
        }
    }

    async fn handle_start(&mut self, request: StartRequest) -> Result<i64> {
        if let Some(active) = &self.active {
            return Err(Error::AlreadyTracking {
                trip_id: Some(active.trip_id),
            });
        }

        let trip_id = {
            let store = self.store.lock().await;
            let boat = store
                .get_boat(request.boat_id)?
                .ok_or(Error::BoatNotFound {
                    boat_id: request.boat_id,
                })?;
            if !boat.enabled {
                return Err(Error::BoatDisabled { name: boat.name });
            }

            let trip = Trip::new(
                request.boat_id,
                request.water_type,
                request.role,
                request.update_interval_ms,
                request.context,
            );
            store.insert_trip(&trip)?
        };

        info!(
            "started trip {} on boat {} ({} ms interval)",
            trip_id, request.boat_id, request.update_interval_ms
        );
        self.active = Some(ActiveTrip::new(trip_id, request.update_interval_ms));
        Ok(trip_id)
    }

    async fn handle_stop(&mut self) -> Result<()> {
        let Some(active) = self.active.take() else {
            debug!("stop requested while idle, nothing to do");
            return Ok(());
        };

        self.store
            .lock()
            .await
            .close_trip(active.trip_id, Utc::now())?;
        info!("stopped trip {}", active.trip_id);
        Ok(())
    }

    /// Unconditional stop. Storage failures are logged, never surfaced:
    /// force-stop must always succeed from the caller's point of view.
    async fn handle_force_stop(&mut self) {
        let Some(active) = self.active.take() else {
            debug!("force stop requested while idle");
            return;
        };

        warn!("force-stopping trip {}", active.trip_id);
        if let Err(err) = self
            .store
            .lock()
            .await
            .close_trip(active.trip_id, Utc::now())
        {
            warn!(
                "failed to close trip {} during force stop: {}",
                active.trip_id, err
            );
        }
    }

    /// Take one position sample and append it to the open trip.
    ///
    /// A failed fix or append skips the tick; sampling errors never stop
    /// the trip.
    async fn sample(&mut self) {
        let Some(trip_id) = self.active.as_ref().map(|a| a.trip_id) else {
            return;
        };

        match self.source.current_fix().await {
            Ok(fix) => {
                let point = GpsPoint {
                    trip_id,
                    latitude: fix.latitude,
                    longitude: fix.longitude,
                    altitude: fix.altitude,
                    accuracy: fix.accuracy,
                    speed: fix.speed,
                    heading: fix.heading,
                    timestamp: fix.timestamp,
                };
                if let Err(err) = self.store.lock().await.append_point(&point) {
                    warn!("failed to append point to trip {}: {}", trip_id, err);
                }
            }
            Err(err) => {
                debug!("skipping sample for trip {}: {}", trip_id, err);
            }
        }
    }

    async fn adopt_open_trip(&mut self) {
        let open = match self.store.lock().await.active_trips() {
            Ok(open) => open,
            Err(err) => {
                warn!("could not scan for open trips on startup: {}", err);
                return;
            }
        };

        let Some(trip) = open.into_iter().max_by_key(|t| t.start_time) else {
            return;
        };
        let Some(trip_id) = trip.id else { return };

        info!("resuming open trip {} after restart", trip_id);
        self.active = Some(ActiveTrip::new(trip_id, trip.update_interval_ms));
    }
}
