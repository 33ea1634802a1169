//! A playback session: one facility graph, one loaded dataset, one clock.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracer_graph::FacilityGraph;
use tracing::{debug, info, warn};

use crate::clock::{ClockState, PlaybackSpeed, TimelineClock};
use crate::error::Result;
use crate::log_store::{LogRecord, LogStore, VehicleId};
use crate::path::VehiclePathOverlay;
use crate::payload::{parse_payloads, PayloadRecord};
use crate::resolver::FleetSnapshot;
use crate::timestamp::format_time;

/// Non-fatal conditions noticed while loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadWarning {
    /// The dataset has no events; playback controls do nothing until a
    /// non-empty dataset is loaded.
    EmptyDataset,
}

/// Outcome of a successful log load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub event_count: usize,
    pub vehicle_count: usize,
    pub max_timestamp: u64,
    pub warnings: Vec<LoadWarning>,
}

/// Playback status for sending to the frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub time: u64,
    pub time_label: String,
    pub max_time: u64,
    pub state: ClockState,
    pub running: bool,
    pub speed: PlaybackSpeed,
    pub speed_multiplier: f64,
    pub progress: f64,
}

impl From<&TimelineClock> for PlaybackStatus {
    fn from(clock: &TimelineClock) -> Self {
        Self {
            time: clock.time(),
            time_label: format_time(clock.time()),
            max_time: clock.max_time(),
            state: clock.state(),
            running: clock.is_running(),
            speed: clock.speed(),
            speed_multiplier: clock.speed().multiplier(),
            progress: clock.progress(),
        }
    }
}

/// What the renderer receives after every tick or scrub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackUpdate {
    pub status: PlaybackStatus,
    pub snapshot: FleetSnapshot,
}

/// Log store plus the overlays derived from it. Replaced as a unit.
#[derive(Debug, Clone, Default)]
struct Dataset {
    store: LogStore,
    overlays: BTreeMap<VehicleId, VehiclePathOverlay>,
}

impl Dataset {
    fn new(store: LogStore) -> Self {
        let overlays = VehiclePathOverlay::build_all(&store);
        Self { store, overlays }
    }
}

/// An owned playback session.
///
/// Holds no global state, so any number of sessions can coexist. All
/// methods are synchronous and non-blocking; scheduling ticks in wall-clock
/// time is the job of [`PlaybackDriver`](crate::PlaybackDriver).
#[derive(Debug)]
pub struct PlaybackEngine {
    graph: Arc<FacilityGraph>,
    dataset: Dataset,
    payloads: Vec<PayloadRecord>,
    clock: TimelineClock,
}

impl PlaybackEngine {
    /// Create a session over `graph` with no data loaded.
    pub fn new(graph: Arc<FacilityGraph>) -> Self {
        Self {
            graph,
            dataset: Dataset::default(),
            payloads: Vec::new(),
            clock: TimelineClock::empty(),
        }
    }

    /// Replace the location log.
    ///
    /// The new dataset is fully validated before anything is swapped; on
    /// error the current dataset and clock are untouched. On success the
    /// clock is rebound to the new timeline (see [`TimelineClock::rebind`]).
    pub fn load_logs<I>(&mut self, records: I) -> Result<LoadSummary>
    where
        I: IntoIterator<Item = LogRecord>,
    {
        let store = LogStore::load(records, &self.graph).inspect_err(|e| {
            warn!(error = %e, "rejected location log");
        })?;
        Ok(self.install(store))
    }

    /// Replace the location log from JSON text.
    pub fn load_logs_json(&mut self, json: &str) -> Result<LoadSummary> {
        let store = LogStore::from_json(json, &self.graph).inspect_err(|e| {
            warn!(error = %e, "rejected location log");
        })?;
        Ok(self.install(store))
    }

    fn install(&mut self, store: LogStore) -> LoadSummary {
        let mut warnings = Vec::new();
        if store.is_empty() {
            warn!("location log has no events, nothing to play");
            warnings.push(LoadWarning::EmptyDataset);
        }

        let summary = LoadSummary {
            event_count: store.len(),
            vehicle_count: store.vehicle_count(),
            max_timestamp: store.max_timestamp(),
            warnings,
        };

        self.dataset = Dataset::new(store);
        self.clock.rebind(summary.max_timestamp, summary.event_count > 0);

        info!(
            events = summary.event_count,
            vehicles = summary.vehicle_count,
            max_timestamp = summary.max_timestamp,
            "loaded location log"
        );
        summary
    }

    /// Replace the payload table.
    pub fn load_payloads(&mut self, payloads: Vec<PayloadRecord>) {
        info!(rows = payloads.len(), "loaded payload table");
        self.payloads = payloads;
    }

    /// Replace the payload table from JSON text. Returns the row count.
    pub fn load_payloads_json(&mut self, json: &str) -> Result<usize> {
        let payloads = parse_payloads(json).inspect_err(|e| {
            warn!(error = %e, "rejected payload table");
        })?;
        let rows = payloads.len();
        self.load_payloads(payloads);
        Ok(rows)
    }

    pub fn graph(&self) -> &Arc<FacilityGraph> {
        &self.graph
    }

    pub fn store(&self) -> &LogStore {
        &self.dataset.store
    }

    /// Traveled-path overlays of the loaded dataset, keyed by vehicle.
    pub fn overlays(&self) -> &BTreeMap<VehicleId, VehiclePathOverlay> {
        &self.dataset.overlays
    }

    pub fn overlay(&self, vehicle_id: &str) -> Option<&VehiclePathOverlay> {
        self.dataset.overlays.get(vehicle_id)
    }

    pub fn payloads(&self) -> &[PayloadRecord] {
        &self.payloads
    }

    pub fn clock(&self) -> &TimelineClock {
        &self.clock
    }

    /// Start or resume playback. Returns whether the clock changed state.
    pub fn start(&mut self) -> bool {
        let started = self.clock.start();
        if started {
            info!(time = self.clock.time(), "playback started");
        } else if self.dataset.store.is_empty() {
            warn!("start ignored, no location log loaded");
        }
        started
    }

    pub fn pause(&mut self) -> bool {
        let paused = self.clock.pause();
        if paused {
            info!(time = self.clock.time(), "playback paused");
        }
        paused
    }

    pub fn reset(&mut self) {
        self.clock.reset();
        info!("playback reset");
    }

    /// Jump to `time` and resolve the fleet there.
    pub fn scrub(&mut self, time: u64) -> PlaybackUpdate {
        let time = self.clock.scrub(time);
        debug!(time, "scrubbed");
        self.update()
    }

    pub fn set_speed(&mut self, speed: PlaybackSpeed) {
        self.clock.set_speed(speed);
        info!(multiplier = speed.multiplier(), "playback speed changed");
    }

    /// Apply one scheduled tick. `None` when the tick is stale.
    pub fn tick(&mut self, epoch: u64) -> Option<PlaybackUpdate> {
        let time = self.clock.tick(epoch)?;
        debug!(time, "tick");
        if self.clock.state() == ClockState::Finished {
            info!(time, "playback finished");
        }
        Some(self.update())
    }

    /// Fleet positions at the current time.
    pub fn snapshot(&self) -> FleetSnapshot {
        FleetSnapshot::resolve(&self.dataset.store, self.clock.time())
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus::from(&self.clock)
    }

    pub fn update(&self) -> PlaybackUpdate {
        PlaybackUpdate {
            status: self.status(),
            snapshot: self.snapshot(),
        }
    }
}
