//! Fleet snapshot resolution.
//!
//! A snapshot answers "where is every vehicle at time t". Each vehicle's
//! position is its most recent event at or before `t`; vehicles that have
//! not reported yet are absent. Resolution is a pure function of the store
//! and the time, so a scrubbed time and a ticked-to time give the same
//! snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracer_graph::NodeId;

use crate::log_store::{LocationEvent, LogStore, VehicleId};

/// Where a vehicle is heading next and how far along it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpolation {
    /// Location of the vehicle's next event.
    pub toward: NodeId,
    /// Timestamp of the vehicle's next event.
    pub arrives_at: u64,
    /// `(time - since) / (arrives_at - since)`, in `[0, 1)`.
    pub progress: f64,
}

/// Resolved state of one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehiclePosition {
    /// Location of the most recent event at or before the snapshot time.
    pub location: NodeId,
    /// Timestamp of that event.
    pub since: u64,
    /// Present when the vehicle has a later event.
    pub next: Option<Interpolation>,
}

/// Positions of every vehicle that has reported by `time`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub time: u64,
    pub vehicles: BTreeMap<VehicleId, VehiclePosition>,
}

impl FleetSnapshot {
    /// Resolve every vehicle's position at `time`.
    pub fn resolve(store: &LogStore, time: u64) -> Self {
        let vehicles = store
            .histories()
            .filter_map(|(id, history)| {
                resolve_vehicle(history, time).map(|position| (id.clone(), position))
            })
            .collect();

        Self { time, vehicles }
    }

    /// Current location of one vehicle, if it has reported yet.
    pub fn location_of(&self, vehicle_id: &str) -> Option<&NodeId> {
        self.vehicles.get(vehicle_id).map(|p| &p.location)
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}

/// Latest event at or before `time` in a time-sorted history. Among events
/// sharing that timestamp the last one in the history wins.
fn resolve_vehicle(history: &[LocationEvent], time: u64) -> Option<VehiclePosition> {
    let split = history.partition_point(|e| e.timestamp <= time);
    let last = history[..split].last()?;

    let next = history.get(split).and_then(|upcoming| {
        let span = upcoming.timestamp.checked_sub(last.timestamp)?;
        if span == 0 {
            return None;
        }
        Some(Interpolation {
            toward: upcoming.location.clone(),
            arrives_at: upcoming.timestamp,
            progress: (time - last.timestamp) as f64 / span as f64,
        })
    });

    Some(VehiclePosition {
        location: last.location.clone(),
        since: last.timestamp,
        next,
    })
}
