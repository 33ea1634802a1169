//! Indexed store of per-vehicle location events.
//!
//! Raw records are validated and normalized in one pass, then indexed two
//! ways: a per-vehicle history (for path overlays and snapshot resolution)
//! and a single merged timeline (for "everything up to time t" queries).
//! Both indexes are stably sorted by timestamp, so events that share a
//! timestamp keep the order they had in the input.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracer_graph::{FacilityGraph, NodeId};
use tracing::debug;

use crate::error::{Error, Result};
use crate::timestamp::RawTimestamp;

/// Identifier of a vehicle (`agv_id` in upstream records).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub String);

impl VehicleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for VehicleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VehicleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Vehicle ids arrive as either JSON strings or integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawVehicleId {
    Number(u64),
    Text(String),
}

impl From<&str> for RawVehicleId {
    fn from(id: &str) -> Self {
        RawVehicleId::Text(id.to_string())
    }
}

/// One record of an upstream AGV log dataset. Unknown extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub agv_id: RawVehicleId,
    pub timestamp: RawTimestamp,
    pub location: String,
}

impl LogRecord {
    pub fn new(
        agv_id: impl Into<RawVehicleId>,
        timestamp: impl Into<RawTimestamp>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            agv_id: agv_id.into(),
            timestamp: timestamp.into(),
            location: location.into(),
        }
    }

    /// Record with a numeric timestamp that is already in ticks.
    pub fn at(agv_id: impl Into<RawVehicleId>, ticks: u64, location: impl Into<String>) -> Self {
        Self::new(agv_id, RawTimestamp::Ticks(ticks), location)
    }
}

/// A normalized location report: vehicle `vehicle_id` was at `location`
/// at tick `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationEvent {
    pub vehicle_id: VehicleId,
    pub timestamp: u64,
    pub location: NodeId,
}

impl LocationEvent {
    pub fn new(vehicle_id: impl Into<VehicleId>, timestamp: u64, location: impl Into<NodeId>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            timestamp,
            location: location.into(),
        }
    }
}

/// Location events of one dataset, indexed by vehicle and by time.
#[derive(Debug, Clone, Default)]
pub struct LogStore {
    by_vehicle: BTreeMap<VehicleId, Vec<LocationEvent>>,
    timeline: Vec<LocationEvent>,
    /// Vehicle ids in the order they first appear in the input.
    first_seen: Vec<VehicleId>,
    max_timestamp: u64,
}

impl LogStore {
    /// Validate and index raw records against the facility graph.
    ///
    /// Fails on the first record that cannot be normalized
    /// ([`Error::MalformedData`]) or that names a node the graph does not
    /// have ([`Error::UnknownLocation`]). Nothing is kept from a failed load.
    pub fn load<I>(records: I, graph: &FacilityGraph) -> Result<Self>
    where
        I: IntoIterator<Item = LogRecord>,
    {
        let mut events = Vec::new();

        for (index, record) in records.into_iter().enumerate() {
            let vehicle_id = match record.agv_id {
                RawVehicleId::Number(n) => VehicleId(n.to_string()),
                RawVehicleId::Text(text) if !text.trim().is_empty() => VehicleId(text),
                RawVehicleId::Text(_) => return Err(Error::malformed(index, "agv_id is empty")),
            };
            let timestamp = record
                .timestamp
                .normalize()
                .map_err(|e| Error::malformed(index, e))?;
            if record.location.trim().is_empty() {
                return Err(Error::malformed(index, "location is empty"));
            }
            if !graph.contains(&record.location) {
                return Err(Error::UnknownLocation {
                    index,
                    vehicle: vehicle_id,
                    location: NodeId(record.location),
                });
            }

            events.push(LocationEvent {
                vehicle_id,
                timestamp,
                location: NodeId(record.location),
            });
        }

        Ok(Self::from_events(events))
    }

    /// Parse a JSON array of log records, then [`load`](Self::load) it.
    pub fn from_json(json: &str, graph: &FacilityGraph) -> Result<Self> {
        let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
        let records = values
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                serde_json::from_value::<LogRecord>(value).map_err(|e| Error::malformed(index, e))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::load(records, graph)
    }

    /// Index already-normalized events without graph validation.
    pub fn from_events(events: Vec<LocationEvent>) -> Self {
        let mut by_vehicle: BTreeMap<VehicleId, Vec<LocationEvent>> = BTreeMap::new();
        let mut first_seen = Vec::new();
        let mut seen = HashSet::new();

        for event in &events {
            if seen.insert(event.vehicle_id.clone()) {
                first_seen.push(event.vehicle_id.clone());
            }
            by_vehicle
                .entry(event.vehicle_id.clone())
                .or_default()
                .push(event.clone());
        }
        for history in by_vehicle.values_mut() {
            history.sort_by_key(|e| e.timestamp);
        }

        let mut timeline = events;
        timeline.sort_by_key(|e| e.timestamp);
        let max_timestamp = timeline.last().map_or(0, |e| e.timestamp);

        debug!(
            events = timeline.len(),
            vehicles = first_seen.len(),
            max_timestamp,
            "indexed location log"
        );

        Self {
            by_vehicle,
            timeline,
            first_seen,
            max_timestamp,
        }
    }

    /// All events with `timestamp <= time`, across vehicles, in time order.
    pub fn events_up_to(&self, time: u64) -> &[LocationEvent] {
        let end = self.timeline.partition_point(|e| e.timestamp <= time);
        &self.timeline[..end]
    }

    /// Full ordered history of one vehicle. Empty for unknown vehicles.
    pub fn events_for_vehicle(&self, vehicle_id: &str) -> &[LocationEvent] {
        self.by_vehicle
            .get(vehicle_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Latest timestamp in the dataset; 0 when empty.
    pub fn max_timestamp(&self) -> u64 {
        self.max_timestamp
    }

    /// Vehicle ids in first-appearance order.
    pub fn vehicle_ids(&self) -> &[VehicleId] {
        &self.first_seen
    }

    /// Per-vehicle histories, keyed in vehicle-id order.
    pub fn histories(&self) -> impl Iterator<Item = (&VehicleId, &[LocationEvent])> {
        self.by_vehicle.iter().map(|(id, events)| (id, events.as_slice()))
    }

    pub fn vehicle_count(&self) -> usize {
        self.by_vehicle.len()
    }

    /// Total number of events.
    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracer_graph::standard_facility;

    fn sample() -> Vec<LogRecord> {
        vec![
            LogRecord::at("A", 5, "Node2"),
            LogRecord::at("B", 3, "Node4"),
            LogRecord::at("A", 0, "Node1"),
        ]
    }

    #[test]
    fn sorts_each_vehicle_by_time() {
        let store = LogStore::load(sample(), &standard_facility()).unwrap();
        let a: Vec<_> = store
            .events_for_vehicle("A")
            .iter()
            .map(|e| (e.timestamp, e.location.as_str()))
            .collect();
        assert_eq!(a, vec![(0, "Node1"), (5, "Node2")]);
        assert_eq!(store.max_timestamp(), 5);
        assert_eq!(store.vehicle_count(), 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn events_up_to_is_inclusive_and_ordered() {
        let store = LogStore::load(sample(), &standard_facility()).unwrap();
        let times: Vec<u64> = store.events_up_to(3).iter().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![0, 3]);
        assert!(store.events_up_to(100).len() == 3);
        assert_eq!(store.events_up_to(0).len(), 1);
    }

    #[test]
    fn equal_timestamps_keep_input_order() {
        let records = vec![
            LogRecord::at("A", 4, "Node1"),
            LogRecord::at("A", 4, "Node2"),
            LogRecord::at("A", 4, "Node3"),
        ];
        let store = LogStore::load(records, &standard_facility()).unwrap();
        let locations: Vec<_> = store
            .events_for_vehicle("A")
            .iter()
            .map(|e| e.location.as_str())
            .collect();
        assert_eq!(locations, vec!["Node1", "Node2", "Node3"]);
    }

    #[test]
    fn vehicle_ids_in_first_appearance_order() {
        let records = vec![
            LogRecord::at("C", 9, "Node1"),
            LogRecord::at("A", 1, "Node1"),
            LogRecord::at("C", 2, "Node2"),
        ];
        let store = LogStore::load(records, &standard_facility()).unwrap();
        let ids: Vec<_> = store.vehicle_ids().iter().map(VehicleId::as_str).collect();
        assert_eq!(ids, vec!["C", "A"]);
    }

    #[test]
    fn empty_store_has_zero_max() {
        let store = LogStore::load(Vec::new(), &standard_facility()).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.max_timestamp(), 0);
        assert!(store.events_up_to(10).is_empty());
        assert!(store.events_for_vehicle("A").is_empty());
    }

    #[test]
    fn unknown_location_is_rejected() {
        let records = vec![
            LogRecord::at("A", 0, "Node1"),
            LogRecord::at("A", 1, "Dock42"),
        ];
        let err = LogStore::load(records, &standard_facility()).unwrap_err();
        match err {
            Error::UnknownLocation { index, location, .. } => {
                assert_eq!(index, 1);
                assert_eq!(location.as_str(), "Dock42");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_timestamp_is_malformed() {
        let records = vec![LogRecord::new("A", "soon", "Node1")];
        let err = LogStore::load(records, &standard_facility()).unwrap_err();
        assert!(err.is_malformed());
        assert!(matches!(err, Error::MalformedData { index: 0, .. }));
    }

    #[test]
    fn from_json_accepts_both_timestamp_forms() {
        let json = r#"[
            {"agv_id": 1, "timestamp": "0:02", "location": "Node1", "battery": 40},
            {"agv_id": "1", "timestamp": 30, "location": "Node2"},
            {"agv_id": 2, "timestamp": "1:30", "location": "Node5"}
        ]"#;
        let store = LogStore::from_json(json, &standard_facility()).unwrap();
        assert_eq!(store.events_for_vehicle("1").len(), 2);
        assert_eq!(store.events_for_vehicle("2")[0].timestamp, 90);
        assert_eq!(store.max_timestamp(), 90);
    }

    #[test]
    fn from_json_reports_missing_field_index() {
        let json = r#"[
            {"agv_id": 1, "timestamp": 0, "location": "Node1"},
            {"agv_id": 1, "location": "Node2"}
        ]"#;
        let err = LogStore::from_json(json, &standard_facility()).unwrap_err();
        match err {
            Error::MalformedData { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains("timestamp"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn from_json_rejects_non_array() {
        let err = LogStore::from_json(r#"{"agv_id": 1}"#, &standard_facility()).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.is_malformed());
    }
}
