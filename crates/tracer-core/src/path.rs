//! Traveled-path overlays.
//!
//! An overlay is the sequence of links a vehicle has moved along, taken
//! from its full history regardless of where playback currently is. It is
//! built once per dataset load.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracer_graph::Edge;

use crate::log_store::{LocationEvent, LogStore, VehicleId};

/// Every link one vehicle traversed, in traversal order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehiclePathOverlay {
    pub vehicle_id: VehicleId,
    pub edges: Vec<Edge>,
}

impl VehiclePathOverlay {
    /// Build the overlay for one vehicle.
    ///
    /// Each pair of consecutive events becomes one edge from the earlier
    /// location to the later one. Repeated links are kept, one entry per
    /// traversal. A vehicle with fewer than two events has an empty overlay.
    pub fn build(store: &LogStore, vehicle_id: &str) -> Self {
        Self::from_history(VehicleId::from(vehicle_id), store.events_for_vehicle(vehicle_id))
    }

    /// Overlays for every vehicle in the store, keyed by vehicle id.
    pub fn build_all(store: &LogStore) -> BTreeMap<VehicleId, Self> {
        store
            .histories()
            .map(|(id, history)| (id.clone(), Self::from_history(id.clone(), history)))
            .collect()
    }

    fn from_history(vehicle_id: VehicleId, history: &[LocationEvent]) -> Self {
        let edges = history
            .windows(2)
            .map(|pair| Edge::new(pair[0].location.clone(), pair[1].location.clone()))
            .collect();
        Self { vehicle_id, edges }
    }

    /// How many times each link was traversed, ignoring direction.
    pub fn traversal_counts(&self) -> HashMap<Edge, usize> {
        let mut counts = HashMap::new();
        for edge in &self.edges {
            *counts.entry(edge.undirected()).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
