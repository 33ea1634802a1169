//! AGV Log Playback
//!
//! Replays historical AGV location logs over a facility graph against a
//! virtual clock.
//!
//! # Architecture
//!
//! - **LogStore**: validates raw records and indexes them by vehicle and time
//! - **Path overlays**: the links each vehicle traversed, built once per load
//! - **TimelineClock**: integer-tick virtual time with start/pause/reset/scrub
//! - **FleetSnapshot**: one resolved position per vehicle at a given time
//! - **PlaybackEngine**: an owned session tying the above together
//! - **PlaybackDriver**: paces ticks in wall-clock time and publishes updates
//!
//! # Usage
//!
//! ```ignore
//! let engine = PlaybackEngine::new(Arc::new(standard_facility()));
//! let driver = PlaybackDriver::new(engine);
//! driver.load_logs_json(&std::fs::read_to_string("agv_logs.json")?).await?;
//!
//! let mut updates = driver.subscribe();
//! driver.start().await;
//! while let Ok(update) = updates.recv().await {
//!     render(&update.snapshot);
//! }
//! ```

mod clock;
mod driver;
mod engine;
mod error;
mod log_store;
mod path;
mod payload;
mod resolver;
mod timestamp;

pub use clock::{ClockState, PlaybackSpeed, TimelineClock};
pub use driver::{PlaybackDriver, UPDATE_CHANNEL_CAPACITY};
pub use engine::{LoadSummary, LoadWarning, PlaybackEngine, PlaybackStatus, PlaybackUpdate};
pub use error::{Error, Result, TimestampError};
pub use log_store::{LocationEvent, LogRecord, LogStore, RawVehicleId, VehicleId};
pub use path::VehiclePathOverlay;
pub use payload::{parse_payloads, PayloadRecord};
pub use resolver::{FleetSnapshot, Interpolation, VehiclePosition};
pub use timestamp::{format_time, parse_clock_text, RawTimestamp};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tracer_graph::{standard_facility, Edge};

    const WALKTHROUGH: &str = r#"[
        {"agv_id": "A", "timestamp": 5, "location": "Node2"},
        {"agv_id": "B", "timestamp": 3, "location": "Node4"},
        {"agv_id": "A", "timestamp": 0, "location": "Node1"}
    ]"#;

    #[test]
    fn walkthrough_example() {
        let graph = standard_facility();
        let store = LogStore::from_json(WALKTHROUGH, &graph).unwrap();
        assert_eq!(store.max_timestamp(), 5);

        let at = |t| {
            FleetSnapshot::resolve(&store, t)
                .vehicles
                .into_iter()
                .map(|(id, p)| (id.0, p.location.0))
                .collect::<Vec<_>>()
        };
        let pair = |v: &str, n: &str| (v.to_string(), n.to_string());
        assert_eq!(at(2), vec![pair("A", "Node1")]);
        assert_eq!(at(4), vec![pair("A", "Node1"), pair("B", "Node4")]);
        assert_eq!(at(5), vec![pair("A", "Node2"), pair("B", "Node4")]);

        assert_eq!(
            VehiclePathOverlay::build(&store, "A").edges,
            vec![Edge::new("Node1", "Node2")]
        );
        assert!(VehiclePathOverlay::build(&store, "B").edges.is_empty());
    }

    #[test]
    fn engine_walkthrough_terminates() {
        let mut engine = PlaybackEngine::new(Arc::new(standard_facility()));
        engine.load_logs_json(WALKTHROUGH).unwrap();
        engine.start();
        let epoch = engine.clock().epoch();
        for _ in 0..5 {
            assert!(engine.tick(epoch).is_some());
        }
        assert_eq!(engine.clock().state(), ClockState::Finished);
        assert!(engine.tick(epoch).is_none());
    }

    #[test]
    fn update_serializes_for_the_renderer() {
        let mut engine = PlaybackEngine::new(Arc::new(standard_facility()));
        engine.load_logs_json(WALKTHROUGH).unwrap();
        let update = engine.scrub(2);

        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["status"]["time"], 2);
        assert_eq!(json["status"]["time_label"], "0:02");
        assert_eq!(json["snapshot"]["vehicles"]["A"]["location"], "Node1");
        assert_eq!(json["snapshot"]["vehicles"]["A"]["next"]["toward"], "Node2");
        assert!(json["snapshot"]["vehicles"].get("B").is_none());
    }
}
