//! Facility Graph
//!
//! Static topology that AGV location logs are replayed over.
//!
//! A facility is a set of named stations ([`Node`]) with fixed drawing
//! coordinates, joined by undirected links ([`Edge`]). The graph is supplied
//! once per run and is read-only afterwards; it exists to resolve node ids
//! and to answer adjacency questions for the renderer. It does no routing.

mod error;
mod graph;
mod layout;
mod node;

pub use error::{Error, Result};
pub use graph::{FacilityGraph, FacilityGraphBuilder};
pub use layout::{standard_facility, GRID_ORIGIN, GRID_SPACING};
pub use node::{Edge, Node, NodeId};

#[cfg(feature = "serde")]
pub use graph::GraphDocument;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn adjacency_is_symmetric(links in proptest::collection::vec((1u32..=6, 1u32..=6), 0..20)) {
            let mut b = FacilityGraph::builder();
            for n in 1..=6u32 {
                b.add_node(Node::new(format!("N{n}"), f64::from(n), 0.0)).unwrap();
            }
            for (a, c) in &links {
                b.add_edge(Edge::new(format!("N{a}"), format!("N{c}"))).unwrap();
            }
            let graph = b.build();

            for (a, c) in &links {
                let (a, c) = (format!("N{a}"), format!("N{c}"));
                prop_assert!(graph.are_adjacent(&a, &c));
                prop_assert!(graph.are_adjacent(&c, &a));
            }
            prop_assert_eq!(graph.edge_count(), links.len());
        }
    }
}
