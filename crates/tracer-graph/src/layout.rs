//! Built-in facility layouts.

use crate::graph::FacilityGraph;
use crate::node::{Edge, Node};

/// Spacing between grid rows and columns, in drawing units.
pub const GRID_SPACING: f64 = 100.0;

/// Offset of the first row and column from the drawing origin.
pub const GRID_ORIGIN: f64 = 50.0;

/// Links of the standard floor, as `(source, target)` grid numbers.
const STANDARD_LINKS: [(u32, u32); 10] = [
    (1, 2),
    (2, 3),
    (1, 4),
    (4, 7),
    (7, 8),
    (8, 9),
    (2, 5),
    (5, 6),
    (5, 8),
    (3, 6),
];

/// The standard nine-station floor: `Node1..Node9` on a 3x3 grid,
/// numbered row by row from the top-left corner.
///
/// ```text
/// Node1 - Node2 - Node3
///   |       |       |
/// Node4   Node5 - Node6
///   |       |
/// Node7 - Node8 - Node9
/// ```
pub fn standard_facility() -> FacilityGraph {
    let mut builder = FacilityGraph::builder();

    for n in 1..=9u32 {
        let col = f64::from((n - 1) % 3);
        let row = f64::from((n - 1) / 3);
        let node = Node::new(
            format!("Node{n}"),
            GRID_ORIGIN + col * GRID_SPACING,
            GRID_ORIGIN + row * GRID_SPACING,
        );
        // Ids are generated unique and coordinates finite.
        let _ = builder.add_node(node);
    }
    for (a, b) in STANDARD_LINKS {
        let _ = builder.add_edge(Edge::new(format!("Node{a}"), format!("Node{b}")));
    }

    builder.build()
}
