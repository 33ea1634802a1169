//! The facility graph: an immutable node/edge set with adjacency lookup.
//!
//! Graphs are assembled once through [`FacilityGraphBuilder`], which rejects
//! duplicate node ids and edges whose endpoints were never declared. After
//! `build()` nothing about the graph changes for the rest of the run.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::node::{Edge, Node, NodeId};

/// Static facility topology.
#[derive(Debug, Clone, Default)]
pub struct FacilityGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<NodeId, usize>,
    /// Neighbor node indices per node index, in edge declaration order.
    adjacency: Vec<Vec<usize>>,
}

impl FacilityGraph {
    /// Start assembling a graph.
    pub fn builder() -> FacilityGraphBuilder {
        FacilityGraphBuilder::new()
    }

    /// Build a graph from plain node and edge lists.
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self> {
        let mut builder = FacilityGraphBuilder::new();
        for node in nodes {
            builder.add_node(node)?;
        }
        for edge in edges {
            builder.add_edge(edge)?;
        }
        Ok(builder.build())
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Whether a node with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// All nodes in declaration order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All edges in declaration order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes directly linked to `id`. Empty for unknown ids.
    pub fn neighbors<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a NodeId> + 'a {
        let slots: &'a [usize] = match self.index.get(id) {
            Some(&i) => &self.adjacency[i],
            None => &[],
        };
        slots.iter().map(move |&j| &self.nodes[j].id)
    }

    /// Whether an edge joins `a` and `b` (in either direction).
    pub fn are_adjacent(&self, a: &str, b: &str) -> bool {
        match (self.index.get(a), self.index.get(b)) {
            (Some(&i), Some(&j)) => self.adjacency[i].contains(&j),
            _ => false,
        }
    }
}

/// Incremental, validating constructor for [`FacilityGraph`].
#[derive(Debug, Default)]
pub struct FacilityGraphBuilder {
    graph: FacilityGraph,
}

impl FacilityGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a node. Fails on a duplicate id or a non-finite coordinate.
    pub fn add_node(&mut self, node: Node) -> Result<&mut Self> {
        if !node.x.is_finite() || !node.y.is_finite() {
            return Err(Error::NonFiniteCoordinate(node.id));
        }
        if self.graph.index.contains_key(&node.id) {
            return Err(Error::DuplicateNode(node.id));
        }
        let slot = self.graph.nodes.len();
        self.graph.index.insert(node.id.clone(), slot);
        self.graph.nodes.push(node);
        self.graph.adjacency.push(Vec::new());
        Ok(self)
    }

    /// Declare a link between two already-declared nodes.
    pub fn add_edge(&mut self, edge: Edge) -> Result<&mut Self> {
        let endpoint = |id: &NodeId| {
            self.graph
                .index
                .get(id)
                .copied()
                .ok_or_else(|| Error::UnknownEndpoint {
                    from: edge.source.clone(),
                    to: edge.target.clone(),
                    missing: id.clone(),
                })
        };
        let a = endpoint(&edge.source)?;
        let b = endpoint(&edge.target)?;

        if !self.graph.adjacency[a].contains(&b) {
            self.graph.adjacency[a].push(b);
        }
        if !self.graph.adjacency[b].contains(&a) {
            self.graph.adjacency[b].push(a);
        }
        self.graph.edges.push(edge);
        Ok(self)
    }

    pub fn build(self) -> FacilityGraph {
        self.graph
    }
}

/// Plain serializable form of a graph (`{ "nodes": [...], "edges": [...] }`).
#[cfg(feature = "serde")]
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[cfg(feature = "serde")]
impl TryFrom<GraphDocument> for FacilityGraph {
    type Error = Error;

    fn try_from(doc: GraphDocument) -> Result<Self> {
        FacilityGraph::from_parts(doc.nodes, doc.edges)
    }
}

#[cfg(feature = "serde")]
impl From<&FacilityGraph> for GraphDocument {
    fn from(graph: &FacilityGraph) -> Self {
        Self {
            nodes: graph.nodes.clone(),
            edges: graph.edges.clone(),
        }
    }
}
