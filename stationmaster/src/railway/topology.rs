use smallvec::SmallVec;
use crate::error::{ConfigurationError, LookupError};

pub type NodeId = usize;
pub type EdgeId = usize;
pub type Dist = f64;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Track,
    Curve,
    Platform,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub length: Dist,
    pub nodes: [NodeId; 2],
    pub kind: EdgeKind,
}

impl Edge {
    pub fn is_platform(&self) -> bool {
        self.kind == EdgeKind::Platform
    }
}

/// An edge oriented away from one of its nodes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Direction {
    pub edge: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
}

impl Direction {
    pub fn opposite(&self) -> Direction {
        Direction { edge: self.edge, from: self.to, to: self.from }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: NodeId,
    /// Incident edges, oriented away from this node, in the order they were
    /// connected.
    pub directions: SmallVec<[Direction; 4]>,
}

/// A point on the track: `distance` travelled along `direction` from its
/// origin node.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EdgeLocation {
    pub direction: Direction,
    pub distance: Dist,
}

/// The fixed track graph of a station.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Topology {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl Topology {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_node(&mut self) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node { id: id, directions: SmallVec::new() });
        id
    }

    pub fn add_edge(&mut self, n0: NodeId, n1: NodeId, length: Dist, kind: EdgeKind)
                    -> Result<EdgeId, ConfigurationError> {
        let id = self.edges.len();
        for n in &[n0, n1] {
            if *n >= self.nodes.len() {
                return Err(ConfigurationError::UnknownNode(*n));
            }
        }
        if n0 == n1 {
            return Err(ConfigurationError::LoopEdge { edge: id, node: n0 });
        }
        if !(length > 0.0) {
            return Err(ConfigurationError::InvalidLength(id, length));
        }
        self.nodes[n0].directions.push(Direction { edge: id, from: n0, to: n1 });
        self.nodes[n1].directions.push(Direction { edge: id, from: n1, to: n0 });
        self.edges.push(Edge { id: id, length: length, nodes: [n0, n1], kind: kind });
        Ok(id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, LookupError> {
        self.nodes.get(id).ok_or(LookupError::Node(id))
    }

    pub fn edge(&self, id: EdgeId) -> Result<&Edge, LookupError> {
        self.edges.get(id).ok_or(LookupError::Edge(id))
    }

    /// Length of the edge under a direction. Directions are only ever built
    /// from this topology, so the edge exists.
    pub fn length(&self, direction: &Direction) -> Dist {
        self.edges[direction.edge].length
    }

    pub fn is_platform(&self, edge: EdgeId) -> bool {
        self.edges.get(edge).map(|e| e.is_platform()).unwrap_or(false)
    }

    /// Distance left on the edge ahead of a location.
    pub fn remaining(&self, location: &EdgeLocation) -> Dist {
        (self.length(&location.direction) - location.distance).max(0.0)
    }

    /// The single direction leaving `node` along `edge`.
    pub fn direction(&self, node: NodeId, edge: EdgeId) -> Result<Direction, LookupError> {
        self.node(node)?
            .directions
            .iter()
            .find(|d| d.edge == edge)
            .cloned()
            .ok_or(LookupError::Edge(edge))
    }

    pub fn total_length(&self) -> Dist {
        self.edges.iter().map(|e| e.length).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directions_are_ordered_and_opposite() {
        let mut t = Topology::new();
        let a = t.add_node();
        let b = t.add_node();
        let c = t.add_node();
        let e0 = t.add_edge(a, b, 100.0, EdgeKind::Track).unwrap();
        let e1 = t.add_edge(b, c, 50.0, EdgeKind::Platform).unwrap();

        let dirs = &t.node(b).unwrap().directions;
        assert_eq!(dirs.len(), 2);
        assert_eq!(dirs[0], Direction { edge: e0, from: b, to: a });
        assert_eq!(dirs[1], Direction { edge: e1, from: b, to: c });
        assert_eq!(dirs[0].opposite().opposite(), dirs[0]);
        assert_eq!(dirs[0].opposite(), t.node(a).unwrap().directions[0]);
        assert!(t.is_platform(e1));
        assert_eq!(t.total_length(), 150.0);
    }

    #[test]
    fn rejects_malformed_edges() {
        let mut t = Topology::new();
        let a = t.add_node();
        assert_eq!(t.add_edge(a, a, 10.0, EdgeKind::Track),
                   Err(ConfigurationError::LoopEdge { edge: 0, node: a }));
        assert_eq!(t.add_edge(a, 7, 10.0, EdgeKind::Track),
                   Err(ConfigurationError::UnknownNode(7)));
        let b = t.add_node();
        assert_eq!(t.add_edge(a, b, 0.0, EdgeKind::Track),
                   Err(ConfigurationError::InvalidLength(0, 0.0)));
        assert_eq!(t.node(9), Err(LookupError::Node(9)));
    }

    #[test]
    fn remaining_distance_never_negative() {
        let mut t = Topology::new();
        let a = t.add_node();
        let b = t.add_node();
        t.add_edge(a, b, 30.0, EdgeKind::Curve).unwrap();
        let d = t.direction(a, 0).unwrap();
        assert_eq!(t.remaining(&EdgeLocation { direction: d, distance: 10.0 }), 20.0);
        assert_eq!(t.remaining(&EdgeLocation { direction: d, distance: 45.0 }), 0.0);
    }
}
