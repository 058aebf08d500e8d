use crate::railway::topology::{NodeId, EdgeId};
use crate::railway::train::TrainId;

/// Malformed topology. Raised while a station is built; a station with any
/// of these problems is never handed to the simulation.
#[derive(Debug, Fail, PartialEq)]
pub enum ConfigurationError {
    #[fail(display = "node {} has {} edges, a {} needs {}", node, found, kind, expected)]
    EdgeCount { node: NodeId, kind: &'static str, expected: usize, found: usize },
    #[fail(display = "edge {} loops on node {}", edge, node)]
    LoopEdge { edge: EdgeId, node: NodeId },
    #[fail(display = "edge references unknown node {}", _0)]
    UnknownNode(NodeId),
    #[fail(display = "edge {} has non-positive length {}", _0, _1)]
    InvalidLength(EdgeId, f64),
    #[fail(display = "node {} already has a route", _0)]
    DuplicateRoute(NodeId),
    #[fail(display = "node {} has no route", _0)]
    MissingRoute(NodeId),
    #[fail(display = "double slip switch at node {} has no {} edge towards node {}", node, kind, towards)]
    SlipWiring { node: NodeId, kind: &'static str, towards: NodeId },
    #[fail(display = "station has no {}", _0)]
    NoBoundary(&'static str),
}

/// Reference to something the station does not contain.
#[derive(Debug, Fail, PartialEq)]
pub enum LookupError {
    #[fail(display = "unknown node {}", _0)]
    Node(NodeId),
    #[fail(display = "unknown edge {}", _0)]
    Edge(EdgeId),
    #[fail(display = "no route at node {}", _0)]
    Route(NodeId),
    #[fail(display = "route at node {} is not a {}", _0, _1)]
    RouteKind(NodeId, &'static str),
    #[fail(display = "unknown train {}", _0)]
    Train(TrainId),
    #[fail(display = "direction on edge {} is not an entry of the route at node {}", _0, _1)]
    Direction(EdgeId, NodeId),
}

/// Failures reported through engine completion handles.
#[derive(Clone, Debug, Fail, PartialEq)]
pub enum EngineError {
    #[fail(display = "simulation is already running")]
    AlreadyActive,
    #[fail(display = "engine went away before the command completed")]
    Disconnected,
    #[fail(display = "command rejected: {}", _0)]
    Rejected(String),
}
