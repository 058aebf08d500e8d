use smallvec::SmallVec;
use crate::error::ConfigurationError;
use super::topology::*;

/// Routes are identified by the first node they own.
pub type RouteId = NodeId;

/// Switching element attached to one or more nodes.
///
/// All directions stored in a route point away from the route's nodes. An
/// incoming direction is the one a train travels when it reaches the route,
/// so its `to` is one of the route's nodes.
#[derive(Clone, Debug, PartialEq)]
pub enum Route {
    Entry { node: NodeId, direction: Direction },
    Exit { node: NodeId, direction: Direction },
    DeadEnd { node: NodeId, direction: Direction },
    Junction { node: NodeId, directions: [Direction; 2] },
    /// `locked[i]` stops trains coming in over `directions[i]`.
    Signal { node: NodeId, directions: [Direction; 2], locked: [bool; 2] },
    /// `directions` is `[common, through, diverging]`.
    Switch { node: NodeId, directions: [Direction; 3], diverging: bool },
    /// Four nodes in a square. Node `k` carries an external direction, a
    /// diagonal towards node `(k + 2) % 4` and a side towards its partner
    /// (0-1, 2-3). Through connects external and diagonal, diverging
    /// connects external and side.
    DoubleSlipSwitch { nodes: [NodeId; 4], legs: [SlipLegs; 4], diverging: bool },
    /// `directions` is `[a, b, c, d]`, connecting `a`-`c` and `b`-`d`.
    CrossRoute { node: NodeId, directions: [Direction; 4] },
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SlipLegs {
    pub external: Direction,
    pub diagonal: Direction,
    pub side: Direction,
}

fn expect_edges(topology: &Topology, node: NodeId, kind: &'static str, expected: usize)
                -> Result<SmallVec<[Direction; 4]>, ConfigurationError> {
    let n = topology.node(node).map_err(|_| ConfigurationError::UnknownNode(node))?;
    if n.directions.len() != expected {
        return Err(ConfigurationError::EdgeCount {
            node: node,
            kind: kind,
            expected: expected,
            found: n.directions.len(),
        });
    }
    Ok(n.directions.clone())
}

impl Route {
    pub fn entry(topology: &Topology, node: NodeId) -> Result<Route, ConfigurationError> {
        let d = expect_edges(topology, node, "entry", 1)?;
        Ok(Route::Entry { node: node, direction: d[0] })
    }

    pub fn exit(topology: &Topology, node: NodeId) -> Result<Route, ConfigurationError> {
        let d = expect_edges(topology, node, "exit", 1)?;
        Ok(Route::Exit { node: node, direction: d[0] })
    }

    pub fn dead_end(topology: &Topology, node: NodeId) -> Result<Route, ConfigurationError> {
        let d = expect_edges(topology, node, "dead end", 1)?;
        Ok(Route::DeadEnd { node: node, direction: d[0] })
    }

    pub fn junction(topology: &Topology, node: NodeId) -> Result<Route, ConfigurationError> {
        let d = expect_edges(topology, node, "junction", 2)?;
        Ok(Route::Junction { node: node, directions: [d[0], d[1]] })
    }

    pub fn signal(topology: &Topology, node: NodeId) -> Result<Route, ConfigurationError> {
        let d = expect_edges(topology, node, "signal", 2)?;
        Ok(Route::Signal { node: node, directions: [d[0], d[1]], locked: [false, false] })
    }

    /// Edges are taken in connection order: common, through, diverging.
    pub fn switch(topology: &Topology, node: NodeId) -> Result<Route, ConfigurationError> {
        let d = expect_edges(topology, node, "switch", 3)?;
        Ok(Route::Switch { node: node, directions: [d[0], d[1], d[2]], diverging: false })
    }

    /// Edges are taken in connection order, `a`, `b`, `c`, `d`.
    pub fn cross(topology: &Topology, node: NodeId) -> Result<Route, ConfigurationError> {
        let d = expect_edges(topology, node, "cross", 4)?;
        Ok(Route::CrossRoute { node: node, directions: [d[0], d[1], d[2], d[3]] })
    }

    pub fn double_slip_switch(topology: &Topology, nodes: [NodeId; 4])
                              -> Result<Route, ConfigurationError> {
        let mut legs = SmallVec::<[SlipLegs; 4]>::new();
        for k in 0..4 {
            let node = nodes[k];
            let dirs = expect_edges(topology, node, "double slip switch node", 3)?;
            let partner = nodes[k ^ 1];
            let opposite = nodes[(k + 2) % 4];
            let side = dirs.iter().find(|d| d.to == partner).cloned()
                .ok_or(ConfigurationError::SlipWiring { node: node, kind: "side", towards: partner })?;
            let diagonal = dirs.iter().find(|d| d.to == opposite).cloned()
                .ok_or(ConfigurationError::SlipWiring { node: node, kind: "diagonal", towards: opposite })?;
            let external = dirs.iter()
                .find(|d| d.edge != side.edge && d.edge != diagonal.edge)
                .cloned()
                .ok_or(ConfigurationError::EdgeCount {
                    node: node,
                    kind: "double slip switch node",
                    expected: 3,
                    found: 2,
                })?;
            legs.push(SlipLegs { external: external, diagonal: diagonal, side: side });
        }
        Ok(Route::DoubleSlipSwitch {
            nodes: nodes,
            legs: [legs[0], legs[1], legs[2], legs[3]],
            diverging: false,
        })
    }

    pub fn id(&self) -> RouteId {
        self.nodes()[0]
    }

    pub fn nodes(&self) -> SmallVec<[NodeId; 4]> {
        match *self {
            Route::Entry { node, .. } | Route::Exit { node, .. } | Route::DeadEnd { node, .. } |
            Route::Junction { node, .. } | Route::Signal { node, .. } |
            Route::Switch { node, .. } | Route::CrossRoute { node, .. } => SmallVec::from_slice(&[node]),
            Route::DoubleSlipSwitch { ref nodes, .. } => SmallVec::from_slice(nodes),
        }
    }

    /// Directions leaving the route towards the rest of the station.
    pub fn directions(&self) -> SmallVec<[Direction; 4]> {
        match *self {
            Route::Entry { direction, .. } | Route::Exit { direction, .. } |
            Route::DeadEnd { direction, .. } => SmallVec::from_slice(&[direction]),
            Route::Junction { ref directions, .. } | Route::Signal { ref directions, .. } =>
                SmallVec::from_slice(directions),
            Route::Switch { ref directions, .. } => SmallVec::from_slice(directions),
            Route::CrossRoute { ref directions, .. } => SmallVec::from_slice(directions),
            Route::DoubleSlipSwitch { ref legs, .. } => legs.iter().map(|l| l.external).collect(),
        }
    }

    /// Entries, exits, signals and dead ends bound sections.
    pub fn is_section_terminal(&self) -> bool {
        match *self {
            Route::Entry { .. } | Route::Exit { .. } | Route::Signal { .. } | Route::DeadEnd { .. } => true,
            Route::Junction { .. } | Route::Switch { .. } |
            Route::DoubleSlipSwitch { .. } | Route::CrossRoute { .. } => false,
        }
    }

    /// Where a train arriving over `incoming` continues, honoring switch
    /// configuration and signal locks. Switches are trailable: both legs
    /// lead back to the common direction.
    pub fn get_exit(&self, incoming: &Direction) -> Option<Direction> {
        let from = incoming.opposite();
        match *self {
            Route::Switch { directions: [common, through, diverging], diverging: div, .. } => {
                if from == common {
                    Some(if div { diverging } else { through })
                } else if from == through || from == diverging {
                    Some(common)
                } else {
                    None
                }
            }
            Route::Signal { ref directions, ref locked, .. } => {
                let idx = directions.iter().position(|d| *d == from)?;
                if locked[idx] { None } else { Some(directions[1 - idx]) }
            }
            _ => self.aligned_exit(incoming),
        }
    }

    /// Continuation along the configured path only, ignoring signal locks.
    /// Arriving at a switch from the leg it is not set for leads nowhere.
    pub fn aligned_exit(&self, incoming: &Direction) -> Option<Direction> {
        let from = incoming.opposite();
        match *self {
            Route::Entry { .. } | Route::Exit { .. } | Route::DeadEnd { .. } => None,
            Route::Junction { directions, .. } | Route::Signal { directions, .. } => {
                if from == directions[0] {
                    Some(directions[1])
                } else if from == directions[1] {
                    Some(directions[0])
                } else {
                    None
                }
            }
            Route::Switch { directions: [common, through, diverging], diverging: div, .. } => {
                let leg = if div { diverging } else { through };
                if from == common {
                    Some(leg)
                } else if from == leg {
                    Some(common)
                } else {
                    None
                }
            }
            Route::CrossRoute { ref directions, .. } => {
                let idx = directions.iter().position(|d| *d == from)?;
                Some(directions[(idx + 2) % 4])
            }
            Route::DoubleSlipSwitch { ref legs, diverging, .. } => {
                let legs = legs.iter().find(|l| l.external.from == from.from)?;
                let inner = if diverging { legs.side } else { legs.diagonal };
                if from == legs.external {
                    Some(inner)
                } else if from == inner {
                    Some(legs.external)
                } else {
                    None
                }
            }
        }
    }

    /// Edges whose occupancy conflicts with a train passing this route
    /// over `incoming`.
    pub fn crossing_edges(&self, incoming: &Direction) -> SmallVec<[EdgeId; 2]> {
        let from = incoming.opposite();
        match *self {
            Route::CrossRoute { ref directions, .. } => {
                match directions.iter().position(|d| *d == from) {
                    Some(idx) => SmallVec::from_slice(&[directions[(idx + 1) % 4].edge,
                                                        directions[(idx + 3) % 4].edge]),
                    None => SmallVec::new(),
                }
            }
            Route::DoubleSlipSwitch { ref legs, diverging: false, .. } => {
                match legs.iter().position(|l| l.external.from == from.from) {
                    Some(k) => SmallVec::from_slice(&[legs[(k + 1) % 4].diagonal.edge]),
                    None => SmallVec::new(),
                }
            }
            _ => SmallVec::new(),
        }
    }

    /// Internal edges of the route, the ones that no section ends on.
    pub fn inner_edges(&self) -> SmallVec<[EdgeId; 4]> {
        match *self {
            Route::DoubleSlipSwitch { ref legs, .. } => {
                let mut edges: SmallVec<[EdgeId; 4]> = SmallVec::new();
                for l in legs.iter() {
                    for e in &[l.diagonal.edge, l.side.edge] {
                        if !edges.contains(e) {
                            edges.push(*e);
                        }
                    }
                }
                edges
            }
            _ => SmallVec::new(),
        }
    }

    pub fn is_diverging(&self) -> Option<bool> {
        match *self {
            Route::Switch { diverging, .. } | Route::DoubleSlipSwitch { diverging, .. } => Some(diverging),
            _ => None,
        }
    }

    fn with_diverging(&self, value: bool) -> Route {
        let mut r = self.clone();
        match r {
            Route::Switch { ref mut diverging, .. } |
            Route::DoubleSlipSwitch { ref mut diverging, .. } => *diverging = value,
            _ => {}
        }
        r
    }

    pub fn diverging(&self) -> Route {
        self.with_diverging(true)
    }

    pub fn toggle(&self) -> Route {
        match self.is_diverging() {
            Some(d) => self.with_diverging(!d),
            None => self.clone(),
        }
    }

    /// Whether a signal stops trains arriving over `incoming`.
    pub fn is_locked(&self, incoming: &Direction) -> bool {
        match *self {
            Route::Signal { ref directions, ref locked, .. } => {
                let from = incoming.opposite();
                directions.iter().position(|d| *d == from).map(|i| locked[i]).unwrap_or(false)
            }
            _ => false,
        }
    }

    fn with_lock(&self, incoming: &Direction, value: bool) -> Route {
        let mut r = self.clone();
        if let Route::Signal { ref directions, ref mut locked, .. } = r {
            let from = incoming.opposite();
            if let Some(i) = directions.iter().position(|d| *d == from) {
                locked[i] = value;
            }
        }
        r
    }

    pub fn lock(&self, incoming: &Direction) -> Route {
        self.with_lock(incoming, true)
    }

    pub fn unlock(&self, incoming: &Direction) -> Route {
        self.with_lock(incoming, false)
    }

    /// The incoming direction a train uses to leave the route over `exit`,
    /// ignoring configuration and locks.
    pub fn entry_towards(&self, exit: &Direction) -> Option<Direction> {
        match *self {
            Route::Junction { directions, .. } | Route::Signal { directions, .. } => {
                if *exit == directions[0] {
                    Some(directions[1].opposite())
                } else if *exit == directions[1] {
                    Some(directions[0].opposite())
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}
