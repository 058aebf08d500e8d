use std::collections::{BTreeMap, HashMap};
use log::debug;
use crate::error::ConfigurationError;
use crate::railway::route::{Route, RouteId};
use crate::railway::topology::*;

/// A validated station: every node has exactly one route, and there is at
/// least one entry and one exit.
#[derive(Clone, Debug, PartialEq)]
pub struct Station {
    topology: Topology,
    routes: BTreeMap<RouteId, Route>,
}

impl Station {
    pub fn new(topology: Topology, routes: Vec<Route>) -> Result<Station, ConfigurationError> {
        let mut owner: HashMap<NodeId, RouteId> = HashMap::new();
        for route in &routes {
            for n in route.nodes() {
                if owner.insert(n, route.id()).is_some() {
                    return Err(ConfigurationError::DuplicateRoute(n));
                }
            }
        }
        for node in topology.nodes() {
            if !owner.contains_key(&node.id) {
                return Err(ConfigurationError::MissingRoute(node.id));
            }
        }
        if !routes.iter().any(|r| if let Route::Entry { .. } = *r { true } else { false }) {
            return Err(ConfigurationError::NoBoundary("entry"));
        }
        if !routes.iter().any(|r| if let Route::Exit { .. } = *r { true } else { false }) {
            return Err(ConfigurationError::NoBoundary("exit"));
        }
        debug!("Station with {} nodes, {} edges and {} routes.",
               topology.nodes().len(), topology.edges().len(), routes.len());
        Ok(Station {
            topology: topology,
            routes: routes.into_iter().map(|r| (r.id(), r)).collect(),
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn routes(&self) -> &BTreeMap<RouteId, Route> {
        &self.routes
    }

    pub fn into_parts(self) -> (Topology, BTreeMap<RouteId, Route>) {
        (self.topology, self.routes)
    }
}

/// Builds a station piece by piece. Routes are attached after the edges of
/// their nodes are in place, since they take their directions from them.
#[derive(Default)]
pub struct StationBuilder {
    topology: Topology,
    routes: Vec<Route>,
}

impl StationBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn node(&mut self) -> NodeId {
        self.topology.add_node()
    }

    pub fn nodes(&mut self, n: usize) -> Vec<NodeId> {
        (0..n).map(|_| self.topology.add_node()).collect()
    }

    pub fn track(&mut self, a: NodeId, b: NodeId, length: Dist) -> Result<EdgeId, ConfigurationError> {
        self.topology.add_edge(a, b, length, EdgeKind::Track)
    }

    pub fn curve(&mut self, a: NodeId, b: NodeId, length: Dist) -> Result<EdgeId, ConfigurationError> {
        self.topology.add_edge(a, b, length, EdgeKind::Curve)
    }

    pub fn platform(&mut self, a: NodeId, b: NodeId, length: Dist) -> Result<EdgeId, ConfigurationError> {
        self.topology.add_edge(a, b, length, EdgeKind::Platform)
    }

    fn add(&mut self, route: Route) -> RouteId {
        let id = route.id();
        self.routes.push(route);
        id
    }

    pub fn entry(&mut self, node: NodeId) -> Result<RouteId, ConfigurationError> {
        let r = Route::entry(&self.topology, node)?;
        Ok(self.add(r))
    }

    pub fn exit(&mut self, node: NodeId) -> Result<RouteId, ConfigurationError> {
        let r = Route::exit(&self.topology, node)?;
        Ok(self.add(r))
    }

    pub fn dead_end(&mut self, node: NodeId) -> Result<RouteId, ConfigurationError> {
        let r = Route::dead_end(&self.topology, node)?;
        Ok(self.add(r))
    }

    pub fn junction(&mut self, node: NodeId) -> Result<RouteId, ConfigurationError> {
        let r = Route::junction(&self.topology, node)?;
        Ok(self.add(r))
    }

    pub fn signal(&mut self, node: NodeId) -> Result<RouteId, ConfigurationError> {
        let r = Route::signal(&self.topology, node)?;
        Ok(self.add(r))
    }

    /// The first edge connected to `node` is the common leg, then through,
    /// then diverging.
    pub fn switch(&mut self, node: NodeId) -> Result<RouteId, ConfigurationError> {
        let r = Route::switch(&self.topology, node)?;
        Ok(self.add(r))
    }

    pub fn cross(&mut self, node: NodeId) -> Result<RouteId, ConfigurationError> {
        let r = Route::cross(&self.topology, node)?;
        Ok(self.add(r))
    }

    pub fn double_slip_switch(&mut self, nodes: [NodeId; 4]) -> Result<RouteId, ConfigurationError> {
        let r = Route::double_slip_switch(&self.topology, nodes)?;
        Ok(self.add(r))
    }

    pub fn build(self) -> Result<Station, ConfigurationError> {
        Station::new(self.topology, self.routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_node_needs_one_route() {
        let mut b = StationBuilder::new();
        let n = b.nodes(3);
        b.track(n[0], n[1], 100.0).unwrap();
        b.track(n[1], n[2], 100.0).unwrap();
        b.entry(n[0]).unwrap();
        b.exit(n[2]).unwrap();
        assert_eq!(b.build().err(), Some(ConfigurationError::MissingRoute(n[1])));

        let mut b = StationBuilder::new();
        let n = b.nodes(2);
        b.track(n[0], n[1], 100.0).unwrap();
        b.entry(n[0]).unwrap();
        b.exit(n[1]).unwrap();
        b.dead_end(n[1]).unwrap();
        assert_eq!(b.build().err(), Some(ConfigurationError::DuplicateRoute(n[1])));
    }

    #[test]
    fn needs_entry_and_exit() {
        let mut b = StationBuilder::new();
        let n = b.nodes(2);
        b.track(n[0], n[1], 100.0).unwrap();
        b.entry(n[0]).unwrap();
        b.dead_end(n[1]).unwrap();
        assert_eq!(b.build().err(), Some(ConfigurationError::NoBoundary("exit")));
    }

    #[test]
    fn route_kind_is_checked_against_edges() {
        let mut b = StationBuilder::new();
        let n = b.nodes(2);
        b.track(n[0], n[1], 100.0).unwrap();
        match b.junction(n[0]) {
            Err(ConfigurationError::EdgeCount { expected: 2, found: 1, .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
