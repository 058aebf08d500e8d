use std::collections::{BTreeMap, BTreeSet, HashMap};
use smallvec::SmallVec;
use log::{debug, warn};
use super::topology::*;
use super::route::*;

pub type SectionId = usize;

/// Run of edges between two section boundaries; at most one train may be
/// inside it at any time.
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    pub id: SectionId,
    /// Boundary directions, pointing from the bounding route into the section.
    pub exits: [Direction; 2],
    pub edges: SmallVec<[EdgeId; 4]>,
    /// Sections that physically cross this one.
    pub crossing: BTreeSet<SectionId>,
}

impl Section {
    pub fn contains(&self, edge: EdgeId) -> bool {
        self.edges.contains(&edge)
    }

    pub fn length(&self, topology: &Topology) -> Dist {
        self.edges.iter().map(|e| topology.edges()[*e].length).sum()
    }
}

/// Walks every boundary of the station along the currently aligned paths.
///
/// `routes_by_node` must cover every node of the topology.
pub fn compute_sections(routes: &BTreeMap<RouteId, Route>,
                        routes_by_node: &HashMap<NodeId, RouteId>)
                        -> Vec<Section> {
    let route_at = |node: NodeId| routes_by_node.get(&node).and_then(|id| routes.get(id));

    let mut fringe: BTreeSet<Direction> = routes.values()
        .filter(|r| r.is_section_terminal())
        .flat_map(|r| r.directions().into_iter())
        .collect();

    let mut assigned: HashMap<EdgeId, SectionId> = HashMap::new();
    let mut sections = Vec::new();
    let mut crossing_edges: Vec<BTreeSet<EdgeId>> = Vec::new();

    while let Some(start) = fringe.iter().next().cloned() {
        fringe.remove(&start);
        if assigned.contains_key(&start.edge) {
            continue;
        }
        let id = sections.len();
        let mut edges: SmallVec<[EdgeId; 4]> = SmallVec::new();
        let mut crossing = BTreeSet::new();
        edges.push(start.edge);
        assigned.insert(start.edge, id);

        let mut current = start;
        loop {
            let route = match route_at(current.to) {
                Some(r) => r,
                None => break,
            };
            if route.is_section_terminal() {
                fringe.remove(&current.opposite());
                break;
            }
            crossing.extend(route.crossing_edges(&current));
            match route.aligned_exit(&current) {
                Some(next) if !assigned.contains_key(&next.edge) => {
                    edges.push(next.edge);
                    assigned.insert(next.edge, id);
                    current = next;
                }
                Some(next) => {
                    warn!("Section walk from {:?} runs into assigned edge {}.", start, next.edge);
                    break;
                }
                None => {
                    debug!("Section from {:?} ends at non-aligned route {}.", start, route.id());
                    break;
                }
            }
        }

        sections.push(Section {
            id: id,
            exits: [start, current.opposite()],
            edges: edges,
            crossing: BTreeSet::new(),
        });
        crossing_edges.push(crossing);
    }

    for (id, edges) in crossing_edges.into_iter().enumerate() {
        for e in edges {
            if let Some(&other) = assigned.get(&e) {
                if other != id {
                    sections[id].crossing.insert(other);
                    sections[other].crossing.insert(id);
                }
            }
        }
    }

    debug!("Computed {} sections.", sections.len());
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreeset;

    fn index(routes: &[Route]) -> (BTreeMap<RouteId, Route>, HashMap<NodeId, RouteId>) {
        let mut by_id = BTreeMap::new();
        let mut by_node = HashMap::new();
        for r in routes {
            for n in r.nodes() {
                by_node.insert(n, r.id());
            }
            by_id.insert(r.id(), r.clone());
        }
        (by_id, by_node)
    }

    #[test]
    fn signals_split_a_line() {
        // entry -e0- junction -e1- signal -e2- exit
        let mut t = Topology::new();
        let n: Vec<NodeId> = (0..4).map(|_| t.add_node()).collect();
        for i in 0..3 {
            t.add_edge(n[i], n[i + 1], 100.0, EdgeKind::Track).unwrap();
        }
        let routes = vec![Route::entry(&t, n[0]).unwrap(),
                          Route::junction(&t, n[1]).unwrap(),
                          Route::signal(&t, n[2]).unwrap(),
                          Route::exit(&t, n[3]).unwrap()];
        let (routes, by_node) = index(&routes);
        let sections = compute_sections(&routes, &by_node);

        assert_eq!(sections.len(), 2);
        let first = sections.iter().find(|s| s.contains(0)).unwrap();
        assert_eq!(first.edges.as_slice(), &[0, 1]);
        assert_eq!(first.length(&t), 200.0);
        let ends: BTreeSet<NodeId> = first.exits.iter().map(|d| d.from).collect();
        assert_eq!(ends, btreeset!{ n[0], n[2] });
        assert!(sections.iter().all(|s| s.crossing.is_empty()));
    }

    #[test]
    fn diamond_crossing_sections_cross() {
        let mut t = Topology::new();
        let c = t.add_node();
        let ends: Vec<NodeId> = (0..4).map(|_| t.add_node()).collect();
        for e in &ends {
            t.add_edge(c, *e, 100.0, EdgeKind::Track).unwrap();
        }
        let routes = vec![Route::cross(&t, c).unwrap(),
                          Route::entry(&t, ends[0]).unwrap(),
                          Route::entry(&t, ends[1]).unwrap(),
                          Route::exit(&t, ends[2]).unwrap(),
                          Route::exit(&t, ends[3]).unwrap()];
        let (routes, by_node) = index(&routes);
        let sections = compute_sections(&routes, &by_node);

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].crossing, btreeset!{ 1 });
        assert_eq!(sections[1].crossing, btreeset!{ 0 });
    }

    #[test]
    fn non_aligned_leg_is_a_stub() {
        let mut t = Topology::new();
        let sw = t.add_node();
        let a = t.add_node();
        let b = t.add_node();
        let c = t.add_node();
        t.add_edge(sw, a, 100.0, EdgeKind::Track).unwrap();
        t.add_edge(sw, b, 100.0, EdgeKind::Track).unwrap();
        t.add_edge(sw, c, 100.0, EdgeKind::Track).unwrap();
        let routes = vec![Route::switch(&t, sw).unwrap(),
                          Route::entry(&t, a).unwrap(),
                          Route::exit(&t, b).unwrap(),
                          Route::exit(&t, c).unwrap()];
        let (routes, by_node) = index(&routes);
        let sections = compute_sections(&routes, &by_node);

        assert_eq!(sections.len(), 2);
        let stub = sections.iter().find(|s| s.contains(2)).unwrap();
        assert_eq!(stub.edges.len(), 1);
        assert_eq!(stub.exits[1].from, sw);
        let main = sections.iter().find(|s| s.contains(0)).unwrap();
        assert_eq!(main.edges.as_slice(), &[0, 1]);
    }
}
