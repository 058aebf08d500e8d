use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock};
use log::{debug, info};
use ordered_float::OrderedFloat;
use rand::Rng;
use rand_distr::{Distribution, Poisson};
use smallvec::SmallVec;
use crate::error::LookupError;
use crate::input::builder::Station;
use crate::output::sound::{SoundEvent, SoundSink};
use super::context::SimulationContext;
use super::params::GameParams;
use super::performance::Performance;
use super::route::{Route, RouteId};
use super::section::*;
use super::topology::*;
use super::train::{Train, TrainId, TrainState};

/// Everything derived from the route configuration. Signal locks do not
/// change it, so it is shared between statuses that differ only in locks.
#[derive(Debug)]
pub struct RouteIndex {
    pub routes_by_node: HashMap<NodeId, RouteId>,
    pub entries: Vec<RouteId>,
    pub exits: Vec<RouteId>,
    pub sections: Vec<Section>,
    pub section_by_edge: HashMap<EdgeId, SectionId>,
}

impl RouteIndex {
    fn build(routes: &BTreeMap<RouteId, Route>) -> RouteIndex {
        let mut routes_by_node = HashMap::new();
        let mut entries = Vec::new();
        let mut exits = Vec::new();
        for (id, route) in routes.iter() {
            for n in route.nodes() {
                routes_by_node.insert(n, *id);
            }
            match *route {
                Route::Entry { .. } => entries.push(*id),
                Route::Exit { .. } => exits.push(*id),
                _ => {}
            }
        }
        let sections = compute_sections(routes, &routes_by_node);
        let section_by_edge = sections.iter()
            .flat_map(|s| s.edges.iter().map(move |e| (*e, s.id)))
            .collect();
        RouteIndex {
            routes_by_node: routes_by_node,
            entries: entries,
            exits: exits,
            sections: sections,
            section_by_edge: section_by_edge,
        }
    }
}

/// Everything derived from train positions.
#[derive(Clone, Debug, Default)]
pub struct TrainIndex {
    pub train_by_edge: HashMap<EdgeId, TrainId>,
    pub trains_by_section: HashMap<SectionId, SmallVec<[TrainId; 2]>>,
    pub train_by_exit: HashMap<RouteId, TrainId>,
    pub first_train_by_entry: HashMap<RouteId, TrainId>,
}

impl TrainIndex {
    fn build(topology: &Topology, routes: &RouteIndex, trains: &[Train]) -> TrainIndex {
        let mut index = TrainIndex::default();
        let mut first: HashMap<RouteId, (OrderedFloat<f64>, TrainId)> = HashMap::new();
        for t in trains {
            for e in t.edges(topology) {
                index.train_by_edge.insert(e, t.id);
                if let Some(s) = routes.section_by_edge.get(&e) {
                    let in_section = index.trains_by_section.entry(*s).or_insert_with(SmallVec::new);
                    if !in_section.contains(&t.id) {
                        in_section.push(t.id);
                    }
                }
            }
            if let Some((exit, _)) = t.exit {
                index.train_by_exit.insert(exit, t.id);
            }
            if t.state == TrainState::Entering {
                let key = (OrderedFloat(t.arrival_time), t.id);
                let slot = first.entry(t.arrival).or_insert(key);
                if key < *slot {
                    *slot = key;
                }
            }
        }
        index.first_train_by_entry = first.into_iter().map(|(entry, (_, id))| (entry, id)).collect();
        index
    }
}

/// Snapshot of a running station. Every operation returns a new status;
/// derived indices are built on first use.
#[derive(Clone)]
pub struct StationStatus {
    pub(crate) topology: Arc<Topology>,
    pub(crate) routes: Arc<BTreeMap<RouteId, Route>>,
    pub(crate) trains: Vec<Train>,
    pub(crate) performance: Performance,
    pub(crate) auto_lock: bool,
    /// Incoming directions of signals locked by trains that auto-lock will
    /// release.
    pub(crate) auto_locked: BTreeSet<Direction>,
    pub(crate) params: GameParams,
    pub(crate) sound: SoundSink,
    route_index: Arc<OnceLock<RouteIndex>>,
    train_index: OnceLock<TrainIndex>,
}

impl PartialEq for StationStatus {
    fn eq(&self, other: &StationStatus) -> bool {
        (Arc::ptr_eq(&self.topology, &other.topology) || self.topology == other.topology)
            && self.routes == other.routes
            && self.trains == other.trains
            && self.performance == other.performance
            && self.auto_lock == other.auto_lock
            && self.auto_locked == other.auto_locked
            && self.params == other.params
    }
}

impl fmt::Debug for StationStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StationStatus")
            .field("time", &self.time())
            .field("trains", &self.trains)
            .field("performance", &self.performance)
            .field("auto_lock", &self.auto_lock)
            .finish()
    }
}

impl StationStatus {
    pub fn new(station: Station, params: GameParams, sound: SoundSink) -> StationStatus {
        let (topology, routes) = station.into_parts();
        StationStatus {
            topology: Arc::new(topology),
            routes: Arc::new(routes),
            trains: Vec::new(),
            performance: Performance::new(),
            auto_lock: true,
            auto_locked: BTreeSet::new(),
            params: params,
            sound: sound,
            route_index: Arc::new(OnceLock::new()),
            train_index: OnceLock::new(),
        }
    }

    // Derived state.

    fn route_index(&self) -> &RouteIndex {
        self.route_index.get_or_init(|| RouteIndex::build(&self.routes))
    }

    fn train_index(&self) -> &TrainIndex {
        self.train_index.get_or_init(|| {
            TrainIndex::build(&self.topology, self.route_index(), &self.trains)
        })
    }

    /// Same configuration with other signal locks.
    fn with_locks(&self, routes: BTreeMap<RouteId, Route>) -> StationStatus {
        StationStatus {
            routes: Arc::new(routes),
            route_index: self.route_index.clone(),
            ..self.clone()
        }
    }

    /// Switch positions changed; sections must be computed again.
    fn with_configuration(&self, routes: BTreeMap<RouteId, Route>) -> StationStatus {
        StationStatus {
            routes: Arc::new(routes),
            route_index: Arc::new(OnceLock::new()),
            train_index: OnceLock::new(),
            ..self.clone()
        }
    }

    pub fn with_trains(&self, trains: Vec<Train>) -> StationStatus {
        StationStatus {
            trains: trains,
            train_index: OnceLock::new(),
            ..self.clone()
        }
    }

    // Queries.

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn routes(&self) -> &BTreeMap<RouteId, Route> {
        &self.routes
    }

    pub fn trains(&self) -> &[Train] {
        &self.trains
    }

    pub fn performance(&self) -> &Performance {
        &self.performance
    }

    pub fn params(&self) -> &GameParams {
        &self.params
    }

    pub fn time(&self) -> f64 {
        self.performance.elapsed_time
    }

    pub fn auto_lock(&self) -> bool {
        self.auto_lock
    }

    pub fn is_game_over(&self) -> bool {
        self.time() >= self.params.duration
    }

    pub fn train(&self, id: TrainId) -> Result<&Train, LookupError> {
        self.trains.iter().find(|t| t.id == id).ok_or(LookupError::Train(id))
    }

    pub fn route(&self, id: RouteId) -> Result<&Route, LookupError> {
        self.routes.get(&id).ok_or(LookupError::Route(id))
    }

    pub fn route_id_at(&self, node: NodeId) -> Option<RouteId> {
        self.route_index().routes_by_node.get(&node).cloned()
    }

    pub fn route_at(&self, node: NodeId) -> Option<&Route> {
        self.route_id_at(node).and_then(|id| self.routes.get(&id))
    }

    pub fn entries(&self) -> &[RouteId] {
        &self.route_index().entries
    }

    pub fn exits(&self) -> &[RouteId] {
        &self.route_index().exits
    }

    pub fn sections(&self) -> &[Section] {
        &self.route_index().sections
    }

    pub fn section_id(&self, edge: EdgeId) -> Option<SectionId> {
        self.route_index().section_by_edge.get(&edge).cloned()
    }

    pub fn section(&self, edge: EdgeId) -> Option<&Section> {
        self.section_id(edge).map(|s| &self.sections()[s])
    }

    pub fn train_at(&self, edge: EdgeId) -> Option<TrainId> {
        self.train_index().train_by_edge.get(&edge).cloned()
    }

    pub fn trains_in_section(&self, section: SectionId) -> &[TrainId] {
        self.train_index().trains_by_section.get(&section).map(|t| t.as_slice()).unwrap_or(&[])
    }

    pub fn train_at_exit(&self, exit: RouteId) -> Option<TrainId> {
        self.train_index().train_by_exit.get(&exit).cloned()
    }

    /// The train admitted next at an entry: earliest arrival time, then
    /// lowest id.
    pub fn first_train_at_entry(&self, entry: RouteId) -> Option<TrainId> {
        self.train_index().first_train_by_entry.get(&entry).cloned()
    }

    /// No train in the section of `edge` or in any section crossing it.
    pub fn is_section_clear(&self, edge: EdgeId) -> bool {
        match self.section(edge) {
            Some(section) => std::iter::once(&section.id)
                .chain(section.crossing.iter())
                .all(|s| self.trains_in_section(*s).is_empty()),
            None => self.train_at(edge).is_none(),
        }
    }

    /// Occupied, crossed by an occupied section, or closed by a signal.
    pub fn is_section_locked(&self, edge: EdgeId) -> bool {
        if !self.is_section_clear(edge) {
            return true;
        }
        let section = match self.section(edge) {
            Some(s) => s,
            None => return false,
        };
        section.exits.iter().any(|exit| {
            match self.route_at(exit.from) {
                Some(route) => route.entry_towards(exit).map(|d| route.is_locked(&d)).unwrap_or(false),
                None => false,
            }
        })
    }

    /// No two trains share a section, and no occupied section is crossed by
    /// another train's section.
    pub fn is_consistent(&self) -> bool {
        self.sections().iter().all(|section| {
            let occupants = self.trains_in_section(section.id);
            if occupants.len() > 1 {
                return false;
            }
            if occupants.is_empty() {
                return true;
            }
            section.crossing.iter().all(|c| {
                self.trains_in_section(*c).iter().all(|t| occupants.contains(t))
            })
        })
    }

    // Commands.

    pub fn toggle_switch(&self, node: NodeId) -> Result<StationStatus, LookupError> {
        let id = self.route_id_at(node).ok_or(LookupError::Route(node))?;
        let (route, common) = match self.routes.get(&id) {
            Some(r @ &Route::Switch { .. }) => (r, r.directions()[0]),
            _ => return Err(LookupError::RouteKind(id, "switch")),
        };
        let occupied = match self.section_id(common.edge) {
            Some(s) => !self.trains_in_section(s).is_empty(),
            None => self.train_at(common.edge).is_some(),
        };
        if occupied {
            debug!("Switch {} is occupied; toggle rejected.", id);
            return Ok(self.clone());
        }
        self.reconfigure(id, route.toggle())
    }

    pub fn toggle_double_slip_switch(&self, node: NodeId) -> Result<StationStatus, LookupError> {
        let id = self.route_id_at(node).ok_or(LookupError::Route(node))?;
        let route = match self.routes.get(&id) {
            Some(r @ &Route::DoubleSlipSwitch { .. }) => r,
            _ => return Err(LookupError::RouteKind(id, "double slip switch")),
        };
        let occupied = route.inner_edges().iter().any(|e| match self.section_id(*e) {
            Some(s) => !self.trains_in_section(s).is_empty(),
            None => self.train_at(*e).is_some(),
        });
        if occupied {
            debug!("Double slip switch {} is occupied; toggle rejected.", id);
            return Ok(self.clone());
        }
        self.reconfigure(id, route.toggle())
    }

    /// Applies a new switch position unless it brings trains into conflict.
    fn reconfigure(&self, id: RouteId, route: Route) -> Result<StationStatus, LookupError> {
        let mut routes = (*self.routes).clone();
        routes.insert(id, route);
        let candidate = self.with_configuration(routes);
        if !candidate.is_consistent() {
            debug!("Toggling {} would bring trains into conflict; rejected.", id);
            return Ok(self.clone());
        }
        self.sound.play(SoundEvent::Switch);
        Ok(candidate)
    }

    fn set_section_locks(&self, edge: EdgeId, value: bool) -> Result<StationStatus, LookupError> {
        self.topology.edge(edge)?;
        let section = self.section(edge).ok_or(LookupError::Edge(edge))?;
        let mut routes = (*self.routes).clone();
        let mut changed_locks = Vec::new();
        for exit in section.exits.iter() {
            let id = match self.route_id_at(exit.from) {
                Some(id) => id,
                None => continue,
            };
            let (changed, incoming) = match routes.get(&id) {
                Some(route) => match route.entry_towards(exit) {
                    Some(incoming) if value => (route.lock(&incoming), incoming),
                    Some(incoming) => (route.unlock(&incoming), incoming),
                    None => continue,
                },
                None => continue,
            };
            routes.insert(id, changed);
            changed_locks.push(incoming);
        }
        let mut next = self.with_locks(routes);
        for incoming in changed_locks.iter() {
            next.auto_locked.remove(incoming);
        }
        Ok(next)
    }

    /// Sets every signal leading into the section of `edge` to stop.
    pub fn lock_section(&self, edge: EdgeId) -> Result<StationStatus, LookupError> {
        self.set_section_locks(edge, true)
    }

    pub fn unlock_section(&self, edge: EdgeId) -> Result<StationStatus, LookupError> {
        self.set_section_locks(edge, false)
    }

    /// Locks the signal at `node` for trains arriving over `edge`.
    fn set_signal_lock(&self, node: NodeId, edge: EdgeId, value: bool) -> Result<StationStatus, LookupError> {
        let id = self.route_id_at(node).ok_or(LookupError::Route(node))?;
        let incoming = self.topology.direction(node, edge)?.opposite();
        let changed = match self.routes.get(&id) {
            Some(route @ &Route::Signal { .. }) => {
                if !route.directions().contains(&incoming.opposite()) {
                    return Err(LookupError::Direction(edge, node));
                }
                if value { route.lock(&incoming) } else { route.unlock(&incoming) }
            }
            _ => return Err(LookupError::RouteKind(id, "signal")),
        };
        let mut routes = (*self.routes).clone();
        routes.insert(id, changed);
        let mut next = self.with_locks(routes);
        next.auto_locked.remove(&incoming);
        Ok(next)
    }

    pub fn lock_signal(&self, node: NodeId, edge: EdgeId) -> Result<StationStatus, LookupError> {
        self.set_signal_lock(node, edge, true)
    }

    pub fn unlock_signal(&self, node: NodeId, edge: EdgeId) -> Result<StationStatus, LookupError> {
        self.set_signal_lock(node, edge, false)
    }

    pub fn set_auto_lock(&self, enabled: bool) -> StationStatus {
        let mut next = self.clone();
        next.auto_lock = enabled;
        if !enabled {
            next.auto_locked.clear();
        }
        next
    }

    fn map_train<F: Fn(&Train) -> Train>(&self, id: TrainId, f: F) -> Result<StationStatus, LookupError> {
        let train = self.train(id)?;
        let changed = f(train);
        if changed == *train {
            return Ok(self.clone());
        }
        if changed.state == TrainState::Braking {
            self.sound.play(SoundEvent::Braking);
        }
        let trains = self.trains.iter()
            .map(|t| if t.id == id { changed.clone() } else { t.clone() })
            .collect();
        Ok(self.with_trains(trains))
    }

    pub fn start_train(&self, id: TrainId) -> Result<StationStatus, LookupError> {
        self.map_train(id, |t| t.start())
    }

    pub fn stop_train(&self, id: TrainId) -> Result<StationStatus, LookupError> {
        self.map_train(id, |t| t.stop())
    }

    pub fn brake_train(&self, id: TrainId) -> Result<StationStatus, LookupError> {
        self.map_train(id, |t| t.brake())
    }

    pub fn resume_train(&self, id: TrainId) -> Result<StationStatus, LookupError> {
        self.map_train(id, |t| t.resume())
    }

    pub fn revert_train(&self, id: TrainId) -> Result<StationStatus, LookupError> {
        let topology = self.topology.clone();
        self.map_train(id, |t| t.revert(&topology))
    }

    // Simulation.

    /// Advances the station by `dt` seconds.
    pub fn tick<R: Rng>(&self, dt: f64, rng: &mut R) -> StationStatus {
        let mut ctx = SimulationContext::new(self, dt);
        let mut trains = Vec::with_capacity(self.trains.len());
        let mut performance = self.performance;
        for train in self.trains.iter() {
            let (next, delta) = train.tick(&mut ctx);
            performance = performance.add(&delta);
            if let Some(t) = next {
                trains.push(t);
            }
        }

        trains.extend(self.arrivals(dt, rng, &trains));
        performance = performance.with_elapsed(dt);

        let (routes, auto_locked) = ctx.into_parts();
        let next = StationStatus {
            routes: Arc::new(routes),
            route_index: self.route_index.clone(),
            trains: trains,
            train_index: OnceLock::new(),
            performance: performance,
            auto_locked: auto_locked,
            ..self.clone()
        };
        next.release_auto_locks()
    }

    /// New trains announced during a tick of `dt`.
    fn arrivals<R: Rng>(&self, dt: f64, rng: &mut R, present: &[Train]) -> Vec<Train> {
        let lambda = self.params.train_frequency * dt;
        let (entries, exits) = (self.entries(), self.exits());
        if !(lambda > 0.0) || entries.is_empty() || exits.is_empty() {
            return Vec::new();
        }
        let count = match Poisson::new(lambda) {
            Ok(p) => p.sample(rng) as usize,
            Err(_) => 0,
        };
        let mut taken: BTreeSet<TrainId> = present.iter().map(|t| t.id).collect();
        let mut trains = Vec::with_capacity(count);
        let (low, high) = (*self.params.coaches.start(), *self.params.coaches.end());
        for _ in 0..count {
            let arrival = entries[rng.gen_range(0..entries.len())];
            let destination = exits[rng.gen_range(0..exits.len())];
            let coaches = rng.gen_range(low..=high.max(low)).max(1);
            let mut id = rng.gen_range(1000..10000);
            while taken.contains(&id) {
                id = rng.gen_range(1000..10000);
            }
            taken.insert(id);
            let arrival_time = self.time() + dt + self.params.entry_timeout;
            info!("Train {} with {} coaches announced at {} for {}.", id, coaches, arrival, destination);
            self.sound.play(SoundEvent::Arriving);
            trains.push(Train::new(id, coaches, arrival, destination, arrival_time));
        }
        trains
    }

    /// Unlocks signals that trains locked automatically, once the section
    /// behind them is empty.
    fn release_auto_locks(self) -> StationStatus {
        if self.auto_locked.is_empty() {
            return self;
        }
        let mut routes = (*self.routes).clone();
        let mut kept = BTreeSet::new();
        let mut released = false;
        for incoming in self.auto_locked.iter() {
            let id = match self.route_id_at(incoming.to) {
                Some(id) => id,
                None => continue,
            };
            let section = routes.get(&id)
                .and_then(|r| r.aligned_exit(incoming))
                .and_then(|d| self.section_id(d.edge));
            if let Some(s) = section {
                if !self.trains_in_section(s).is_empty() {
                    kept.insert(*incoming);
                    continue;
                }
            }
            let unlocked = match routes.get(&id) {
                Some(route) => route.unlock(incoming),
                None => continue,
            };
            debug!("Releasing signal {} for {:?}.", id, incoming);
            routes.insert(id, unlocked);
            released = true;
        }
        let mut next = if released { self.with_locks(routes) } else { self.clone() };
        next.auto_locked = kept;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::layouts;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn line() -> StationStatus {
        StationStatus::new(layouts::straight_line(1000.0).unwrap(),
                           GameParams::default().without_arrivals(),
                           SoundSink::silent())
    }

    #[test]
    fn indexes_routes() {
        let s = line();
        assert_eq!(s.entries().len(), 1);
        assert_eq!(s.exits().len(), 1);
        assert_eq!(s.sections().len(), 1);
        for e in s.topology().edges() {
            assert_eq!(s.section_id(e.id), Some(0));
        }
        assert!(s.is_consistent());
        assert!(s.is_section_clear(0));
    }

    #[test]
    fn zero_tick_without_trains_changes_nothing() {
        let s = line();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let t = s.tick(0.0, &mut rng);
        assert_eq!(t, s);
        assert_eq!(t.time(), 0.0);
    }

    #[test]
    fn arrivals_get_distinct_ids_and_timeout() {
        let params = GameParams { train_frequency: 50.0, ..GameParams::default() };
        let s = StationStatus::new(layouts::straight_line(1000.0).unwrap(), params, SoundSink::silent());
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let t = s.tick(1.0, &mut rng);
        assert!(!t.trains().is_empty());
        let ids: BTreeSet<TrainId> = t.trains().iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), t.trains().len());
        for train in t.trains() {
            assert!(train.id >= 1000 && train.id < 10000);
            assert!(train.num_coaches >= 3 && train.num_coaches <= 10);
            assert_eq!(train.arrival_time, 1.0 + 10.0);
            assert_eq!(train.state, TrainState::Entering);
        }
        // Announced trains count once they enter.
        assert_eq!(t.performance().incoming_train_number, 0);
    }

    #[test]
    fn unknown_things_are_lookup_errors() {
        let s = line();
        assert_eq!(s.toggle_switch(999).err(), Some(LookupError::Route(999)));
        assert_eq!(s.toggle_switch(0).err(), Some(LookupError::RouteKind(0, "switch")));
        assert_eq!(s.start_train(42).err(), Some(LookupError::Train(42)));
        assert_eq!(s.lock_section(999).err(), Some(LookupError::Edge(999)));
    }

    #[test]
    fn game_ends_after_duration() {
        let params = GameParams { duration: 2.0, ..GameParams::default().without_arrivals() };
        let s = StationStatus::new(layouts::straight_line(100.0).unwrap(), params, SoundSink::silent());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let s = s.tick(1.0, &mut rng);
        assert!(!s.is_game_over());
        let s = s.tick(1.0, &mut rng);
        assert!(s.is_game_over());
    }

    #[test]
    fn auto_lock_can_be_disabled() {
        let s = line().set_auto_lock(false);
        assert!(!s.auto_lock());
        assert!(s.set_auto_lock(true).auto_lock());
    }
}
