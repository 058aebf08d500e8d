use std::collections::{BTreeMap, BTreeSet};
use log::debug;
use crate::output::sound::SoundEvent;
use super::params::GameParams;
use super::route::{Route, RouteId};
use super::section::SectionId;
use super::status::StationStatus;
use super::topology::*;
use super::train::{Train, TrainId};

/// What trains see of the station while one tick is in progress.
///
/// Signal locks requested by trains go into a working copy of the routes,
/// so later trains in the same tick already see them. Sections entered
/// during the tick are remembered as well, since the train index of the
/// status still reflects the positions at the start of the tick.
pub struct SimulationContext<'a> {
    status: &'a StationStatus,
    dt: f64,
    routes: BTreeMap<RouteId, Route>,
    auto_locked: BTreeSet<Direction>,
    entered: BTreeMap<SectionId, TrainId>,
}

impl<'a> SimulationContext<'a> {
    pub fn new(status: &'a StationStatus, dt: f64) -> Self {
        SimulationContext {
            status: status,
            dt: dt,
            routes: (*status.routes).clone(),
            auto_locked: status.auto_locked.clone(),
            entered: BTreeMap::new(),
        }
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn time(&self) -> f64 {
        self.status.time()
    }

    pub fn params(&self) -> &'a GameParams {
        &self.status.params
    }

    pub fn topology(&self) -> &'a Topology {
        &self.status.topology
    }

    pub fn route(&self, id: RouteId) -> Option<&Route> {
        self.routes.get(&id)
    }

    pub fn route_at(&self, node: NodeId) -> Option<&Route> {
        self.status.route_id_at(node).and_then(|id| self.routes.get(&id))
    }

    pub fn section_id(&self, edge: EdgeId) -> Option<SectionId> {
        self.status.section_id(edge)
    }

    /// Whether `train` may enter the section of `edge`: no other train is in
    /// it or in a section crossing it, counting sections entered earlier in
    /// this tick.
    pub fn is_section_clear_for(&self, edge: EdgeId, train: TrainId) -> bool {
        let section = match self.section_id(edge) {
            Some(s) => s,
            None => return true,
        };
        let crossing = self.status.sections()[section].crossing.iter().cloned();
        std::iter::once(section).chain(crossing).all(|s| {
            let occupied = self.status.trains_in_section(s).iter().any(|t| *t != train);
            let entered = self.entered.get(&s).map(|t| *t != train).unwrap_or(false);
            !occupied && !entered
        })
    }

    /// The train is first in line at its entry and the entry section is
    /// clear.
    pub fn is_entry_clear(&self, train: &Train) -> bool {
        if self.status.first_train_at_entry(train.arrival) != Some(train.id) {
            return false;
        }
        match self.route(train.arrival) {
            Some(&Route::Entry { direction, .. }) => self.is_section_clear_for(direction.edge, train.id),
            _ => false,
        }
    }

    /// Marks the section entered over `direction` as taken by `train` and
    /// sets every signal leading into it to stop.
    pub fn lock_signals(&mut self, direction: &Direction, train: TrainId) {
        let section = match self.section_id(direction.edge) {
            Some(s) => s,
            None => return,
        };
        self.entered.insert(section, train);
        let exits = self.status.sections()[section].exits;
        for exit in exits.iter() {
            let id = match self.status.route_id_at(exit.from) {
                Some(id) => id,
                None => continue,
            };
            let incoming = match self.routes.get(&id).and_then(|r| r.entry_towards(exit)) {
                Some(d) => d,
                None => continue,
            };
            let locked = match self.routes.get(&id) {
                Some(route) if !route.is_locked(&incoming) => route.lock(&incoming),
                _ => continue,
            };
            debug!("Train {} locks signal {} towards section {}.", train, id, section);
            self.routes.insert(id, locked);
            if self.status.auto_lock {
                self.auto_locked.insert(incoming);
            }
        }
    }

    pub fn play(&self, event: SoundEvent) {
        self.status.sound.play(event)
    }

    /// Route configuration and automatic locks after the tick.
    pub fn into_parts(self) -> (BTreeMap<RouteId, Route>, BTreeSet<Direction>) {
        (self.routes, self.auto_locked)
    }
}
