use smallvec::SmallVec;
use log::debug;
use crate::output::sound::SoundEvent;
use super::context::SimulationContext;
use super::dynamics::*;
use super::performance::Performance;
use super::route::{Route, RouteId};
use super::topology::*;

pub type TrainId = u32;

/// Length of one coach, metres.
pub const COACH_LENGTH: f64 = 25.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TrainState {
    /// Announced, waiting outside the station for its entry.
    Entering,
    Running,
    Braking,
    WaitingForRun,
    WaitingForSignal,
    Loading,
    /// Head has passed an exit; the rest of the train follows.
    Exiting,
}

/// What ends the free track ahead of a train.
#[derive(Copy, Clone, Debug, PartialEq)]
enum Limit {
    Free,
    /// Blocked route or occupied section this far ahead.
    Signal(Dist),
    /// End of a platform the train has to stop at.
    Platform(Dist),
}

impl Limit {
    fn distance(&self) -> Dist {
        match *self {
            Limit::Free => std::f64::INFINITY,
            Limit::Signal(d) | Limit::Platform(d) => d,
        }
    }
}

/// Result of moving a train's head forward.
struct Advance {
    location: EdgeLocation,
    trail: SmallVec<[Direction; 4]>,
    exit: Option<(RouteId, Dist)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Train {
    pub id: TrainId,
    pub num_coaches: usize,
    pub arrival: RouteId,
    pub destination: RouteId,
    pub state: TrainState,
    /// Head of the train. None until the train enters the station.
    pub location: Option<EdgeLocation>,
    /// Directions still under the train behind the head edge, newest first.
    pub trail: SmallVec<[Direction; 4]>,
    pub speed: f64,
    pub loaded: bool,
    pub loading_end: f64,
    /// Earliest time the train may enter.
    pub arrival_time: f64,
    /// Exit passed and the distance run beyond it.
    pub exit: Option<(RouteId, Dist)>,
}

impl Train {
    pub fn new(id: TrainId, num_coaches: usize, arrival: RouteId, destination: RouteId,
               arrival_time: f64) -> Train {
        Train {
            id: id,
            num_coaches: num_coaches,
            arrival: arrival,
            destination: destination,
            state: TrainState::Entering,
            location: None,
            trail: SmallVec::new(),
            speed: 0.0,
            loaded: false,
            loading_end: 0.0,
            arrival_time: arrival_time,
            exit: None,
        }
    }

    pub fn at(self, location: EdgeLocation, trail: &[Direction]) -> Train {
        Train { location: Some(location), trail: SmallVec::from_slice(trail), ..self }
    }

    pub fn with_state(self, state: TrainState) -> Train {
        Train { state: state, ..self }
    }

    pub fn with_speed(self, speed: f64) -> Train {
        Train { speed: speed.max(0.0).min(MAX_SPEED), ..self }
    }

    pub fn length(&self) -> Dist {
        self.num_coaches as f64 * COACH_LENGTH
    }

    /// Edges under the train, head first.
    pub fn edges(&self, topology: &Topology) -> SmallVec<[EdgeId; 4]> {
        let mut edges = SmallVec::new();
        let head = match self.location {
            Some(l) => l,
            None => return edges,
        };
        let beyond = self.exit.map(|(_, d)| d).unwrap_or(0.0);
        let length = self.length() - beyond;
        if length <= 0.0 {
            return edges;
        }
        edges.push(head.direction.edge);
        let mut covered = head.distance;
        for d in self.trail.iter() {
            if covered >= length {
                break;
            }
            edges.push(d.edge);
            covered += topology.length(d);
        }
        edges
    }

    /// Whether the whole train is inside the station.
    pub fn is_inside(&self, topology: &Topology) -> bool {
        match self.location {
            Some(head) if self.exit.is_none() => {
                let covered = head.distance + self.trail.iter().map(|d| topology.length(d)).sum::<f64>();
                covered + DISTANCE_EPSILON >= self.length()
            }
            _ => false,
        }
    }

    // Commands.

    pub fn start(&self) -> Train {
        match self.state {
            TrainState::WaitingForRun => self.clone().with_state(TrainState::Running),
            _ => self.clone(),
        }
    }

    pub fn resume(&self) -> Train {
        match self.state {
            TrainState::Braking => self.clone().with_state(TrainState::Running),
            _ => self.clone(),
        }
    }

    pub fn brake(&self) -> Train {
        match self.state {
            TrainState::Running => self.clone().with_state(TrainState::Braking),
            _ => self.clone(),
        }
    }

    pub fn stop(&self) -> Train {
        match self.state {
            TrainState::Running | TrainState::Braking if self.speed > SPEED_EPSILON =>
                self.clone().with_state(TrainState::Braking),
            TrainState::Running | TrainState::Braking | TrainState::WaitingForSignal =>
                Train { speed: 0.0, ..self.clone() }.with_state(TrainState::WaitingForRun),
            _ => self.clone(),
        }
    }

    /// Swaps head and tail of a standing train that is fully inside the
    /// station. Anything else is returned unchanged.
    pub fn revert(&self, topology: &Topology) -> Train {
        let standing = match self.state {
            TrainState::WaitingForRun | TrainState::WaitingForSignal => true,
            _ => false,
        };
        if !standing || !self.is_inside(topology) {
            return self.clone();
        }
        let head = match self.location {
            Some(l) => l,
            None => return self.clone(),
        };
        let length = self.length();

        let (tail_dir, tail_rest, behind) = if head.distance >= length {
            (head.direction, head.distance - length, 0)
        } else {
            let mut remaining = length - head.distance;
            let mut found = None;
            for (i, d) in self.trail.iter().enumerate() {
                let len = topology.length(d);
                if len >= remaining {
                    found = Some((*d, len - remaining, i + 1));
                    break;
                }
                remaining -= len;
            }
            match found {
                Some(f) => f,
                None => return self.clone(),
            }
        };

        // The reversed head stands where the tail was.
        let new_head = EdgeLocation {
            direction: tail_dir.opposite(),
            distance: topology.length(&tail_dir) - tail_rest,
        };
        let mut new_trail: SmallVec<[Direction; 4]> = SmallVec::new();
        if behind > 0 {
            for d in self.trail[..behind - 1].iter().rev() {
                new_trail.push(d.opposite());
            }
            new_trail.push(head.direction.opposite());
        }
        Train {
            location: Some(new_head),
            trail: new_trail,
            speed: 0.0,
            state: TrainState::WaitingForRun,
            ..self.clone()
        }
    }

    // Transitions.

    /// One tick of the behaviour. `None` means the train left the station.
    pub fn tick(&self, ctx: &mut SimulationContext) -> (Option<Train>, Performance) {
        match self.state {
            TrainState::Entering => self.entering(ctx),
            TrainState::Running => self.running(ctx, MAX_SPEED),
            TrainState::Braking => self.running(ctx, 0.0),
            TrainState::WaitingForRun => {
                let dt = ctx.dt();
                (Some(self.clone()), Performance::train_time(dt).with_waiting(dt))
            }
            TrainState::WaitingForSignal => self.waiting_for_signal(ctx),
            TrainState::Loading => self.loading(ctx),
            TrainState::Exiting => self.exiting(ctx),
        }
    }

    fn entering(&self, ctx: &mut SimulationContext) -> (Option<Train>, Performance) {
        let now = ctx.time() + ctx.dt();
        if now < self.arrival_time || !ctx.is_entry_clear(self) {
            return (Some(self.clone()), Performance::new());
        }
        let direction = match ctx.route(self.arrival) {
            Some(&Route::Entry { direction, .. }) => direction,
            _ => return (Some(self.clone()), Performance::new()),
        };
        let placed = Train {
            location: Some(EdgeLocation { direction: direction, distance: 0.0 }),
            trail: SmallVec::new(),
            state: TrainState::Running,
            ..self.clone()
        };
        let limit = placed.limit(ctx, MAX_SPEED);
        ctx.lock_signals(&direction, self.id);
        debug!("Train {} enters at {}.", self.id, self.arrival);
        (Some(placed.with_speed(braking_speed(limit.distance()))), Performance::new().with_incoming(1))
    }

    fn running(&self, ctx: &mut SimulationContext, target: f64) -> (Option<Train>, Performance) {
        let dt = ctx.dt();
        let location = match self.location {
            Some(l) => l,
            None => return (Some(self.clone()), Performance::new()),
        };
        let limit = self.limit(ctx, self.speed);
        let update = dynamic_update(self.speed, target, dt, limit.distance());
        let advance = self.advance(ctx, location, update.dx);
        let mut perf = Performance::train_time(dt).with_distance(update.dx);

        if let Some((exit, beyond)) = advance.exit {
            ctx.play(SoundEvent::Leaving);
            debug!("Train {} is leaving at {}.", self.id, exit);
            let next = Train {
                location: Some(advance.location),
                trail: advance.trail,
                speed: update.v,
                exit: Some((exit, beyond)),
                state: TrainState::Exiting,
                ..self.clone()
            };
            return next.exiting_after(ctx, perf);
        }

        let mut next = Train {
            location: Some(advance.location),
            trail: advance.trail,
            speed: update.v,
            ..self.clone()
        };
        if update.v > SPEED_EPSILON {
            return (Some(next), perf);
        }

        let at_limit = (update.dx - limit.distance()).abs() < DISTANCE_EPSILON;
        next.state = match (limit, at_limit, self.state) {
            (Limit::Platform(_), true, _) => TrainState::Loading,
            (_, _, TrainState::Braking) => TrainState::WaitingForRun,
            (Limit::Signal(_), true, _) => TrainState::WaitingForSignal,
            (_, _, state) => state,
        };
        if next.state == TrainState::Loading {
            next.loading_end = ctx.time() + dt + ctx.params().loading_time;
        }
        if next.state != self.state {
            perf = perf.with_stop();
            ctx.play(SoundEvent::Stopped);
        }
        (Some(next), perf)
    }

    fn waiting_for_signal(&self, ctx: &mut SimulationContext) -> (Option<Train>, Performance) {
        let dt = ctx.dt();
        let perf = Performance::train_time(dt);
        match self.limit(ctx, 0.0) {
            Limit::Platform(d) if d <= DISTANCE_EPSILON => {
                let loading_end = ctx.time() + dt + ctx.params().loading_time;
                let next = Train { loading_end: loading_end, ..self.clone() };
                (Some(next.with_state(TrainState::Loading)), perf)
            }
            Limit::Signal(d) if d <= DISTANCE_EPSILON =>
                (Some(self.clone()), perf.with_waiting(dt)),
            _ => (Some(self.clone().with_state(TrainState::Running)), perf),
        }
    }

    fn loading(&self, ctx: &mut SimulationContext) -> (Option<Train>, Performance) {
        let dt = ctx.dt();
        let perf = Performance::train_time(dt);
        if ctx.time() + dt >= self.loading_end {
            debug!("Train {} loaded.", self.id);
            let next = Train { loaded: true, speed: 0.0, ..self.clone() };
            (Some(next.with_state(TrainState::WaitingForRun)), perf)
        } else {
            (Some(self.clone()), perf)
        }
    }

    fn exiting(&self, ctx: &mut SimulationContext) -> (Option<Train>, Performance) {
        let dt = ctx.dt();
        let v = speed_physics(self.speed, MAX_SPEED, dt);
        let dx = (self.speed + v) * 0.5 * dt;
        let (exit, beyond) = self.exit.unwrap_or((self.destination, 0.0));
        let next = Train { speed: v, exit: Some((exit, beyond + dx)), ..self.clone() };
        next.exiting_after(ctx, Performance::train_time(dt).with_distance(dx))
    }

    /// Drops the trail left behind and removes the train once it is gone.
    fn exiting_after(self, ctx: &SimulationContext, perf: Performance) -> (Option<Train>, Performance) {
        let (exit, beyond) = match self.exit {
            Some(e) => e,
            None => return (Some(self), perf),
        };
        if beyond + DISTANCE_EPSILON >= self.length() {
            let right = exit == self.destination;
            debug!("Train {} left at {} ({}).", self.id, exit, if right { "right" } else { "wrong" });
            return (None, perf.with_outgoing(right));
        }
        let trail = prune_trail(ctx.topology(), self.location, &self.trail, self.length() - beyond);
        (Some(Train { trail: trail, ..self }), perf)
    }

    /// Walks the track ahead for as far as the train could need to stop
    /// and returns what ends the free run.
    fn limit(&self, ctx: &SimulationContext, speed: f64) -> Limit {
        let topology = ctx.topology();
        let location = match self.location {
            Some(l) => l,
            None => return Limit::Free,
        };
        let dt = ctx.dt();
        let reach = (speed + ACCELERATION * dt).min(MAX_SPEED);
        let horizon = stopping_distance(reach) + reach * dt + COACH_LENGTH;

        let mut current = location.direction;
        let mut dist = topology.remaining(&location);
        if !self.loaded && topology.is_platform(current.edge) {
            return Limit::Platform(dist);
        }
        while dist < horizon {
            let route = match ctx.route_at(current.to) {
                Some(r) => r,
                None => return Limit::Signal(dist),
            };
            if let Route::Exit { .. } = *route {
                return Limit::Free;
            }
            let next = match route.get_exit(&current) {
                Some(n) => n,
                None => return Limit::Signal(dist),
            };
            if ctx.section_id(next.edge) != ctx.section_id(current.edge)
                && !ctx.is_section_clear_for(next.edge, self.id) {
                return Limit::Signal(dist);
            }
            dist += topology.length(&next);
            if !self.loaded && topology.is_platform(next.edge) {
                return Limit::Platform(dist);
            }
            current = next;
        }
        Limit::Free
    }

    /// Moves the head `dx` metres along the route graph, announcing every
    /// section it enters.
    fn advance(&self, ctx: &mut SimulationContext, location: EdgeLocation, dx: Dist) -> Advance {
        let mut loc = location;
        let mut trail = self.trail.clone();
        let mut left = dx;
        let mut exit = None;
        loop {
            let remaining = ctx.topology().remaining(&loc);
            if left <= remaining + DISTANCE_EPSILON {
                loc.distance = (loc.distance + left).min(ctx.topology().length(&loc.direction));
                break;
            }
            left -= remaining;
            loc.distance = ctx.topology().length(&loc.direction);
            let next = match ctx.route_at(loc.direction.to) {
                Some(&Route::Exit { node, .. }) => {
                    exit = Some((node, left));
                    break;
                }
                Some(route) => route.get_exit(&loc.direction),
                None => None,
            };
            let next = match next {
                Some(n) => n,
                None => break,
            };
            if ctx.section_id(next.edge) != ctx.section_id(loc.direction.edge) {
                ctx.lock_signals(&next, self.id);
            }
            trail.insert(0, loc.direction);
            loc = EdgeLocation { direction: next, distance: 0.0 };
        }
        let beyond = exit.map(|(_, d)| d).unwrap_or(0.0);
        let trail = prune_trail(ctx.topology(), Some(loc), &trail, self.length() - beyond);
        Advance { location: loc, trail: trail, exit: exit }
    }
}

/// Keeps the trail entries still covered by `length` metres of train
/// behind `head`.
fn prune_trail(topology: &Topology, head: Option<EdgeLocation>, trail: &[Direction], length: Dist)
               -> SmallVec<[Direction; 4]> {
    let mut kept = SmallVec::new();
    let mut covered = match head {
        Some(h) => h.distance,
        None => return kept,
    };
    for d in trail {
        if covered >= length {
            break;
        }
        kept.push(*d);
        covered += topology.length(d);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> (Topology, Vec<Direction>) {
        let mut t = Topology::new();
        let n: Vec<NodeId> = (0..4).map(|_| t.add_node()).collect();
        let mut dirs = Vec::new();
        for (i, len) in [100.0, 30.0, 200.0].iter().enumerate() {
            let e = t.add_edge(n[i], n[i + 1], *len, EdgeKind::Track).unwrap();
            dirs.push(t.direction(n[i], e).unwrap());
        }
        (t, dirs)
    }

    #[test]
    fn occupies_edges_behind_head() {
        let (t, dirs) = line();
        // 4 coaches = 100 m, head 50 m into the last edge.
        let train = Train::new(1, 4, 0, 3, 0.0)
            .at(EdgeLocation { direction: dirs[2], distance: 50.0 }, &[dirs[1], dirs[0]])
            .with_state(TrainState::WaitingForRun);
        assert_eq!(train.edges(&t).as_slice(), &[2, 1, 0]);
        assert!(train.is_inside(&t));

        let short = Train::new(2, 1, 0, 3, 0.0)
            .at(EdgeLocation { direction: dirs[2], distance: 50.0 }, &[dirs[1], dirs[0]]);
        assert_eq!(short.edges(&t).as_slice(), &[2]);
    }

    #[test]
    fn revert_swaps_head_and_tail() {
        let (t, dirs) = line();
        let train = Train::new(1, 4, 0, 3, 0.0)
            .at(EdgeLocation { direction: dirs[2], distance: 50.0 }, &[dirs[1], dirs[0]])
            .with_state(TrainState::WaitingForRun);
        let reverted = train.revert(&t);

        // Tail was 20 m before the end of the first edge.
        let head = reverted.location.unwrap();
        assert_eq!(head.direction, dirs[0].opposite());
        assert!((head.distance - 20.0).abs() < 1e-9);
        assert_eq!(reverted.trail.as_slice(), &[dirs[1].opposite(), dirs[2].opposite()]);
        assert_eq!(reverted.edges(&t).as_slice(), &[0, 1, 2]);

        let back = reverted.revert(&t);
        assert_eq!(back.location.unwrap().direction, dirs[2]);
        assert!((back.location.unwrap().distance - 50.0).abs() < 1e-9);
    }

    #[test]
    fn revert_needs_a_standing_train_inside() {
        let (t, dirs) = line();
        let running = Train::new(1, 4, 0, 3, 0.0)
            .at(EdgeLocation { direction: dirs[2], distance: 50.0 }, &[dirs[1], dirs[0]])
            .with_state(TrainState::Running);
        assert_eq!(running.revert(&t), running);

        let entering = Train::new(1, 8, 0, 3, 0.0)
            .at(EdgeLocation { direction: dirs[0], distance: 20.0 }, &[])
            .with_state(TrainState::WaitingForRun);
        assert!(!entering.is_inside(&t));
        assert_eq!(entering.revert(&t), entering);
    }

    #[test]
    fn commands_follow_state() {
        let waiting = Train::new(1, 2, 0, 1, 0.0).with_state(TrainState::WaitingForRun);
        assert_eq!(waiting.stop(), waiting);
        assert_eq!(waiting.start().state, TrainState::Running);
        assert_eq!(waiting.brake(), waiting);

        let running = waiting.start().with_speed(10.0);
        assert_eq!(running.brake().state, TrainState::Braking);
        assert_eq!(running.stop().state, TrainState::Braking);
        assert_eq!(running.brake().resume().state, TrainState::Running);

        let halted = Train::new(1, 2, 0, 1, 0.0).with_state(TrainState::WaitingForSignal);
        assert_eq!(halted.stop().state, TrainState::WaitingForRun);
        assert_eq!(halted.start(), halted);
    }
}
