use std::fmt::Display;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use log::{debug, info, warn};
use crate::error::EngineError;
use super::completion::{completion, Completer, Completion};

/// Timing of the run loop.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Wall-clock time between emitted snapshots.
    pub event_interval: Duration,
    /// Shortest sleep when the simulation is ahead of the clock.
    pub min_sleep: Duration,
    /// Longest simulated interval handed to one step.
    pub max_step: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            event_interval: Duration::from_millis(100),
            min_sleep: Duration::from_millis(1),
            max_step: 0.1,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Active,
}

pub type StepFn<S> = Box<dyn FnMut(S, f64) -> (S, f64) + Send>;
type Transition<S> = Box<dyn FnOnce(&S) -> Result<S, EngineError> + Send>;

/// Receivers of the periodic snapshot and the observed speed, i.e. simulated
/// seconds per wall-clock second since the previous snapshot.
pub struct Listeners<S> {
    pub seed: Box<dyn Fn(&S) + Send + Sync>,
    pub speed: Box<dyn Fn(f64) + Send + Sync>,
}

impl<S> Default for Listeners<S> {
    fn default() -> Self {
        Listeners { seed: Box::new(|_| {}), speed: Box::new(|_| {}) }
    }
}

enum Command<S> {
    Apply(Transition<S>),
    Start(Option<S>),
    Stop,
    Speed(f64),
}

struct Queued<S> {
    command: Command<S>,
    done: Completer<S>,
}

struct Core<S> {
    commands: Receiver<Queued<S>>,
    seed: S,
    state: EngineState,
    speed: f64,
    worker: bool,
}

impl<S: Clone> Core<S> {
    /// Applies every pending command in order.
    fn drain(&mut self) {
        while let Ok(queued) = self.commands.try_recv() {
            let result = match queued.command {
                Command::Apply(f) => f(&self.seed).map(|s| {
                    self.seed = s;
                    self.seed.clone()
                }),
                Command::Start(seed) => {
                    if self.state == EngineState::Active {
                        warn!("Start requested on a running simulation.");
                        Err(EngineError::AlreadyActive)
                    } else {
                        if let Some(s) = seed {
                            self.seed = s;
                        }
                        self.state = EngineState::Active;
                        info!("Simulation started.");
                        Ok(self.seed.clone())
                    }
                }
                Command::Stop => {
                    if self.state == EngineState::Active {
                        info!("Simulation stopped.");
                    }
                    self.state = EngineState::Idle;
                    Ok(self.seed.clone())
                }
                Command::Speed(speed) => {
                    debug!("Simulation speed set to {}.", speed);
                    self.speed = speed.max(0.0);
                    Ok(self.seed.clone())
                }
            };
            let _ = queued.done.send(result);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

enum Pause {
    Sleep(Duration),
    Yield,
    Busy,
}

/// Runs a step function on its own thread, evolving a seed value.
///
/// Commands are queued and applied in order: by the worker while the
/// simulation is active, on the calling thread while it is idle. Every
/// command hands back a `Completion` with the seed right after it was
/// applied. Steps run outside the lock on the seed, so queries and
/// commands never wait for a step to finish.
pub struct SimulatorEngine<S: Clone + Send + 'static> {
    sender: Sender<Queued<S>>,
    core: Arc<Mutex<Core<S>>>,
    step: Arc<Mutex<StepFn<S>>>,
    listeners: Arc<Listeners<S>>,
    config: EngineConfig,
}

impl<S: Clone + Send + 'static> SimulatorEngine<S> {
    pub fn new<F>(seed: S, step: F, config: EngineConfig, listeners: Listeners<S>) -> Self
        where F: FnMut(S, f64) -> (S, f64) + Send + 'static
    {
        let (tx, rx) = channel();
        let step: StepFn<S> = Box::new(step);
        SimulatorEngine {
            sender: tx,
            core: Arc::new(Mutex::new(Core {
                commands: rx,
                seed: seed,
                state: EngineState::Idle,
                speed: 1.0,
                worker: false,
            })),
            step: Arc::new(Mutex::new(step)),
            listeners: Arc::new(listeners),
            config: config,
        }
    }

    pub fn state(&self) -> EngineState {
        lock(&self.core).state
    }

    pub fn speed(&self) -> f64 {
        lock(&self.core).speed
    }

    /// Current seed. Commands still in the queue are not reflected.
    pub fn seed(&self) -> S {
        lock(&self.core).seed.clone()
    }

    /// Starts from the current seed. Fails if already running.
    pub fn start(&self) -> Completion<S> {
        self.submit(Command::Start(None))
    }

    /// Starts from `seed`. Fails, leaving the seed alone, if already running.
    pub fn start_with(&self, seed: S) -> Completion<S> {
        self.submit(Command::Start(Some(seed)))
    }

    pub fn stop(&self) -> Completion<S> {
        self.submit(Command::Stop)
    }

    pub fn set_speed(&self, speed: f64) -> Completion<S> {
        self.submit(Command::Speed(speed))
    }

    pub fn push_seed(&self, seed: S) -> Completion<S> {
        self.submit(Command::Apply(Box::new(move |_| Ok(seed))))
    }

    pub fn request<F>(&self, transition: F) -> Completion<S>
        where F: FnOnce(&S) -> S + Send + 'static
    {
        self.submit(Command::Apply(Box::new(move |s| Ok(transition(s)))))
    }

    /// Like `request`, for transitions that may fail. A failure resolves
    /// the completion with `Rejected` and keeps the seed.
    pub fn try_request<F, E>(&self, transition: F) -> Completion<S>
        where F: FnOnce(&S) -> Result<S, E> + Send + 'static,
              E: Display
    {
        self.submit(Command::Apply(Box::new(move |s| {
            transition(s).map_err(|e| EngineError::Rejected(e.to_string()))
        })))
    }

    fn submit(&self, command: Command<S>) -> Completion<S> {
        let (done, handle) = completion();
        if let Err(e) = self.sender.send(Queued { command: command, done: done }) {
            let _ = e.0.done.send(Err(EngineError::Disconnected));
            return handle;
        }
        let mut core = lock(&self.core);
        if !core.worker {
            core.drain();
            if core.state == EngineState::Active {
                core.worker = true;
                self.spawn_worker();
            }
        }
        handle
    }

    fn spawn_worker(&self) {
        let core = self.core.clone();
        let step = self.step.clone();
        let listeners = self.listeners.clone();
        let config = self.config.clone();
        thread::spawn(move || run(core, step, listeners, config));
    }
}

impl<S: Clone + Send + 'static> Drop for SimulatorEngine<S> {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// The worker loop. Exits as soon as a drain leaves the engine idle.
///
/// Only the worker writes the seed while the engine is active, so a seed
/// taken out for a step can be put back without checking for other writers.
fn run<S: Clone>(core: Arc<Mutex<Core<S>>>, step: Arc<Mutex<StepFn<S>>>,
                 listeners: Arc<Listeners<S>>, config: EngineConfig) {
    debug!("Simulation worker running.");
    let interval = config.event_interval.as_secs_f64();
    let mut last_event = Instant::now();
    let mut simulated = 0.0;
    loop {
        let (seed, speed) = {
            let mut core = lock(&core);
            core.drain();
            if core.state == EngineState::Idle {
                core.worker = false;
                debug!("Simulation worker exits.");
                return;
            }
            (core.seed.clone(), core.speed)
        };

        let target = interval * speed;
        let pause = if simulated < target {
            let dt = (target - simulated).min(config.max_step);
            let (next, actual) = {
                let mut guard = lock(&step);
                let step_fn: &mut StepFn<S> = &mut *guard;
                step_fn(seed, dt)
            };
            lock(&core).seed = next;
            simulated += if actual > 0.0 { actual } else { dt };
            Pause::Busy
        } else {
            let left = config.event_interval.checked_sub(last_event.elapsed()).unwrap_or_default();
            if left >= config.min_sleep { Pause::Sleep(config.min_sleep) } else { Pause::Yield }
        };

        let elapsed = last_event.elapsed();
        if elapsed >= config.event_interval {
            let observed = simulated / elapsed.as_secs_f64();
            last_event = Instant::now();
            simulated = 0.0;
            let seed = lock(&core).seed.clone();
            (listeners.seed)(&seed);
            (listeners.speed)(observed);
        }
        match pause {
            Pause::Sleep(d) => thread::sleep(d),
            Pause::Yield => thread::yield_now(),
            Pause::Busy => {}
        }
    }
}
