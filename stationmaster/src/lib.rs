extern crate smallvec;
extern crate ordered_float;
extern crate failure;
#[macro_use] extern crate failure_derive;

pub mod error;
pub mod input;
pub mod output;
pub mod eventsim;
pub mod railway;


use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use eventsim::{EngineConfig, Listeners, SimulatorEngine};
use input::builder::Station;
use railway::StationStatus;

pub type AppResult<T> = Result<T, failure::Error>;

/// A sample station by name.
pub fn get_layout(name: &str) -> AppResult<Station> {
    match input::layouts::by_name(name) {
        Some(station) => Ok(station?),
        None => Err(failure::format_err!("unknown layout {:?}, expected one of {:?}",
                                         name, input::layouts::NAMES)),
    }
}

/// An idle engine ticking `status`, drawing arrivals from a generator
/// seeded with `seed`.
pub fn station_engine(status: StationStatus, seed: u64, config: EngineConfig,
                      listeners: Listeners<StationStatus>) -> SimulatorEngine<StationStatus> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    SimulatorEngine::new(status, move |s: StationStatus, dt| (s.tick(dt, &mut rng), dt), config, listeners)
}
