extern crate stationmaster;
extern crate failure;
extern crate structopt;

use std::thread;
use std::time::Duration;
use log::{debug, info};
use stationmaster::*;
use stationmaster::eventsim::{EngineConfig, Listeners};
use stationmaster::output::sound::SoundSink;
use stationmaster::railway::{GameParams, StationStatus};
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

/// Stationmaster -- headless station traffic simulation
#[derive(StructOpt, Debug)]
#[structopt(name = "stationmaster")]
struct Opt {
    /// Verbose mode (-v, -vv)
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: u8,

    /// Station layout: line | single | diamond | crossover | platform
    #[structopt(short = "l", long = "layout", default_value = "single")]
    layout: String,

    /// Game duration, simulated seconds
    #[structopt(short = "d", long = "duration", default_value = "600")]
    duration: f64,

    /// New trains per simulated minute
    #[structopt(short = "f", long = "frequency", default_value = "1")]
    frequency: f64,

    /// Simulated seconds per wall-clock second
    #[structopt(short = "s", long = "speed", default_value = "60")]
    speed: f64,

    /// Random seed. When omitted, a random seed is used.
    #[structopt(long = "seed")]
    seed: Option<u64>,

    /// Milliseconds between snapshots
    #[structopt(long = "interval", default_value = "500")]
    interval: u64,
}

fn run(opt: &Opt) -> AppResult<()> {
    let station = get_layout(&opt.layout)?;
    let params = GameParams {
        train_frequency: opt.frequency / 60.0,
        duration: opt.duration,
        ..GameParams::default()
    };
    let sound = SoundSink::new(|e| debug!("Sound: {:?}", e));
    let status = StationStatus::new(station, params, sound);
    let seed = opt.seed.unwrap_or_else(rand::random);
    info!("Layout {} with {} sections, seed {}.", opt.layout, status.sections().len(), seed);

    let listeners = Listeners {
        seed: Box::new(|s: &StationStatus| {
            info!("t={:.0}s trains={} in station={} right={} wrong={}",
                  s.time(), s.trains().len(),
                  s.performance().station_train_number(),
                  s.performance().right_outgoing_train_number,
                  s.performance().wrong_outgoing_train_number);
        }),
        speed: Box::new(|v| debug!("Observed speed {:.1}x.", v)),
    };
    let config = EngineConfig { event_interval: Duration::from_millis(opt.interval), ..Default::default() };
    let engine = station_engine(status, seed, config, listeners);

    engine.set_speed(opt.speed).wait()?;
    engine.start().wait()?;
    while !engine.seed().is_game_over() {
        thread::sleep(Duration::from_millis(50));
    }
    let last = engine.stop().wait()?;

    let p = last.performance();
    println!("Game over after {:.0} s", p.elapsed_time);
    println!("  incoming trains:  {}", p.incoming_train_number);
    println!("  right exits:      {}", p.right_outgoing_train_number);
    println!("  wrong exits:      {}", p.wrong_outgoing_train_number);
    println!("  stops:            {}", p.train_stop_number);
    println!("  train time:       {:.0} s", p.total_train_time);
    println!("  waiting time:     {:.0} s", p.train_waiting_time);
    println!("  distance:         {:.0} m", p.train_distance);
    Ok(())
}

pub fn main() {
    let opt = Opt::from_args();
    let level = match opt.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
    match run(&opt) {
        Ok(()) => {},
        Err(e) => {
            println!("Error:\n{}", e.as_fail());
            std::process::exit(1);
        },
    }
}
