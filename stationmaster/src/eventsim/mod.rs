//! Running a simulation in the background.

pub mod completion;
pub mod engine;

pub use self::completion::Completion;
pub use self::engine::{EngineConfig, EngineState, Listeners, SimulatorEngine, StepFn};
