//! Railway simulation.

pub mod topology;
pub mod route;
pub mod section;
pub mod dynamics;
pub mod performance;
pub mod params;
pub mod train;
pub mod context;
pub mod status;

pub use self::params::GameParams;
pub use self::status::StationStatus;
