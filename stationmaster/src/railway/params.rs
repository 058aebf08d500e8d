use std::ops::RangeInclusive;

/// Knobs of one game.
#[derive(Clone, Debug, PartialEq)]
pub struct GameParams {
    /// Expected new trains per second.
    pub train_frequency: f64,
    /// Game length, seconds.
    pub duration: f64,
    pub coaches: RangeInclusive<usize>,
    /// Delay between a train being announced and it entering the map.
    pub entry_timeout: f64,
    /// Time a train spends at a platform.
    pub loading_time: f64,
}

impl Default for GameParams {
    fn default() -> Self {
        GameParams {
            train_frequency: 1.0 / 60.0,
            duration: 600.0,
            coaches: 3..=10,
            entry_timeout: 10.0,
            loading_time: 20.0,
        }
    }
}

impl GameParams {
    /// Same game without random arrivals.
    pub fn without_arrivals(self) -> Self {
        GameParams { train_frequency: 0.0, ..self }
    }
}
