/// Aggregated counters of a game. Per-train deltas from one tick are summed
/// into the station's running total with `add`.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Performance {
    pub elapsed_time: f64,
    pub total_train_time: f64,
    pub train_distance: f64,
    pub train_stop_number: u32,
    pub train_waiting_time: f64,
    pub incoming_train_number: u32,
    pub right_outgoing_train_number: u32,
    pub wrong_outgoing_train_number: u32,
}

impl Performance {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add(&self, other: &Performance) -> Performance {
        Performance {
            elapsed_time: self.elapsed_time + other.elapsed_time,
            total_train_time: self.total_train_time + other.total_train_time,
            train_distance: self.train_distance + other.train_distance,
            train_stop_number: self.train_stop_number + other.train_stop_number,
            train_waiting_time: self.train_waiting_time + other.train_waiting_time,
            incoming_train_number: self.incoming_train_number + other.incoming_train_number,
            right_outgoing_train_number: self.right_outgoing_train_number + other.right_outgoing_train_number,
            wrong_outgoing_train_number: self.wrong_outgoing_train_number + other.wrong_outgoing_train_number,
        }
    }

    pub fn station_train_number(&self) -> i64 {
        self.incoming_train_number as i64
            - self.right_outgoing_train_number as i64
            - self.wrong_outgoing_train_number as i64
    }

    pub fn outgoing_train_number(&self) -> u32 {
        self.right_outgoing_train_number + self.wrong_outgoing_train_number
    }

    // Delta builders used by the train transitions.

    pub fn train_time(dt: f64) -> Performance {
        Performance { total_train_time: dt, ..Default::default() }
    }

    pub fn with_distance(self, distance: f64) -> Performance {
        Performance { train_distance: self.train_distance + distance, ..self }
    }

    pub fn with_stop(self) -> Performance {
        Performance { train_stop_number: self.train_stop_number + 1, ..self }
    }

    pub fn with_waiting(self, dt: f64) -> Performance {
        Performance { train_waiting_time: self.train_waiting_time + dt, ..self }
    }

    pub fn with_incoming(self, n: u32) -> Performance {
        Performance { incoming_train_number: self.incoming_train_number + n, ..self }
    }

    pub fn with_outgoing(self, right: bool) -> Performance {
        if right {
            Performance { right_outgoing_train_number: self.right_outgoing_train_number + 1, ..self }
        } else {
            Performance { wrong_outgoing_train_number: self.wrong_outgoing_train_number + 1, ..self }
        }
    }

    pub fn with_elapsed(self, dt: f64) -> Performance {
        Performance { elapsed_time: self.elapsed_time + dt, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn counts_trains_in_station() {
        let p = Performance::new()
            .with_incoming(3)
            .with_outgoing(true)
            .with_outgoing(false);
        assert_eq!(p.station_train_number(), 1);
        assert_eq!(p.outgoing_train_number(), 2);
        let q = p.add(&Performance::train_time(2.5).with_stop().with_distance(10.0));
        assert_eq!(q.total_train_time, 2.5);
        assert_eq!(q.train_stop_number, 1);
        assert_eq!(q.train_distance, 10.0);
    }

    proptest! {
        #[test]
        fn station_number_is_balance(a in 0u32..100, b in 0u32..100, c in 0u32..100,
                                     d in 0u32..100, e in 0u32..100, f in 0u32..100) {
            let x = Performance { incoming_train_number: a, right_outgoing_train_number: b,
                                  wrong_outgoing_train_number: c, ..Default::default() };
            let y = Performance { incoming_train_number: d, right_outgoing_train_number: e,
                                  wrong_outgoing_train_number: f, ..Default::default() };
            let sum = x.add(&y);
            prop_assert_eq!(sum.station_train_number(),
                            (a + d) as i64 - (b + e) as i64 - (c + f) as i64);
            prop_assert_eq!(sum.station_train_number(),
                            x.station_train_number() + y.station_train_number());
        }
    }
}
