/// Top speed of every train, m/s (140 km/h).
pub const MAX_SPEED: f64 = 140.0 / 3.6;
/// Maximum acceleration, m/s².
pub const ACCELERATION: f64 = 1.0;
/// Maximum deceleration, m/s². Negative.
pub const DEACCELERATION: f64 = -1.0;
/// Speeds below this are standing still.
pub const SPEED_EPSILON: f64 = 1e-3;
/// Distances below this are zero.
pub const DISTANCE_EPSILON: f64 = 1e-4;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DistanceVelocity {
    pub dx: f64,
    pub v: f64,
}

/// Speed reached after `dt` when heading for `target`, with acceleration
/// clamped to the train's limits.
pub fn speed_physics(speed: f64, target: f64, dt: f64) -> f64 {
    let target = target.max(0.0).min(MAX_SPEED);
    if dt <= 0.0 {
        return speed.max(0.0).min(MAX_SPEED);
    }
    let acc = ((target - speed) / dt).max(DEACCELERATION).min(ACCELERATION);
    (speed + acc * dt).max(0.0).min(MAX_SPEED)
}

/// Distance needed to stop from `speed` at full service braking.
pub fn stopping_distance(speed: f64) -> f64 {
    speed * speed / (2.0 * DEACCELERATION.abs())
}

/// Highest speed from which a train still stops within `distance`.
pub fn braking_speed(distance: f64) -> f64 {
    (2.0 * DEACCELERATION.abs() * distance.max(0.0)).sqrt()
}

/// Moves a train for `dt` towards `target`, never beyond `limit` metres.
/// A train that would overrun its limit is held at the limit and stopped.
pub fn dynamic_update(speed: f64, target: f64, dt: f64, limit: f64) -> DistanceVelocity {
    let limit = limit.max(0.0);
    let target = target.min(braking_speed(limit));
    let v = speed_physics(speed, target, dt);
    let dx = (speed + v) * 0.5 * dt.max(0.0);
    if dx >= limit - DISTANCE_EPSILON && limit.is_finite() {
        DistanceVelocity { dx: limit, v: 0.0 }
    } else if v < SPEED_EPSILON {
        DistanceVelocity { dx: dx, v: 0.0 }
    } else {
        DistanceVelocity { dx: dx, v: v }
    }
}

/// Time to reach `MAX_SPEED` from standstill.
pub fn acceleration_time() -> f64 {
    MAX_SPEED / ACCELERATION
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accelerates_within_bounds() {
        assert_eq!(speed_physics(0.0, MAX_SPEED, 1.0), ACCELERATION);
        assert_eq!(speed_physics(10.0, 0.0, 1.0), 10.0 + DEACCELERATION);
        assert_eq!(speed_physics(MAX_SPEED, 1000.0, 1.0), MAX_SPEED);
        assert_eq!(speed_physics(0.5, 0.0, 1.0), 0.0);
    }

    #[test]
    fn stopping_distance_matches_braking_speed() {
        let v = 20.0;
        let d = stopping_distance(v);
        assert!((braking_speed(d) - v).abs() < 1e-9);
        assert_eq!(stopping_distance(0.0), 0.0);
    }

    #[test]
    fn update_stops_at_limit() {
        let u = dynamic_update(20.0, MAX_SPEED, 1.0, 5.0);
        assert_eq!(u.dx, 5.0);
        assert_eq!(u.v, 0.0);

        let free = dynamic_update(0.0, MAX_SPEED, 2.0, std::f64::INFINITY);
        assert_eq!(free.v, 2.0 * ACCELERATION);
        assert_eq!(free.dx, 2.0);
    }

    proptest! {
        #[test]
        fn speed_stays_in_range(speed in 0.0..MAX_SPEED, target in -10.0..100.0f64,
                                dt in 0.0..10.0f64, limit in 0.0..1000.0f64) {
            let u = dynamic_update(speed, target, dt, limit);
            prop_assert!(u.v >= 0.0);
            prop_assert!(u.v <= MAX_SPEED);
            prop_assert!(u.dx >= 0.0);
            prop_assert!(u.dx <= limit + DISTANCE_EPSILON);
        }
    }
}
