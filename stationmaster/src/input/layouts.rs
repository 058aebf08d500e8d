//! Small stations used by the command line tool and the tests. Node and
//! edge ids are assigned in the order listed in each layout's docs.

use crate::error::ConfigurationError;
use super::builder::{Station, StationBuilder};

pub const NAMES: &[&str] = &["line", "single", "diamond", "crossover", "platform"];

pub fn by_name(name: &str) -> Option<Result<Station, ConfigurationError>> {
    match name {
        "line" => Some(straight_line(1000.0)),
        "single" => Some(single_line()),
        "diamond" => Some(diamond()),
        "crossover" => Some(double_slip_crossover()),
        "platform" => Some(platform_station()),
        _ => None,
    }
}

/// Entry (node 0), junction (1), exit (2); two edges of `length / 2`.
pub fn straight_line(length: f64) -> Result<Station, ConfigurationError> {
    let mut b = StationBuilder::new();
    let n = b.nodes(3);
    b.track(n[0], n[1], length / 2.0)?;
    b.track(n[1], n[2], length / 2.0)?;
    b.entry(n[0])?;
    b.junction(n[1])?;
    b.exit(n[2])?;
    b.build()
}

/// A single track shared by both directions.
///
/// ```text
/// A(0) -e5- SA(1) -e3- W(2) ======e0====== E(4) -e4- SB(6) -e6- B(7)
///                       \-e1- XA(3)      XB(5) -e2-/
/// ```
///
/// Switches W and E lead from the middle track to their exits. Trains from
/// the entries trail through them.
pub fn single_line() -> Result<Station, ConfigurationError> {
    let mut b = StationBuilder::new();
    let n = b.nodes(8);
    b.track(n[2], n[4], 1000.0)?;
    b.track(n[2], n[3], 200.0)?;
    b.track(n[4], n[5], 200.0)?;
    b.curve(n[1], n[2], 100.0)?;
    b.curve(n[6], n[4], 100.0)?;
    b.track(n[0], n[1], 300.0)?;
    b.track(n[7], n[6], 300.0)?;
    b.entry(n[0])?;
    b.signal(n[1])?;
    b.switch(n[2])?;
    b.exit(n[3])?;
    b.switch(n[4])?;
    b.exit(n[5])?;
    b.signal(n[6])?;
    b.entry(n[7])?;
    b.build()
}

/// Crossing (0) with entries A (1), B (2) and exits XA (3), XB (4) on the
/// opposite arms. Edges 0-3 run from the crossing to nodes 1-4.
pub fn diamond() -> Result<Station, ConfigurationError> {
    let mut b = StationBuilder::new();
    let c = b.node();
    let ends = b.nodes(4);
    for e in &ends {
        b.track(c, *e, 300.0)?;
    }
    b.cross(c)?;
    b.entry(ends[0])?;
    b.entry(ends[1])?;
    b.exit(ends[2])?;
    b.exit(ends[3])?;
    b.build()
}

/// Double slip switch on nodes 0-3 with entries A (4) at node 0 and B (5)
/// at node 1, exits XA (6) at node 2 and XB (7) at node 3. Edges 0-3 are
/// the external legs, 4-5 the diagonals, 6-7 the sides.
pub fn double_slip_crossover() -> Result<Station, ConfigurationError> {
    let mut b = StationBuilder::new();
    let s = b.nodes(4);
    let ends = b.nodes(4);
    for k in 0..4 {
        b.track(s[k], ends[k], 300.0)?;
    }
    b.track(s[0], s[2], 30.0)?;
    b.track(s[1], s[3], 30.0)?;
    b.curve(s[0], s[1], 30.0)?;
    b.curve(s[2], s[3], 30.0)?;
    b.double_slip_switch([s[0], s[1], s[2], s[3]])?;
    b.entry(ends[0])?;
    b.entry(ends[1])?;
    b.exit(ends[2])?;
    b.exit(ends[3])?;
    b.build()
}

/// Entry (0) -e0- signal (1) -e1 platform- junction (2) -e2- exit (3).
pub fn platform_station() -> Result<Station, ConfigurationError> {
    let mut b = StationBuilder::new();
    let n = b.nodes(4);
    b.track(n[0], n[1], 400.0)?;
    b.platform(n[1], n[2], 300.0)?;
    b.track(n[2], n[3], 400.0)?;
    b.entry(n[0])?;
    b.signal(n[1])?;
    b.junction(n[2])?;
    b.exit(n[3])?;
    b.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_layouts_build() {
        for name in NAMES {
            match by_name(name) {
                Some(Ok(_)) => {}
                other => panic!("layout {} failed: {:?}", name, other),
            }
        }
        assert!(by_name("nowhere").is_none());
    }
}
