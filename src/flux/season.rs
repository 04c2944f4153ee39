//! Seasonal response curves.

use serde::{Deserialize, Serialize};

use super::Signal;
use super::curve::Curve;

/// A named season remapping the blended signal through its own curves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub name: String,
    pub ct: Curve,
    pub bri: Curve,
}

impl Season {
    pub fn remap(&self, signal: Signal) -> Signal {
        Signal {
            ct: self.ct.evaluate(signal.ct),
            bri: self.bri.evaluate(signal.bri),
        }
    }
}

/// Look up a season by name (exact match).
pub fn find<'a>(seasons: &'a [Season], name: &str) -> Option<&'a Season> {
    seasons.iter().find(|season| season.name == name)
}
