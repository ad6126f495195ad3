//! Market regime enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Daily market-condition classification.
///
/// Exactly one value per trading date; drives which entry/exit rule set applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    Bull,
    Sideway,
    Bear,
}

impl Regime {
    pub const ALL: [Regime; 3] = [Regime::Bull, Regime::Sideway, Regime::Bear];

    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Bull => "bull",
            Regime::Sideway => "sideway",
            Regime::Bear => "bear",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
